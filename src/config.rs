//! Engine-wide tunables that are not part of any single query.
//!
//! No file or environment parsing lives here — that is the host's job,
//! out of scope per spec §1 — but the struct and its defaults are always
//! present and are threaded through the executor and CSR algorithms.

/// Engine-wide configuration, independent of any single query or connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Hop ceiling for unbounded variable-length expansion `-[*]->`
    /// (spec §4.4, §9 open question). High enough for realistic graphs
    /// while still bounding worst-case memory/time.
    pub max_varlen_hops: u32,

    /// Default PageRank damping factor when a query omits it.
    pub pagerank_damping: f64,
    /// Default PageRank iteration count when a query omits it.
    pub pagerank_iterations: u32,

    /// Default Label Propagation iteration count when a query omits it.
    pub label_propagation_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_varlen_hops: 1000,
            pagerank_damping: 0.85,
            pagerank_iterations: 20,
            label_propagation_iterations: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert!(cfg.max_varlen_hops >= 100);
        assert!(cfg.pagerank_damping > 0.0 && cfg.pagerank_damping < 1.0);
        assert!(cfg.pagerank_iterations > 0);
        assert!(cfg.label_propagation_iterations > 0);
    }
}
