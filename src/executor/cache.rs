//! Per-connection executor state (spec §4.4: "an executor instance is
//! created lazily on first query per host connection and cached") and the
//! CSR cache it owns (spec §4.6: "owned by the executor; freed on executor
//! close or on cache invalidation").

use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::csr::CsrGraph;
use crate::error::GraphQLiteError;

#[derive(Default)]
pub struct ExecutorCache {
    csr: Option<CsrGraph>,
    pub config: EngineConfig,
}

impl ExecutorCache {
    pub fn new() -> Self {
        ExecutorCache { csr: None, config: EngineConfig::default() }
    }

    /// Drop the CSR snapshot. Called after any write the executor observes
    /// on this connection (spec §4.6's freshness rule) — the next algorithm
    /// call rebuilds it lazily.
    pub fn invalidate(&mut self) {
        self.csr = None;
    }

    pub fn csr(&mut self, conn: &Connection) -> Result<&CsrGraph, GraphQLiteError> {
        if self.csr.is_none() {
            log::debug!("rebuilding CSR cache");
            self.csr = Some(CsrGraph::build(conn)?);
        }
        Ok(self.csr.as_ref().expect("just populated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn csr_is_rebuilt_after_invalidation() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute("INSERT INTO nodes (id) VALUES (1)", []).unwrap();

        let mut cache = ExecutorCache::new();
        assert_eq!(cache.csr(&conn).unwrap().len(), 1);

        conn.execute("INSERT INTO nodes (id) VALUES (2)", []).unwrap();
        // Stale until invalidated.
        assert_eq!(cache.csr(&conn).unwrap().len(), 1);

        cache.invalidate();
        assert_eq!(cache.csr(&conn).unwrap().len(), 2);
    }
}
