//! Alias and scope management (spec §4.3.1, §3.4).
//!
//! Grounded on the teacher's `render_plan/variable_scope.rs` bookkeeping
//! shape: a flat map from Cypher variable name to its assigned SQL alias
//! and entity kind, reset at each `WITH` projection boundary.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Rel,
    Scalar,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub alias: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
    next_alias: u32,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// Look up an existing binding, or assign a fresh alias for `name`.
    /// References to an already-bound name in the same clause reuse the
    /// alias (spec §4.3.1).
    pub fn bind(&mut self, name: Option<&str>, kind: EntityKind) -> Binding {
        if let Some(name) = name {
            if let Some(existing) = self.bindings.get(name) {
                return existing.clone();
            }
        }
        let alias = match kind {
            EntityKind::Node => format!("n{}", self.next_alias),
            EntityKind::Rel => format!("r{}", self.next_alias),
            EntityKind::Scalar => format!("s{}", self.next_alias),
        };
        self.next_alias += 1;
        let binding = Binding { alias, kind };
        if let Some(name) = name {
            self.bindings.insert(name.to_string(), binding.clone());
        }
        binding
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Carry bound variables across a `WITH` projection boundary: only the
    /// projected names survive, rebound under their (possibly aliased) new
    /// names (spec §4.3.1).
    pub fn rebind_through_with(&self, carried: &[(String, String)]) -> Scope {
        let mut next = Scope::new();
        for (old_name, new_name) in carried {
            if let Some(binding) = self.bindings.get(old_name) {
                next.bindings.insert(new_name.clone(), binding.clone());
            }
        }
        next.next_alias = self.next_alias;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_name_reuses_alias() {
        let mut scope = Scope::new();
        let a = scope.bind(Some("n"), EntityKind::Node);
        let b = scope.bind(Some("n"), EntityKind::Node);
        assert_eq!(a.alias, b.alias);
    }

    #[test]
    fn distinct_names_get_distinct_aliases() {
        let mut scope = Scope::new();
        let a = scope.bind(Some("a"), EntityKind::Node);
        let b = scope.bind(Some("b"), EntityKind::Node);
        assert_ne!(a.alias, b.alias);
    }
}
