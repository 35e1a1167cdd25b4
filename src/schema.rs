//! Storage schema (spec §3.1): nodes/edges, multi-valued labels, and the
//! typed EAV property tables keyed by an interned property name.
//!
//! DDL is grounded on `examples/original_source/src/schema.c` — table names,
//! column names, and the index list all mirror it. Idempotent
//! `CREATE TABLE IF NOT EXISTS` means `install` can run on every connection
//! open without needing a separate "is this schema already there" check,
//! matching the original's own idempotency test.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::GraphQLiteError;

const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY,
    start_id INTEGER NOT NULL,
    end_id INTEGER NOT NULL,
    label TEXT NOT NULL,
    FOREIGN KEY (start_id) REFERENCES nodes(id),
    FOREIGN KEY (end_id) REFERENCES nodes(id)
);

CREATE TABLE IF NOT EXISTS node_labels (
    node_id INTEGER NOT NULL,
    label TEXT NOT NULL,
    PRIMARY KEY (node_id, label),
    FOREIGN KEY (node_id) REFERENCES nodes(id)
);

CREATE TABLE IF NOT EXISTS property_keys (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS node_props_int (
    node_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (node_id, key_id),
    FOREIGN KEY (node_id) REFERENCES nodes(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

CREATE TABLE IF NOT EXISTS node_props_real (
    node_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (node_id, key_id),
    FOREIGN KEY (node_id) REFERENCES nodes(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

CREATE TABLE IF NOT EXISTS node_props_text (
    node_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (node_id, key_id),
    FOREIGN KEY (node_id) REFERENCES nodes(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

CREATE TABLE IF NOT EXISTS node_props_bool (
    node_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (node_id, key_id),
    FOREIGN KEY (node_id) REFERENCES nodes(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

CREATE TABLE IF NOT EXISTS edge_props_int (
    edge_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (edge_id, key_id),
    FOREIGN KEY (edge_id) REFERENCES edges(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

CREATE TABLE IF NOT EXISTS edge_props_real (
    edge_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (edge_id, key_id),
    FOREIGN KEY (edge_id) REFERENCES edges(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

CREATE TABLE IF NOT EXISTS edge_props_text (
    edge_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (edge_id, key_id),
    FOREIGN KEY (edge_id) REFERENCES edges(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

CREATE TABLE IF NOT EXISTS edge_props_bool (
    edge_id INTEGER NOT NULL,
    key_id INTEGER NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (edge_id, key_id),
    FOREIGN KEY (edge_id) REFERENCES edges(id),
    FOREIGN KEY (key_id) REFERENCES property_keys(id)
);

-- Composite, not single-column: traversal always filters by relationship
-- type alongside the endpoint, and property lookups always filter by key
-- alongside value, so the index needs to serve both predicates at once.
CREATE INDEX IF NOT EXISTS idx_edges_start_label ON edges(start_id, label);
CREATE INDEX IF NOT EXISTS idx_edges_end_label ON edges(end_id, label);
CREATE INDEX IF NOT EXISTS idx_edges_label ON edges(label);
CREATE INDEX IF NOT EXISTS idx_node_labels_label ON node_labels(label, node_id);
CREATE INDEX IF NOT EXISTS idx_node_props_int_kv ON node_props_int(key_id, value, node_id);
CREATE INDEX IF NOT EXISTS idx_node_props_real_kv ON node_props_real(key_id, value, node_id);
CREATE INDEX IF NOT EXISTS idx_node_props_text_kv ON node_props_text(key_id, value, node_id);
CREATE INDEX IF NOT EXISTS idx_node_props_bool_kv ON node_props_bool(key_id, value, node_id);
CREATE INDEX IF NOT EXISTS idx_edge_props_int_kv ON edge_props_int(key_id, value, edge_id);
CREATE INDEX IF NOT EXISTS idx_edge_props_real_kv ON edge_props_real(key_id, value, edge_id);
CREATE INDEX IF NOT EXISTS idx_edge_props_text_kv ON edge_props_text(key_id, value, edge_id);
CREATE INDEX IF NOT EXISTS idx_edge_props_bool_kv ON edge_props_bool(key_id, value, edge_id);
";

/// Scalar property storage kind, one table pair (node/edge) per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    Int,
    Real,
    Text,
    Bool,
}

impl PropKind {
    fn node_table(self) -> &'static str {
        match self {
            PropKind::Int => "node_props_int",
            PropKind::Real => "node_props_real",
            PropKind::Text => "node_props_text",
            PropKind::Bool => "node_props_bool",
        }
    }

    fn edge_table(self) -> &'static str {
        match self {
            PropKind::Int => "edge_props_int",
            PropKind::Real => "edge_props_real",
            PropKind::Text => "edge_props_text",
            PropKind::Bool => "edge_props_bool",
        }
    }

    pub fn table(self, on_edge: bool) -> &'static str {
        if on_edge {
            self.edge_table()
        } else {
            self.node_table()
        }
    }

    pub const ALL: [PropKind; 4] = [PropKind::Int, PropKind::Real, PropKind::Text, PropKind::Bool];
}

/// Install the schema on a connection. Safe to call every time a connection
/// is opened; all DDL is `IF NOT EXISTS`.
pub fn install(conn: &Connection) -> Result<(), GraphQLiteError> {
    conn.execute_batch(SCHEMA_DDL)
        .map_err(|e| GraphQLiteError::schema(format!("failed to install schema: {e}")))?;
    log::debug!("schema installed (idempotent)");
    Ok(())
}

/// Intern a property key, returning its stable id. Grounded on
/// `examples/original_source/src/schema.c`'s `property_keys` table acting as
/// the single source of truth for key identity across all typed tables.
pub fn intern_property_key(conn: &Connection, name: &str) -> Result<i64, GraphQLiteError> {
    conn.execute(
        "INSERT INTO property_keys (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )
    .map_err(|e| GraphQLiteError::schema(format!("failed to intern property key {name}: {e}")))?;

    conn.query_row(
        "SELECT id FROM property_keys WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .map_err(|e| GraphQLiteError::schema(format!("failed to look up property key {name}: {e}")))
}

pub fn lookup_property_key(conn: &Connection, name: &str) -> Result<Option<i64>, GraphQLiteError> {
    conn.query_row(
        "SELECT id FROM property_keys WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| GraphQLiteError::schema(format!("failed to look up property key {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        install(&conn).unwrap();
        install(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'nodes'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn property_key_interning_is_stable() {
        let conn = Connection::open_in_memory().unwrap();
        install(&conn).unwrap();
        let a = intern_property_key(&conn, "name").unwrap();
        let b = intern_property_key(&conn, "name").unwrap();
        assert_eq!(a, b);
        let c = intern_property_key(&conn, "age").unwrap();
        assert_ne!(a, c);
        assert_eq!(lookup_property_key(&conn, "name").unwrap(), Some(a));
        assert_eq!(lookup_property_key(&conn, "missing").unwrap(), None);
    }
}
