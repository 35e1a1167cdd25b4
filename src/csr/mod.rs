//! Compressed Sparse Row graph cache (spec §4.6): a dense snapshot of
//! `nodes`/`edges` the algorithms in this module run over, instead of
//! re-querying SQLite per iteration. Invalidated by
//! `executor::cache::ExecutorCache` whenever a write is observed.

pub mod degree;
pub mod label_propagation;
pub mod pagerank;

use std::collections::HashMap;

use rusqlite::Connection;

use crate::error::GraphQLiteError;
use crate::schema::{self, PropKind};
use crate::value::AgValue;

/// A directed graph snapshot: forward and reverse adjacency in CSR form,
/// plus the dense-index ↔ node-id mapping the loader builds while scanning
/// `nodes`/`edges` in id order (spec §4.6).
pub struct CsrGraph {
    dense_to_id: Vec<i64>,
    id_to_dense: HashMap<i64, usize>,
    out_row_ptr: Vec<usize>,
    out_col_idx: Vec<usize>,
    in_row_ptr: Vec<usize>,
    in_col_idx: Vec<usize>,
    /// The node's own `id` property value, when one was ever written — the
    /// "user id" distinct from the internal primary key (spec §4.6).
    user_ids: Vec<Option<AgValue>>,
}

impl CsrGraph {
    pub fn build(conn: &Connection) -> Result<CsrGraph, GraphQLiteError> {
        let dense_to_id = load_node_ids(conn)?;
        let id_to_dense: HashMap<i64, usize> =
            dense_to_id.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let n = dense_to_id.len();

        let edge_pairs = load_edge_pairs(conn, &id_to_dense)?;

        let (out_row_ptr, out_col_idx) = build_csr(n, edge_pairs.iter().map(|&(s, d)| (s, d)));
        let (in_row_ptr, in_col_idx) = build_csr(n, edge_pairs.iter().map(|&(s, d)| (d, s)));

        let user_ids = load_user_ids(conn, &dense_to_id)?;

        Ok(CsrGraph {
            dense_to_id,
            id_to_dense,
            out_row_ptr,
            out_col_idx,
            in_row_ptr,
            in_col_idx,
            user_ids,
        })
    }

    pub fn len(&self) -> usize {
        self.dense_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense_to_id.is_empty()
    }

    pub fn node_id(&self, dense: usize) -> i64 {
        self.dense_to_id[dense]
    }

    pub fn dense_index(&self, node_id: i64) -> Option<usize> {
        self.id_to_dense.get(&node_id).copied()
    }

    pub fn user_id(&self, dense: usize) -> Option<&AgValue> {
        self.user_ids[dense].as_ref()
    }

    pub fn out_neighbors(&self, dense: usize) -> &[usize] {
        &self.out_col_idx[self.out_row_ptr[dense]..self.out_row_ptr[dense + 1]]
    }

    pub fn in_neighbors(&self, dense: usize) -> &[usize] {
        &self.in_col_idx[self.in_row_ptr[dense]..self.in_row_ptr[dense + 1]]
    }

    pub fn out_degree(&self, dense: usize) -> usize {
        self.out_neighbors(dense).len()
    }

    pub fn in_degree(&self, dense: usize) -> usize {
        self.in_neighbors(dense).len()
    }

    /// Undirected neighbor set used by label propagation: the union of
    /// in- and out-neighbors, deduplicated and sorted by node id.
    pub fn undirected_neighbors(&self, dense: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> =
            self.out_neighbors(dense).iter().chain(self.in_neighbors(dense)).copied().collect();
        neighbors.sort_unstable_by_key(|&d| self.dense_to_id[d]);
        neighbors.dedup();
        neighbors
    }
}

fn load_node_ids(conn: &Connection) -> Result<Vec<i64>, GraphQLiteError> {
    let mut stmt = conn
        .prepare("SELECT id FROM nodes ORDER BY id")
        .map_err(|e| GraphQLiteError::execute(format!("failed to scan nodes for CSR build: {e}")))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(|e| GraphQLiteError::execute(format!("failed to scan nodes for CSR build: {e}")))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| GraphQLiteError::execute(format!("failed to read node row: {e}")))
}

fn load_edge_pairs(
    conn: &Connection,
    id_to_dense: &HashMap<i64, usize>,
) -> Result<Vec<(usize, usize)>, GraphQLiteError> {
    let mut stmt = conn
        .prepare("SELECT start_id, end_id FROM edges ORDER BY start_id, end_id")
        .map_err(|e| GraphQLiteError::execute(format!("failed to scan edges for CSR build: {e}")))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| GraphQLiteError::execute(format!("failed to scan edges for CSR build: {e}")))?;
    let mut pairs = Vec::new();
    for row in rows {
        let (start, end) = row.map_err(|e| GraphQLiteError::execute(format!("failed to read edge row: {e}")))?;
        if let (Some(&s), Some(&d)) = (id_to_dense.get(&start), id_to_dense.get(&end)) {
            pairs.push((s, d));
        }
    }
    Ok(pairs)
}

/// Builds `(row_ptr, col_idx)` from an iterator of `(src, dst)` dense pairs.
/// Used for both the forward and the reverse (in-) adjacency.
fn build_csr(n: usize, pairs: impl Iterator<Item = (usize, usize)> + Clone) -> (Vec<usize>, Vec<usize>) {
    let mut row_ptr = vec![0usize; n + 1];
    for (src, _) in pairs.clone() {
        row_ptr[src + 1] += 1;
    }
    for i in 0..n {
        row_ptr[i + 1] += row_ptr[i];
    }
    let mut col_idx = vec![0usize; row_ptr[n]];
    let mut cursor = row_ptr.clone();
    for (src, dst) in pairs {
        col_idx[cursor[src]] = dst;
        cursor[src] += 1;
    }
    (row_ptr, col_idx)
}

fn load_user_ids(conn: &Connection, dense_to_id: &[i64]) -> Result<Vec<Option<AgValue>>, GraphQLiteError> {
    let mut user_ids = vec![None; dense_to_id.len()];
    let Some(key_id) = schema::lookup_property_key(conn, "id")? else {
        return Ok(user_ids);
    };
    let id_to_dense: HashMap<i64, usize> =
        dense_to_id.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    for kind in PropKind::ALL {
        let table = kind.table(false);
        let sql = format!("SELECT node_id, value FROM {table} WHERE key_id = ?1");
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| GraphQLiteError::execute(format!("failed to query {table}: {e}")))?;
        let rows = stmt
            .query_map(rusqlite::params![key_id], |row| {
                let node_id: i64 = row.get(0)?;
                let value = match kind {
                    PropKind::Int => AgValue::Integer(row.get(1)?),
                    PropKind::Real => AgValue::Float(row.get(1)?),
                    PropKind::Text => AgValue::String(row.get(1)?),
                    PropKind::Bool => AgValue::Bool(row.get::<_, i64>(1)? != 0),
                };
                Ok((node_id, value))
            })
            .map_err(|e| GraphQLiteError::execute(format!("failed to query {table}: {e}")))?;
        for row in rows {
            let (node_id, value) = row.map_err(|e| GraphQLiteError::execute(format!("failed to read {table} row: {e}")))?;
            if let Some(&dense) = id_to_dense.get(&node_id) {
                user_ids[dense] = Some(value);
            }
        }
    }
    Ok(user_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn sample_graph() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        for id in [1, 2, 3, 4] {
            conn.execute("INSERT INTO nodes (id) VALUES (?1)", params![id]).unwrap();
        }
        // A -> B, A -> D, B -> C, D -> B
        for (id, s, d) in [(1, 1, 2), (2, 1, 4), (3, 2, 3), (4, 4, 2)] {
            conn.execute(
                "INSERT INTO edges (id, start_id, end_id, label) VALUES (?1, ?2, ?3, 'T')",
                params![id, s, d],
            )
            .unwrap();
        }
        conn
    }

    #[test]
    fn degree_counts_match_expected_shape() {
        let conn = sample_graph();
        let graph = CsrGraph::build(&conn).unwrap();
        let b = graph.dense_index(2).unwrap();
        assert_eq!(graph.in_degree(b), 2); // from A and D
        assert_eq!(graph.out_degree(b), 1); // to C
    }

    #[test]
    fn self_loop_counts_both_directions() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute("INSERT INTO nodes (id) VALUES (1)", []).unwrap();
        conn.execute(
            "INSERT INTO edges (id, start_id, end_id, label) VALUES (1, 1, 1, 'SELF')",
            [],
        )
        .unwrap();
        let graph = CsrGraph::build(&conn).unwrap();
        let dense = graph.dense_index(1).unwrap();
        assert_eq!(graph.out_degree(dense), 1);
        assert_eq!(graph.in_degree(dense), 1);
    }
}
