//! Variable-length and shortest-path expansion (spec §4.3.5, §4.4).
//!
//! Every `*`-range relationship is lowered to a [`crate::transform::plan::VarLenStep`]
//! rather than a SQL join chain (see `transform::pattern_lower`'s module
//! doc), so it falls to this module to actually walk the graph: BFS for
//! `shortestPath(...)`, bounded DFS with relationship-uniqueness otherwise.
//! An unbounded `*` is capped at [`crate::config::EngineConfig::max_varlen_hops`].

use std::collections::{HashMap, VecDeque};

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

use crate::ast::Direction;
use crate::config::EngineConfig;
use crate::error::GraphQLiteError;
use crate::transform::plan::VarLenStep;

/// One walk through the graph: alternating node ids starting and ending on
/// a node, with one relationship id between each consecutive pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedPath {
    pub nodes: Vec<i64>,
    pub rels: Vec<i64>,
}

pub fn expand(
    conn: &Connection,
    step: &VarLenStep,
    start_id: i64,
    target_id: Option<i64>,
    cfg: &EngineConfig,
) -> Result<Vec<ExpandedPath>, GraphQLiteError> {
    let max_hops = step.max_hops.unwrap_or(cfg.max_varlen_hops).min(cfg.max_varlen_hops);
    if step.min_hops > max_hops {
        return Ok(Vec::new());
    }
    if step.shortest_only {
        shortest_expand(conn, step, start_id, target_id, step.min_hops, max_hops)
    } else {
        let mut nodes = vec![start_id];
        let mut rels = Vec::new();
        let mut results = Vec::new();
        dfs(conn, step, start_id, target_id, step.min_hops, max_hops, &mut nodes, &mut rels, &mut results)?;
        Ok(results)
    }
}

/// Neighbors of `node_id` reachable via `step`'s relationship types and
/// direction, sorted by `(other_id, rel_id)` so BFS/DFS expansion order is
/// deterministic and — for `shortestPath` — ties break on the
/// lexicographically smallest node-id sequence (spec §4.4).
fn fetch_neighbors(conn: &Connection, step: &VarLenStep, node_id: i64) -> Result<Vec<(i64, i64)>, GraphQLiteError> {
    let mut out = match step.direction {
        Direction::Right => query_side(conn, node_id, "start_id", "end_id", &step.rel_types)?,
        Direction::Left => query_side(conn, node_id, "end_id", "start_id", &step.rel_types)?,
        Direction::Both => {
            let mut a = query_side(conn, node_id, "start_id", "end_id", &step.rel_types)?;
            a.extend(query_side(conn, node_id, "end_id", "start_id", &step.rel_types)?);
            a
        }
    };
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn query_side(
    conn: &Connection,
    node_id: i64,
    self_col: &str,
    other_col: &str,
    rel_types: &[String],
) -> Result<Vec<(i64, i64)>, GraphQLiteError> {
    let type_filter = if rel_types.is_empty() {
        String::new()
    } else {
        format!(
            " AND label IN ({})",
            rel_types.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
        )
    };
    let sql = format!("SELECT id, {other_col} FROM edges WHERE {self_col} = ?1{type_filter}");
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| GraphQLiteError::execute(format!("failed to prepare neighbor query: {e}")))?;
    let mut bound: Vec<SqlValue> = vec![SqlValue::Integer(node_id)];
    bound.extend(rel_types.iter().cloned().map(SqlValue::Text));
    let rows = stmt
        .query_map(rusqlite::params_from_iter(bound.iter()), |row| {
            Ok((row.get::<_, i64>(1)?, row.get::<_, i64>(0)?))
        })
        .map_err(|e| GraphQLiteError::execute(format!("failed to query neighbors: {e}")))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| GraphQLiteError::execute(format!("failed to read neighbor row: {e}")))
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    conn: &Connection,
    step: &VarLenStep,
    current: i64,
    target: Option<i64>,
    min_hops: u32,
    max_hops: u32,
    nodes: &mut Vec<i64>,
    rels: &mut Vec<i64>,
    results: &mut Vec<ExpandedPath>,
) -> Result<(), GraphQLiteError> {
    let depth = rels.len() as u32;
    if depth >= min_hops && target.is_none_or(|t| t == current) {
        results.push(ExpandedPath { nodes: nodes.clone(), rels: rels.clone() });
    }
    if depth >= max_hops {
        return Ok(());
    }
    for (other, rel_id) in fetch_neighbors(conn, step, current)? {
        if rels.contains(&rel_id) {
            continue; // relationship uniqueness: no path reuses an edge
        }
        nodes.push(other);
        rels.push(rel_id);
        dfs(conn, step, other, target, min_hops, max_hops, nodes, rels, results)?;
        nodes.pop();
        rels.pop();
    }
    Ok(())
}

struct QueueItem {
    node: i64,
    nodes: Vec<i64>,
    rels: Vec<i64>,
}

fn shortest_expand(
    conn: &Connection,
    step: &VarLenStep,
    start: i64,
    target: Option<i64>,
    min_hops: u32,
    max_hops: u32,
) -> Result<Vec<ExpandedPath>, GraphQLiteError> {
    let mut visited_at_depth: HashMap<i64, u32> = HashMap::new();
    visited_at_depth.insert(start, 0);
    let mut queue = VecDeque::new();
    queue.push_back(QueueItem { node: start, nodes: vec![start], rels: Vec::new() });

    let mut results = Vec::new();
    while let Some(item) = queue.pop_front() {
        let depth = item.rels.len() as u32;
        if depth >= min_hops {
            match target {
                Some(t) if item.node == t => {
                    results.push(ExpandedPath { nodes: item.nodes, rels: item.rels });
                    return Ok(results); // BFS: first hit is shortest
                }
                None => results.push(ExpandedPath { nodes: item.nodes.clone(), rels: item.rels.clone() }),
                _ => {}
            }
        }
        if depth >= max_hops {
            continue;
        }
        for (other, rel_id) in fetch_neighbors(conn, step, item.node)? {
            if item.rels.contains(&rel_id) {
                continue;
            }
            let next_depth = depth + 1;
            if visited_at_depth.get(&other).is_some_and(|&d| d <= next_depth) {
                continue;
            }
            visited_at_depth.insert(other, next_depth);
            let mut nodes = item.nodes.clone();
            nodes.push(other);
            let mut rels = item.rels.clone();
            rels.push(rel_id);
            queue.push_back(QueueItem { node: other, nodes, rels });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rusqlite::params;

    fn chain(conn: &Connection, len: i64) {
        schema::install(conn).unwrap();
        for i in 1..=len {
            conn.execute("INSERT INTO nodes (id) VALUES (?1)", params![i]).unwrap();
        }
        for i in 1..len {
            conn.execute(
                "INSERT INTO edges (id, start_id, end_id, label) VALUES (?1, ?2, ?3, 'NEXT')",
                params![i, i, i + 1],
            )
            .unwrap();
        }
    }

    fn step(min: u32, max: Option<u32>, shortest: bool) -> VarLenStep {
        VarLenStep {
            start_var: "a".to_string(),
            end_var: Some("b".to_string()),
            rel_var: None,
            rel_types: vec!["NEXT".to_string()],
            direction: Direction::Right,
            min_hops: min,
            max_hops: max,
            shortest_only: shortest,
            optional: false,
        }
    }

    #[test]
    fn bounded_range_enumerates_paths_by_hop_count() {
        let conn = Connection::open_in_memory().unwrap();
        chain(&conn, 4); // 1-2-3-4
        let cfg = EngineConfig::default();
        let s = step(1, Some(2), false);
        let paths = expand(&conn, &s, 1, None, &cfg).unwrap();
        // 1 one-hop path (1->2) and 1 two-hop path (1->2->3)
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().any(|p| p.nodes == vec![1, 2]));
        assert!(paths.iter().any(|p| p.nodes == vec![1, 2, 3]));
    }

    #[test]
    fn shortest_path_to_specific_target() {
        let conn = Connection::open_in_memory().unwrap();
        chain(&conn, 4);
        let cfg = EngineConfig::default();
        let s = step(1, None, true);
        let paths = expand(&conn, &s, 1, Some(3), &cfg).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes, vec![1, 2, 3]);
        assert_eq!(paths[0].rels, vec![1, 2]);
    }

    #[test]
    fn unreachable_target_yields_no_paths() {
        let conn = Connection::open_in_memory().unwrap();
        chain(&conn, 2);
        let cfg = EngineConfig::default();
        let s = step(1, None, true);
        let paths = expand(&conn, &s, 2, Some(1), &cfg).unwrap();
        assert!(paths.is_empty());
    }
}
