//! Label Propagation over a [`super::CsrGraph`] (spec §4.6): each node
//! adopts the most frequent label among its (undirected) neighbors per
//! round, ties broken by smallest neighbor id, converging on no-change or
//! after a fixed iteration ceiling.

use std::collections::HashMap;

use super::CsrGraph;
use crate::value::AgValue;

pub fn run(graph: &CsrGraph, iterations: u32) -> Vec<AgValue> {
    let n = graph.len();
    if n == 0 {
        return Vec::new();
    }

    // Every node starts in its own community, identified by its node id.
    let mut label: Vec<i64> = (0..n).map(|i| graph.node_id(i)).collect();

    let mut rounds_run = 0;
    for _ in 0..iterations {
        rounds_run += 1;
        let mut next = label.clone();
        let mut changed = false;
        for i in 0..n {
            let neighbors = graph.undirected_neighbors(i);
            if neighbors.is_empty() {
                continue;
            }
            let mut counts: HashMap<i64, u32> = HashMap::new();
            let mut first_seen_order: Vec<i64> = Vec::new();
            for &nbr in &neighbors {
                // `undirected_neighbors` is sorted by node id, so the first
                // occurrence of each label belongs to the smallest-id
                // neighbor carrying it.
                let entry = counts.entry(label[nbr]).or_insert_with(|| {
                    first_seen_order.push(label[nbr]);
                    0
                });
                *entry += 1;
            }
            let mut best_label = first_seen_order[0];
            let mut best_count = counts[&best_label];
            for &candidate in &first_seen_order[1..] {
                let count = counts[&candidate];
                if count > best_count {
                    best_count = count;
                    best_label = candidate;
                }
            }
            if best_label != label[i] {
                next[i] = best_label;
                changed = true;
            }
        }
        label = next;
        if !changed {
            break;
        }
    }
    log::debug!("labelPropagation: converged after {rounds_run}/{iterations} rounds over {n} nodes");

    (0..n)
        .map(|i| {
            AgValue::Object(vec![
                ("node_id".to_string(), AgValue::Integer(graph.node_id(i))),
                ("community".to_string(), AgValue::Integer(label[i])),
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rusqlite::{params, Connection};

    #[test]
    fn two_disjoint_triangles_settle_into_two_communities() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        for id in [1, 2, 3, 4, 5, 6] {
            conn.execute("INSERT INTO nodes (id) VALUES (?1)", params![id]).unwrap();
        }
        let edges = [(1, 1, 2), (2, 2, 3), (3, 3, 1), (4, 4, 5), (5, 5, 6), (6, 6, 4)];
        for (id, s, d) in edges {
            conn.execute(
                "INSERT INTO edges (id, start_id, end_id, label) VALUES (?1, ?2, ?3, 'T')",
                params![id, s, d],
            )
            .unwrap();
        }
        let graph = CsrGraph::build(&conn).unwrap();
        let results = run(&graph, 10);
        let community_of = |node_id: i64| -> i64 {
            results
                .iter()
                .find_map(|r| match r {
                    AgValue::Object(fields) if fields[0].1 == AgValue::Integer(node_id) => {
                        match &fields[1].1 {
                            AgValue::Integer(c) => Some(*c),
                            _ => None,
                        }
                    }
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(community_of(1), community_of(2));
        assert_eq!(community_of(2), community_of(3));
        assert_eq!(community_of(4), community_of(5));
        assert_ne!(community_of(1), community_of(4));
    }
}
