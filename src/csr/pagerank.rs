//! PageRank over a [`super::CsrGraph`] (spec §4.6): power iteration with
//! uniform teleportation and dangling-mass redistribution.

use super::CsrGraph;
use crate::value::AgValue;

pub fn run(graph: &CsrGraph, damping: f64, iterations: u32) -> Vec<AgValue> {
    let n = graph.len();
    if n == 0 {
        return Vec::new();
    }

    let mut rank = vec![1.0 / n as f64; n];
    for _ in 0..iterations {
        let mut next = vec![(1.0 - damping) / n as f64; n];
        let mut dangling_mass = 0.0;
        for i in 0..n {
            let out_degree = graph.out_degree(i);
            if out_degree == 0 {
                dangling_mass += rank[i];
                continue;
            }
            let share = damping * rank[i] / out_degree as f64;
            for &j in graph.out_neighbors(i) {
                next[j] += share;
            }
        }
        let dangling_share = damping * dangling_mass / n as f64;
        for v in &mut next {
            *v += dangling_share;
        }
        rank = next;
    }
    log::debug!("pageRank: {iterations} iterations over {n} nodes");

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        rank[b]
            .partial_cmp(&rank[a])
            .unwrap()
            .then_with(|| graph.node_id(a).cmp(&graph.node_id(b)))
    });

    order
        .into_iter()
        .map(|i| {
            let mut fields = vec![
                ("node_id".to_string(), AgValue::Integer(graph.node_id(i))),
            ];
            if let Some(user_id) = graph.user_id(i) {
                fields.push(("user_id".to_string(), user_id.clone()));
            }
            fields.push(("score".to_string(), AgValue::Float(rank[i])));
            AgValue::Object(fields)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rusqlite::{params, Connection};

    #[test]
    fn scores_sum_to_one_and_cover_every_node() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        for id in [1, 2, 3] {
            conn.execute("INSERT INTO nodes (id) VALUES (?1)", params![id]).unwrap();
        }
        for (id, s, d) in [(1, 1, 2), (2, 2, 3), (3, 3, 1)] {
            conn.execute(
                "INSERT INTO edges (id, start_id, end_id, label) VALUES (?1, ?2, ?3, 'T')",
                params![id, s, d],
            )
            .unwrap();
        }
        let graph = CsrGraph::build(&conn).unwrap();
        let results = run(&graph, 0.85, 20);
        assert_eq!(results.len(), 3);
        let sum: f64 = results
            .iter()
            .map(|r| match r {
                AgValue::Object(fields) => match &fields.last().unwrap().1 {
                    AgValue::Float(f) => *f,
                    _ => panic!("expected score field"),
                },
                _ => panic!("expected object"),
            })
            .sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
