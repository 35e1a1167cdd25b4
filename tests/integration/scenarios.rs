use rusqlite::Connection;

use graphqlite::executor::{eval::Row, Executor, QueryOutput};
use graphqlite::schema;
use graphqlite::value::AgValue;

fn conn_with_schema() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::install(&conn).unwrap();
    conn
}

#[test]
fn create_and_return_round_trips_properties_and_labels() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(&conn, "CREATE (n:Person {name: 'Alice', age: 30})", &params)
        .unwrap();
    let out = exec
        .run(&conn, "MATCH (n:Person) RETURN n.name, n.age", &params)
        .unwrap();

    match out {
        QueryOutput::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(
                rows[0],
                AgValue::Object(vec![
                    ("n.name".to_string(), AgValue::String("Alice".to_string())),
                    ("n.age".to_string(), AgValue::Integer(30)),
                ])
            );
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn write_only_query_reports_exact_status_text() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    let out = exec
        .run(&conn, "CREATE (a:Person)-[:KNOWS]->(b:Person)", &params)
        .unwrap();
    assert_eq!(
        out.to_json_string(),
        "Query executed successfully - nodes created: 2, relationships created: 1"
    );
}

#[test]
fn variable_length_traversal_finds_a_path_within_range() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(
        &conn,
        "CREATE (a:Station {name: 'A'})-[:LINE]->(b:Station {name: 'B'})-[:LINE]->(c:Station {name: 'C'})",
        &params,
    )
    .unwrap();

    let out = exec
        .run(&conn, "MATCH (a:Station {name: 'A'})-[*1..3]->(c:Station {name: 'C'}) RETURN c.name", &params)
        .unwrap();

    match out {
        QueryOutput::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(
                rows[0],
                AgValue::Object(vec![("c.name".to_string(), AgValue::String("C".to_string()))])
            );
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn shortest_path_keyword_returns_the_minimum_hop_route() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    // A -> B -> C and a direct A -> C shortcut. CREATE always allocates a
    // fresh node per pattern variable, so the shortcut edge is wired in
    // directly rather than reusing `a`/`c` from a second CREATE clause.
    exec.run(
        &conn,
        "CREATE (a:N {k: 'A'})-[:E]->(b:N {k: 'B'})-[:E]->(c:N {k: 'C'})",
        &params,
    )
    .unwrap();
    let a_id: i64 = conn
        .query_row(
            "SELECT node_id FROM node_props_text WHERE key_id = (SELECT id FROM property_keys WHERE name = 'k') AND value = 'A'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    let c_id: i64 = conn
        .query_row(
            "SELECT node_id FROM node_props_text WHERE key_id = (SELECT id FROM property_keys WHERE name = 'k') AND value = 'C'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    conn.execute(
        "INSERT INTO edges (start_id, end_id, label) VALUES (?1, ?2, 'E')",
        rusqlite::params![a_id, c_id],
    )
    .unwrap();

    let out = exec
        .run(
            &conn,
            "MATCH shortestPath((a:N {k: 'A'})-[*]->(c:N {k: 'C'})) RETURN c.k",
            &params,
        )
        .unwrap();

    match out {
        QueryOutput::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(
                rows[0],
                AgValue::Object(vec![("c.k".to_string(), AgValue::String("C".to_string()))])
            );
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn missing_parameter_is_a_fatal_error() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();
    let err = exec.run(&conn, "CREATE (n:Person {name: $name})", &params);
    assert!(err.is_err());
}

#[test]
fn extra_parameters_are_silently_ignored() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let mut params = Row::new();
    params.insert("name".to_string(), AgValue::String("Alice".to_string()));
    params.insert("unused".to_string(), AgValue::Integer(99));

    let out = exec
        .run(&conn, "CREATE (n:Person {name: $name})", &params)
        .unwrap();
    assert_eq!(
        out,
        QueryOutput::WriteSummary { nodes_created: 1, relationships_created: 0 }
    );
}

#[test]
fn detach_delete_leaves_no_orphaned_properties() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(
        &conn,
        "CREATE (a:Person {name: 'Alice'})-[:KNOWS {since: 2020}]->(b:Person {name: 'Bob'})",
        &params,
    )
    .unwrap();
    exec.run(&conn, "MATCH (n:Person) DETACH DELETE n", &params).unwrap();

    let node_props: i64 = conn
        .query_row("SELECT count(*) FROM node_props_text", [], |r| r.get(0))
        .unwrap();
    let edge_props: i64 = conn
        .query_row("SELECT count(*) FROM edge_props_int", [], |r| r.get(0))
        .unwrap();
    let labels: i64 = conn.query_row("SELECT count(*) FROM node_labels", [], |r| r.get(0)).unwrap();
    assert_eq!(node_props, 0);
    assert_eq!(edge_props, 0);
    assert_eq!(labels, 0);
}

#[test]
fn pagerank_output_is_unwrapped_json_array_summing_to_one() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(&conn, "CREATE (a:N)-[:E]->(b:N)-[:E]->(c:N)-[:E]->(a)", &params)
        .unwrap();
    let out = exec.run(&conn, "RETURN pageRank()", &params).unwrap();

    let json = out.to_json_string();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let array = parsed.as_array().unwrap();
    assert_eq!(array.len(), 3);
    let total: f64 = array.iter().map(|row| row["score"].as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn schema_install_is_safe_to_run_repeatedly() {
    let conn = conn_with_schema();
    schema::install(&conn).unwrap();
    schema::install(&conn).unwrap();
    let table_count: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'nodes'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(table_count, 1);
}

#[test]
fn union_without_all_deduplicates_rows() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(&conn, "CREATE (n:Person {name: 'Alice'})", &params).unwrap();
    let out = exec
        .run(
            &conn,
            "MATCH (n:Person) RETURN n.name UNION MATCH (n:Person) RETURN n.name",
            &params,
        )
        .unwrap();

    match out {
        QueryOutput::Rows(rows) => assert_eq!(rows.len(), 1),
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn optional_match_keeps_unmatched_rows_with_null_bindings() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(&conn, "CREATE (a:Person {name: 'Alice'})-[:KNOWS]->(b:Person {name: 'Bob'})", &params)
        .unwrap();
    exec.run(&conn, "CREATE (c:Person {name: 'Carol'})", &params).unwrap();

    let out = exec
        .run(
            &conn,
            "MATCH (p:Person) OPTIONAL MATCH (p)-[:KNOWS]->(friend:Person) RETURN p.name, friend.name",
            &params,
        )
        .unwrap();

    match out {
        QueryOutput::Rows(rows) => {
            assert_eq!(rows.len(), 3);
            assert!(rows.contains(&AgValue::Object(vec![
                ("p.name".to_string(), AgValue::String("Alice".to_string())),
                ("friend.name".to_string(), AgValue::String("Bob".to_string())),
            ])));
            assert!(rows.contains(&AgValue::Object(vec![
                ("p.name".to_string(), AgValue::String("Bob".to_string())),
                ("friend.name".to_string(), AgValue::Null),
            ])));
            assert!(rows.contains(&AgValue::Object(vec![
                ("p.name".to_string(), AgValue::String("Carol".to_string())),
                ("friend.name".to_string(), AgValue::Null),
            ])));
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn with_clause_aggregates_then_filters_the_grouped_row() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(&conn, "CREATE (a:Person)-[:KNOWS]->(b:Person)", &params).unwrap();
    exec.run(&conn, "CREATE (c:Person)", &params).unwrap();

    let out = exec
        .run(&conn, "MATCH (n:Person) WITH count(*) AS total WHERE total > 2 RETURN total", &params)
        .unwrap();
    match out {
        QueryOutput::Rows(rows) => assert_eq!(rows, vec![AgValue::Object(vec![("total".to_string(), AgValue::Integer(3))])]),
        other => panic!("expected rows, got {other:?}"),
    }

    let out = exec
        .run(&conn, "MATCH (n:Person) WITH count(*) AS total WHERE total > 5 RETURN total", &params)
        .unwrap();
    match out {
        QueryOutput::Rows(rows) => assert!(rows.is_empty()),
        other => panic!("expected zero rows, got {other:?}"),
    }
}

#[test]
fn variable_length_pattern_with_no_path_yields_zero_rows() {
    let conn = conn_with_schema();
    let mut exec = Executor::new();
    let params = Row::new();

    exec.run(&conn, "CREATE (a:Person {name: 'A'})-[:KNOWS]->(b:Person {name: 'B'})", &params)
        .unwrap();
    exec.run(&conn, "CREATE (c:Person {name: 'C'})", &params).unwrap();

    let out = exec
        .run(
            &conn,
            "MATCH (a:Person {name: 'A'}), (c:Person {name: 'C'}) MATCH (a)-[*1..3]->(c) RETURN a.name",
            &params,
        )
        .unwrap();
    match out {
        QueryOutput::Rows(rows) => assert!(rows.is_empty()),
        other => panic!("expected zero rows, got {other:?}"),
    }
}
