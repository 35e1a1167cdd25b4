//! `db.labels()` — every distinct node label currently in the schema.
//!
//! Grounded on the teacher's Neo4j-compatible procedure of the same name,
//! rewired from its static `GraphSchema` catalog lookup to a live query
//! against `node_labels` (spec §3.1's schema is the only catalog here).

use rusqlite::Connection;

use crate::error::GraphQLiteError;
use crate::value::AgValue;

/// Returns one record per distinct label, sorted, as `{"label": ...}`.
pub fn execute(conn: &Connection) -> Result<Vec<AgValue>, GraphQLiteError> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT label FROM node_labels ORDER BY label")
        .map_err(|e| GraphQLiteError::execute(format!("db.labels() failed: {e}")))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| GraphQLiteError::execute(format!("db.labels() failed: {e}")))?;
    rows.map(|r| {
        r.map(|label| AgValue::Object(vec![("label".to_string(), AgValue::String(label))]))
            .map_err(|e| GraphQLiteError::execute(format!("db.labels() failed to read row: {e}")))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn lists_distinct_labels_sorted() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute("INSERT INTO nodes (id) VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO nodes (id) VALUES (2)", []).unwrap();
        conn.execute("INSERT INTO node_labels (node_id, label) VALUES (1, 'Post')", [])
            .unwrap();
        conn.execute("INSERT INTO node_labels (node_id, label) VALUES (2, 'User')", [])
            .unwrap();
        conn.execute("INSERT INTO node_labels (node_id, label) VALUES (2, 'Post')", [])
            .unwrap();

        let results = execute(&conn).unwrap();
        assert_eq!(
            results,
            vec![
                AgValue::Object(vec![("label".to_string(), AgValue::String("Post".to_string()))]),
                AgValue::Object(vec![("label".to_string(), AgValue::String("User".to_string()))]),
            ]
        );
    }
}
