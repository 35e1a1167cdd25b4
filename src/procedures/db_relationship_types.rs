//! `db.relationshipTypes()` — every distinct relationship type currently in
//! the schema, rewired from the teacher's static `GraphSchema` lookup (which
//! parsed composite `TYPE::Start::End` catalog keys) to a live query
//! against `edges.label`, since this schema has no per-endpoint catalog.

use rusqlite::Connection;

use crate::error::GraphQLiteError;
use crate::value::AgValue;

/// Returns one record per distinct relationship type, sorted, as
/// `{"relationshipType": ...}`.
pub fn execute(conn: &Connection) -> Result<Vec<AgValue>, GraphQLiteError> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT label FROM edges ORDER BY label")
        .map_err(|e| GraphQLiteError::execute(format!("db.relationshipTypes() failed: {e}")))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| GraphQLiteError::execute(format!("db.relationshipTypes() failed: {e}")))?;
    rows.map(|r| {
        r.map(|rel_type| AgValue::Object(vec![("relationshipType".to_string(), AgValue::String(rel_type))]))
            .map_err(|e| GraphQLiteError::execute(format!("db.relationshipTypes() failed to read row: {e}")))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rusqlite::params;

    #[test]
    fn lists_distinct_relationship_types_sorted() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        for id in [1, 2] {
            conn.execute("INSERT INTO nodes (id) VALUES (?1)", params![id]).unwrap();
        }
        conn.execute(
            "INSERT INTO edges (id, start_id, end_id, label) VALUES (1, 1, 2, 'LIKED')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO edges (id, start_id, end_id, label) VALUES (2, 2, 1, 'FOLLOWS')",
            [],
        )
        .unwrap();

        let results = execute(&conn).unwrap();
        assert_eq!(
            results,
            vec![
                AgValue::Object(vec![("relationshipType".to_string(), AgValue::String("FOLLOWS".to_string()))]),
                AgValue::Object(vec![("relationshipType".to_string(), AgValue::String("LIKED".to_string()))]),
            ]
        );
    }
}
