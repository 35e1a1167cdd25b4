//! `db.propertyKeys()` — every interned property key, rewired from the
//! teacher's static `GraphSchema` column-name scan to a live query against
//! `property_keys` (spec §3.1's interning table is the single source of
//! truth for key identity across all typed property tables).

use rusqlite::Connection;

use crate::error::GraphQLiteError;
use crate::value::AgValue;

/// Returns one record per interned key, sorted, as `{"propertyKey": ...}`.
pub fn execute(conn: &Connection) -> Result<Vec<AgValue>, GraphQLiteError> {
    let mut stmt = conn
        .prepare("SELECT name FROM property_keys ORDER BY name")
        .map_err(|e| GraphQLiteError::execute(format!("db.propertyKeys() failed: {e}")))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| GraphQLiteError::execute(format!("db.propertyKeys() failed: {e}")))?;
    rows.map(|r| {
        r.map(|key| AgValue::Object(vec![("propertyKey".to_string(), AgValue::String(key))]))
            .map_err(|e| GraphQLiteError::execute(format!("db.propertyKeys() failed to read row: {e}")))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn lists_interned_keys_sorted() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        schema::intern_property_key(&conn, "name").unwrap();
        schema::intern_property_key(&conn, "age").unwrap();

        let results = execute(&conn).unwrap();
        assert_eq!(
            results,
            vec![
                AgValue::Object(vec![("propertyKey".to_string(), AgValue::String("age".to_string()))]),
                AgValue::Object(vec![("propertyKey".to_string(), AgValue::String("name".to_string()))]),
            ]
        );
    }
}
