//! Materializes a `nodes`/`edges` row plus its typed properties into an
//! [`AgValue`] (spec §4.4's "assemble rows"). One query per typed table per
//! entity, grounded on the typed-EAV shape of `src/schema.rs`.

use rusqlite::{params, Connection};

use crate::error::GraphQLiteError;
use crate::schema::PropKind;
use crate::value::{AgValue, Edge, Property, Vertex};

pub fn load_vertex(conn: &Connection, id: i64) -> Result<Vertex, GraphQLiteError> {
    let labels = load_labels(conn, id)?;
    let properties = load_properties(conn, id, false)?;
    Ok(Vertex { id, labels, properties })
}

pub fn load_edge(conn: &Connection, id: i64) -> Result<Edge, GraphQLiteError> {
    let (label, start_id, end_id) = conn
        .query_row(
            "SELECT label, start_id, end_id FROM edges WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
        )
        .map_err(|e| GraphQLiteError::execute(format!("failed to load edge {id}: {e}")))?;
    let properties = load_properties(conn, id, true)?;
    Ok(Edge {
        id,
        label,
        start_id,
        end_id,
        properties,
    })
}

fn load_labels(conn: &Connection, node_id: i64) -> Result<Vec<String>, GraphQLiteError> {
    let mut stmt = conn
        .prepare_cached("SELECT label FROM node_labels WHERE node_id = ?1 ORDER BY label")
        .map_err(|e| GraphQLiteError::execute(format!("failed to query labels: {e}")))?;
    let rows = stmt
        .query_map(params![node_id], |row| row.get::<_, String>(0))
        .map_err(|e| GraphQLiteError::execute(format!("failed to query labels: {e}")))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| GraphQLiteError::execute(format!("failed to read label row: {e}")))
}

fn load_properties(
    conn: &Connection,
    entity_id: i64,
    on_edge: bool,
) -> Result<Vec<Property>, GraphQLiteError> {
    let mut properties = Vec::new();
    for kind in PropKind::ALL {
        let table = kind.table(on_edge);
        let id_col = if on_edge { "edge_id" } else { "node_id" };
        let sql = format!(
            "SELECT pk.name, p.value FROM {table} p JOIN property_keys pk ON pk.id = p.key_id WHERE p.{id_col} = ?1"
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| GraphQLiteError::execute(format!("failed to query {table}: {e}")))?;
        let rows = stmt
            .query_map(params![entity_id], |row| {
                let name: String = row.get(0)?;
                Ok((name, kind, row_value(row, kind)?))
            })
            .map_err(|e| GraphQLiteError::execute(format!("failed to query {table}: {e}")))?;
        for row in rows {
            let (name, _, value) =
                row.map_err(|e| GraphQLiteError::execute(format!("failed to read {table} row: {e}")))?;
            properties.push(Property { key: name, value });
        }
    }
    Ok(properties)
}

fn row_value(row: &rusqlite::Row<'_>, kind: PropKind) -> rusqlite::Result<AgValue> {
    Ok(match kind {
        PropKind::Int => AgValue::Integer(row.get(1)?),
        PropKind::Real => AgValue::Float(row.get(1)?),
        PropKind::Text => AgValue::String(row.get(1)?),
        PropKind::Bool => AgValue::Bool(row.get::<_, i64>(1)? != 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn load_vertex_assembles_labels_and_properties() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute("INSERT INTO nodes (id) VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO node_labels (node_id, label) VALUES (1, 'Person')", [])
            .unwrap();
        let key_id = schema::intern_property_key(&conn, "name").unwrap();
        conn.execute(
            "INSERT INTO node_props_text (node_id, key_id, value) VALUES (1, ?1, 'Alice')",
            params![key_id],
        )
        .unwrap();

        let vertex = load_vertex(&conn, 1).unwrap();
        assert_eq!(vertex.labels, vec!["Person".to_string()]);
        assert_eq!(vertex.properties.len(), 1);
        assert_eq!(vertex.properties[0].key, "name");
        assert_eq!(vertex.properties[0].value, AgValue::String("Alice".to_string()));
    }
}
