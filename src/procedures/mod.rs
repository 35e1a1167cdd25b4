//! `CALL` procedure dispatch (spec §4.1, SPEC_FULL.md §3): schema
//! introspection procedures that query the live tables from `src/schema.rs`
//! directly, rather than the teacher's external `GraphSchema` catalog.
//!
//! Neo4j/APOC-compatibility procedures the teacher carried for its HTTP
//! multi-schema surface (`apoc.meta.schema`, `db.schema.*TypeProperties`,
//! `dbms.components`, `dbms.*` stubs, `show databases`) have no counterpart
//! here — this engine has exactly one schema, reachable on one connection.

pub mod db_labels;
pub mod db_property_keys;
pub mod db_relationship_types;

use rusqlite::Connection;

use crate::error::GraphQLiteError;
use crate::value::AgValue;

/// Dispatches a `CALL procedure_name(...)` to its implementation. Arguments
/// and `YIELD` filtering are not consulted here — every procedure below is
/// nullary and returns its full record set; column selection happens in the
/// executor the same way it does for a driving-SQL row.
pub fn call(conn: &Connection, procedure_name: &str) -> Result<Vec<AgValue>, GraphQLiteError> {
    match procedure_name {
        "db.labels" => db_labels::execute(conn),
        "db.propertyKeys" => db_property_keys::execute(conn),
        "db.relationshipTypes" => db_relationship_types::execute(conn),
        other => Err(GraphQLiteError::execute(format!("unknown procedure {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn unknown_procedure_is_an_execute_error() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        let err = call(&conn, "dbms.components").unwrap_err();
        assert_eq!(err.kind(), "Execute");
    }
}
