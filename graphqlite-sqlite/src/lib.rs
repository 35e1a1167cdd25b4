//! SQLite bindings glue: registers `cypher(query[, params_json])` and
//! `regexp(pattern, text)` as scalar functions on a connection (spec §6).
//!
//! Grounded on the bundled (non-extension) registration path in
//! `bundled_init.c`: one [`Executor`] per connection, created lazily on
//! first call and cached for the connection's lifetime via the closure's
//! own captured state rather than SQLite's user-data pointer (the Rust
//! closure already owns that lifetime).

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Error as SqlError, Result as SqlResult};

use graphqlite::executor::eval::Row;
use graphqlite::executor::Executor;
use graphqlite::value::AgValue;

/// Registers `cypher`, `cypher/2` and `regexp` on `conn`. Call once per
/// connection, immediately after opening it (and after [`graphqlite::schema::install`]
/// if the caller wants the schema to exist up front — `cypher()` itself
/// never installs the schema).
pub fn register(conn: &Connection) -> SqlResult<()> {
    let executor = Rc::new(RefCell::new(Executor::new()));

    let exec = Rc::clone(&executor);
    conn.create_scalar_function(
        "cypher",
        1,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let query_text: String = ctx.get(0)?;
            run_cypher(&exec, ctx, &query_text, &Row::new())
        },
    )?;

    let exec = Rc::clone(&executor);
    conn.create_scalar_function(
        "cypher",
        2,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let query_text: String = ctx.get(0)?;
            let params = match ctx.get_raw(1) {
                rusqlite::types::ValueRef::Null => Row::new(),
                _ => {
                    let params_json: String = ctx.get(1)?;
                    parse_params(&params_json).map_err(to_sql_error)?
                }
            };
            run_cypher(&exec, ctx, &query_text, &params)
        },
    )?;

    register_regexp(conn)?;

    Ok(())
}

fn register_regexp(conn: &Connection) -> SqlResult<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let saved_re: Option<&Regex> = ctx.get_aux(0)?;
            let new_re = match saved_re {
                None => {
                    let pattern: String = ctx.get(0)?;
                    match Regex::new(&pattern) {
                        Ok(re) => Some(re),
                        Err(e) => return Err(SqlError::UserFunctionError(Box::new(e))),
                    }
                }
                Some(_) => None,
            };

            let is_match = {
                let re = saved_re.unwrap_or_else(|| new_re.as_ref().unwrap());
                let text = ctx
                    .get_raw(1)
                    .as_str()
                    .map_err(|e| SqlError::UserFunctionError(e.into()))?;
                re.is_match(text)
            };

            if let Some(re) = new_re {
                ctx.set_aux(0, re);
            }

            Ok(is_match)
        },
    )
}

/// Runs one `cypher()` call against the connection the function was invoked
/// on. Reentering the same connection from inside a scalar function is the
/// documented use of `Context::get_connection` (mirrors `sqlite3_context_db_handle`
/// in the original C bundled build) — sound here because `Executor::run`
/// only issues further statements on this same connection, never recurses
/// into `cypher()` itself.
fn run_cypher(
    executor: &Rc<RefCell<Executor>>,
    ctx: &rusqlite::functions::Context<'_>,
    query_text: &str,
    params: &Row,
) -> SqlResult<String> {
    let conn_ref = unsafe { ctx.get_connection()? };
    let mut executor = executor.borrow_mut();
    executor
        .run(&conn_ref, query_text, params)
        .map(|out| out.to_json_string())
        .map_err(to_sql_error)
}

fn parse_params(params_json: &str) -> Result<Row, graphqlite::error::GraphQLiteError> {
    match AgValue::from_json_str(params_json)? {
        AgValue::Object(entries) => Ok(entries.into_iter().collect()),
        AgValue::Null => Ok(Row::new()),
        other => Err(graphqlite::error::GraphQLiteError::execute(format!(
            "cypher() params argument must be a JSON object, got {other:?}"
        ))),
    }
}

fn to_sql_error(err: graphqlite::error::GraphQLiteError) -> SqlError {
    SqlError::UserFunctionError(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphqlite::schema;

    fn conn_with_schema() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        register(&conn).unwrap();
        conn
    }

    #[test]
    fn cypher_function_round_trips_a_write_then_read() {
        let conn = conn_with_schema();
        conn.execute("SELECT cypher('CREATE (n:Person {name: ''Alice''})')", [])
            .unwrap();

        let json: String = conn
            .query_row("SELECT cypher('MATCH (n:Person) RETURN n.name')", [], |r| r.get(0))
            .unwrap();
        assert_eq!(json, r#"[{"n.name":"Alice"}]"#);
    }

    #[test]
    fn cypher_function_with_params_json_substitutes_the_parameter() {
        let conn = conn_with_schema();
        let json: String = conn
            .query_row(
                "SELECT cypher('CREATE (n:Person {name: $name})', '{\"name\": \"Bob\"}')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(json, "Query executed successfully - nodes created: 1, relationships created: 0");
    }

    #[test]
    fn regexp_function_matches_like_the_cypher_operator() {
        let conn = Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();
        let is_match: bool = conn
            .query_row("SELECT 'hello123' REGEXP '^[a-z]+[0-9]+$'", [], |r| r.get(0))
            .unwrap();
        assert!(is_match);
    }

    #[test]
    fn executor_cache_survives_across_calls_on_the_same_connection() {
        let conn = conn_with_schema();
        conn.execute("SELECT cypher('CREATE (a:N)-[:E]->(b:N)-[:E]->(c:N)-[:E]->(a)')", [])
            .unwrap();
        let json: String = conn
            .query_row("SELECT cypher('RETURN pageRank()')", [], |r| r.get(0))
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 3);
    }
}
