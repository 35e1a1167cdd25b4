//! AST → SQL transform (spec §4.3). Compiles one [`crate::ast::SingleQuery`]
//! into a [`plan::Plan`]: prologue writes, a driving SELECT, and a
//! post-process plan (variable-length steps, algorithm dispatch, and
//! residual filters) for the executor to carry out.
//!
//! Grounded on the teacher's two-stage `query_planner` → `render_plan`
//! split (logical plan, then SQL text), collapsed here into one pass since
//! this engine targets a single fixed schema rather than an arbitrary
//! ClickHouse view catalog.

pub mod pattern_lower;
pub mod plan;
pub mod return_lower;
pub mod scope;
pub mod write_lower;

use rusqlite::Connection;

use crate::ast::SingleQuery;
use crate::error::GraphQLiteError;
use plan::Plan;
use scope::Scope;

pub fn compile(conn: &Connection, query: &SingleQuery) -> Result<Plan, GraphQLiteError> {
    let mut scope = Scope::new();
    let mut plan = Plan::default();

    let mut mandatory_patterns = Vec::new();
    let mut optional_patterns = Vec::new();
    for reading in &query.reading_clauses {
        match reading {
            crate::ast::ReadingClause::Match(m) => {
                mandatory_patterns.extend(m.patterns.clone());
                if let Some(w) = &m.where_clause {
                    plan.post_filter.push(w.clone());
                }
            }
            crate::ast::ReadingClause::OptionalMatch(m) => {
                optional_patterns.extend(m.patterns.clone());
                // An OPTIONAL MATCH's own WHERE narrows which rows satisfy
                // the optional join (it belongs on the LEFT JOIN's ON
                // clause); folding arbitrary expressions into ON isn't
                // implemented, so it's evaluated post-row like any other
                // filter. A row where the optional side stayed null and the
                // predicate mentions it is dropped instead of kept with
                // null bindings — a known limitation, not full ON-clause
                // folding.
                if let Some(w) = &m.where_clause {
                    plan.post_filter.push(w.clone());
                }
            }
        }
    }

    if !mandatory_patterns.is_empty() || !optional_patterns.is_empty() {
        let mut lowered = pattern_lower::LoweredPattern::new();
        pattern_lower::lower_patterns(conn, &mut scope, &mandatory_patterns, false, &mut lowered)?;
        pattern_lower::lower_patterns(conn, &mut scope, &optional_patterns, true, &mut lowered)?;
        plan.varlen_steps = lowered.varlen_steps;

        let mut from_parts = lowered.tables;
        let mut where_conditions = lowered.conditions;
        let mut optional_joins = lowered.optional_joins;
        if from_parts.is_empty() && !optional_joins.is_empty() {
            // Nothing precedes these OPTIONAL MATCH patterns: the first
            // optional join becomes the base FROM table (there is no inner
            // side to outer-join against), and its own ON conditions become
            // ordinary filters.
            let first = optional_joins.remove(0);
            let (table_ref, on_clause) = first
                .strip_prefix("LEFT JOIN ")
                .and_then(|rest| rest.split_once(" ON "))
                .expect("optional_joins entries are always \"LEFT JOIN <table> ON <cond>\"");
            from_parts.push(table_ref.to_string());
            if on_clause != "1 = 1" {
                where_conditions.push(on_clause.to_string());
            }
        }

        let from = from_parts.join(", ");
        let joins = if optional_joins.is_empty() {
            String::new()
        } else {
            format!(" {}", optional_joins.join(" "))
        };
        let select_cols = lowered
            .result_bindings
            .iter()
            .map(|(alias, var, _)| format!("{alias}.id AS {var}"))
            .collect::<Vec<_>>()
            .join(", ");
        let where_sql = if where_conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_conditions.join(" AND "))
        };
        let sql = if select_cols.is_empty() {
            format!("SELECT 1 FROM {from}{joins}{where_sql}")
        } else {
            format!("SELECT {select_cols} FROM {from}{joins}{where_sql}")
        };
        let vars = lowered
            .result_bindings
            .iter()
            .map(|(_, var, kind)| (var.clone(), *kind))
            .collect();
        log::debug!("driving SQL: {sql}");
        plan.driving_sql = Some((sql, lowered.params, vars));
    }

    for with in &query.with_clauses {
        let projection = return_lower::lower_projection(
            &with.items,
            with.distinct,
            &with.order_by,
            &with.skip,
            &with.limit,
        );

        // Only a bare-variable (optionally renamed) item carries a
        // structural node/rel binding across the WITH boundary; anything
        // else (`n.name`, `count(*)`, ...) becomes a plain scalar in the
        // projected row and has nothing for the scope to track.
        let carried: Vec<(String, String)> = with
            .items
            .iter()
            .filter_map(|item| match &item.expr {
                crate::ast::Expression::Variable(v) if scope.is_bound(v) => {
                    Some((v.clone(), item.alias.clone().unwrap_or_else(|| v.clone())))
                }
                _ => None,
            })
            .collect();
        scope = scope.rebind_through_with(&carried);

        plan.with_stages
            .push(plan::WithStage { projection, having: with.where_clause.clone() });
    }

    for updating in &query.updating_clauses {
        let steps = match updating {
            crate::ast::UpdatingClause::Create(c) => write_lower::lower_create(c),
            crate::ast::UpdatingClause::Merge(m) => vec![write_lower::lower_merge(m)],
            crate::ast::UpdatingClause::Set(s) => write_lower::lower_set(s),
            crate::ast::UpdatingClause::Remove(r) => write_lower::lower_remove(r),
            crate::ast::UpdatingClause::Delete(d) => write_lower::lower_delete(d),
        };
        plan.prologue_writes.extend(steps);
    }

    plan.unwind_clauses = query.unwind_clauses.clone();
    plan.call_clause = query.call_clause.clone();

    if let Some(ret) = &query.return_clause {
        plan.algorithm = return_lower::detect_algorithm_call(&ret.items);
        if plan.algorithm.is_none() {
            plan.projection = Some(return_lower::lower_projection(
                &ret.items,
                ret.distinct,
                &ret.order_by,
                &ret.skip,
                &ret.limit,
            ));
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::schema;

    fn conn_with_schema() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn
    }

    #[test]
    fn simple_match_return_compiles() {
        let conn = conn_with_schema();
        let query = parser::parse("MATCH (n:Person) RETURN n.name").unwrap();
        let plan = compile(&conn, &query.first).unwrap();
        assert!(plan.driving_sql.is_some());
        let (sql, _, vars) = plan.driving_sql.unwrap();
        assert!(sql.contains("nodes n0"));
        assert_eq!(vars, vec![("n".to_string(), scope::EntityKind::Node)]);
        assert_eq!(plan.projection.unwrap().columns[0].name, "n.name");
    }

    #[test]
    fn create_clause_lowers_to_write_steps() {
        let conn = conn_with_schema();
        let query = parser::parse("CREATE (n:Person {name: 'Alice'})").unwrap();
        let plan = compile(&conn, &query.first).unwrap();
        assert_eq!(plan.prologue_writes.len(), 1);
    }

    #[test]
    fn variable_length_is_recorded_as_post_process_step() {
        let conn = conn_with_schema();
        let query = parser::parse("MATCH (a)-[*1..3]->(b) RETURN a").unwrap();
        let plan = compile(&conn, &query.first).unwrap();
        assert_eq!(plan.varlen_steps.len(), 1);
        assert_eq!(plan.varlen_steps[0].min_hops, 1);
        assert_eq!(plan.varlen_steps[0].max_hops, Some(3));
    }

    #[test]
    fn algorithm_call_is_detected() {
        let conn = conn_with_schema();
        let query = parser::parse("RETURN pageRank()").unwrap();
        let plan = compile(&conn, &query.first).unwrap();
        assert!(matches!(plan.algorithm, Some(plan::AlgorithmCall::PageRank { .. })));
    }

    #[test]
    fn optional_match_lowers_to_a_left_join_not_another_inner_table() {
        let conn = conn_with_schema();
        let query = parser::parse(
            "MATCH (a:Person) OPTIONAL MATCH (a)-[r:KNOWS]->(b:Person) RETURN a, b",
        )
        .unwrap();
        let plan = compile(&conn, &query.first).unwrap();
        let (sql, _, vars) = plan.driving_sql.unwrap();
        assert!(sql.contains("FROM nodes n0"));
        assert!(sql.contains("LEFT JOIN edges"));
        assert!(sql.contains("LEFT JOIN nodes"));
        assert!(vars.contains(&("a".to_string(), scope::EntityKind::Node)));
        assert!(vars.contains(&("b".to_string(), scope::EntityKind::Node)));
    }

    #[test]
    fn with_clause_lowers_to_a_with_stage_not_a_post_filter() {
        let conn = conn_with_schema();
        let query = parser::parse("MATCH (n:Person) WITH n, n.age AS age WHERE age > 21 RETURN n").unwrap();
        let plan = compile(&conn, &query.first).unwrap();
        assert!(plan.post_filter.is_empty());
        assert_eq!(plan.with_stages.len(), 1);
        let stage = &plan.with_stages[0];
        assert_eq!(stage.projection.columns.len(), 2);
        assert_eq!(stage.projection.columns[0].name, "n");
        assert_eq!(stage.projection.columns[1].name, "age");
        assert!(stage.having.is_some());
    }
}
