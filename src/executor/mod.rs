//! Query execution (spec §4.4): ties the transform stage's [`plan::Plan`]
//! to a live connection — running prologue/per-row writes, driving the SQL
//! loop, expanding variable-length steps, evaluating post-filters and
//! projections, dispatching graph algorithms, and producing the three
//! output shapes from spec §6.
//!
//! An [`Executor`] is the per-connection state the host attaches once and
//! reuses across queries (spec §4.4: "an executor instance is created
//! lazily on first query per host connection and cached").

pub mod cache;
pub mod eval;
pub mod fetch;
pub mod varlen;

use std::collections::HashMap;

use rusqlite::Connection;

use crate::ast::{CallClause, MatchClause, PathPattern, ReadingClause, SingleQuery, UnionKind};
use crate::error::GraphQLiteError;
use crate::procedures;
use crate::schema::PropKind;
use crate::transform::{self, plan::WriteStep, scope::EntityKind};
use crate::value::AgValue;

use cache::ExecutorCache;

/// The three shapes a `cypher()` call can produce (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// RETURN-bearing or CALL/UNWIND-bearing queries: one row per entry.
    Rows(Vec<AgValue>),
    /// A write-only query with no RETURN.
    WriteSummary { nodes_created: u64, relationships_created: u64 },
    /// A graph-algorithm RETURN, unwrapped (not nested under a column name).
    AlgorithmRows(Vec<AgValue>),
}

impl QueryOutput {
    /// Render per spec §6's exact text shapes.
    pub fn to_json_string(&self) -> String {
        match self {
            QueryOutput::Rows(rows) | QueryOutput::AlgorithmRows(rows) => {
                let json = serde_json::Value::Array(rows.iter().map(AgValue::to_json).collect());
                json.to_string()
            }
            QueryOutput::WriteSummary { nodes_created, relationships_created } => format!(
                "Query executed successfully - nodes created: {nodes_created}, relationships created: {relationships_created}"
            ),
        }
    }
}

/// A pattern variable's runtime binding. Unlike the SQL-time [`EntityKind`],
/// this also carries a variable-length relationship's bound edge list
/// (Cypher binds `r` in `(a)-[r*]->(b)` to the list of traversed edges).
#[derive(Debug, Clone)]
enum Bound {
    Node(i64),
    Rel(i64),
    RelList(Vec<i64>),
    /// The optional side of an `OPTIONAL MATCH` that didn't match this row
    /// (spec §4.3.2: a `LEFT JOIN` with no match surfaces as SQL NULL).
    Null,
}

/// Structural (node/rel id) bindings plus scalar bindings introduced by
/// `UNWIND`/`WITH` aliases, merged into an [`eval::Row`] on demand.
#[derive(Debug, Clone, Default)]
struct Bindings {
    ids: HashMap<String, Bound>,
    scalars: HashMap<String, AgValue>,
}

impl Bindings {
    fn to_row(&self, conn: &Connection) -> Result<eval::Row, GraphQLiteError> {
        let mut row = eval::Row::new();
        for (name, bound) in &self.ids {
            let value = match bound {
                Bound::Node(id) => AgValue::Vertex(fetch::load_vertex(conn, *id)?),
                Bound::Rel(id) => AgValue::Edge(fetch::load_edge(conn, *id)?),
                Bound::RelList(ids) => {
                    let edges = ids
                        .iter()
                        .map(|id| fetch::load_edge(conn, *id).map(AgValue::Edge))
                        .collect::<Result<Vec<_>, _>>()?;
                    AgValue::Array(edges)
                }
                Bound::Null => AgValue::Null,
            };
            row.insert(name.clone(), value);
        }
        for (name, value) in &self.scalars {
            row.insert(name.clone(), value.clone());
        }
        Ok(row)
    }

    fn resolve_node(&self, name: &str) -> Result<i64, GraphQLiteError> {
        match self.ids.get(name) {
            Some(Bound::Node(id)) => Ok(*id),
            _ => Err(GraphQLiteError::execute(format!("{name} is not a bound node"))),
        }
    }

    fn resolve_entity(&self, name: &str) -> Result<(i64, bool), GraphQLiteError> {
        match self.ids.get(name) {
            Some(Bound::Node(id)) => Ok((*id, false)),
            Some(Bound::Rel(id)) => Ok((*id, true)),
            _ => Err(GraphQLiteError::execute(format!("{name} is not a bound node or relationship"))),
        }
    }
}

pub struct Executor {
    cache: ExecutorCache,
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Executor { cache: ExecutorCache::new() }
    }

    /// Run one `cypher()` call: parse, compile, execute, produce the output
    /// shape (spec §4.4, §6). `params` are the caller-supplied query
    /// parameters; a reference in the query to an absent parameter is a
    /// fatal error, extras are ignored (spec §4.3.3).
    pub fn run(
        &mut self,
        conn: &Connection,
        query_text: &str,
        params: &eval::Row,
    ) -> Result<QueryOutput, GraphQLiteError> {
        let query = crate::parser::parse(query_text)?;

        let mut outputs = Vec::with_capacity(1 + query.unions.len());
        outputs.push(self.run_single(conn, &query.first, params)?);
        for (_, single) in &query.unions {
            outputs.push(self.run_single(conn, single, params)?);
        }

        if outputs.len() == 1 {
            return Ok(outputs.into_iter().next().unwrap());
        }
        combine_union(outputs, &query.unions)
    }

    fn run_single(
        &mut self,
        conn: &Connection,
        single: &SingleQuery,
        params: &eval::Row,
    ) -> Result<QueryOutput, GraphQLiteError> {
        let plan = transform::compile(conn, single)?;
        crate::debug_println!("compiled plan: {plan:?}");

        if let Some(algorithm) = &plan.algorithm {
            let rows = self.run_algorithm(conn, algorithm)?;
            return Ok(QueryOutput::AlgorithmRows(rows));
        }

        let base_rows = fetch_driving_rows(conn, &plan)?;

        let mut surviving = Vec::with_capacity(base_rows.len());
        for base in base_rows {
            let mut bindings = Bindings { ids: base, scalars: HashMap::new() };

            let mut matched = true;
            for step in &plan.varlen_steps {
                if !apply_varlen_step(conn, step, &self.cache.config, &mut bindings)? {
                    matched = false;
                    break;
                }
            }
            if !matched {
                continue;
            }

            let pre_row = bindings.to_row(conn)?;
            if !passes_post_filter(&plan.post_filter, &pre_row, params)? {
                continue;
            }
            surviving.push(bindings);
        }

        // `WITH` is a whole-row-set boundary (projection, DISTINCT, ORDER
        // BY/SKIP/LIMIT, and any aggregate all need every surviving row at
        // once), so it's applied here rather than inside the per-row loop
        // below.
        for stage in &plan.with_stages {
            surviving = apply_with_stage(conn, stage, surviving, params)?;
        }

        let mut nodes_created = 0u64;
        let mut relationships_created = 0u64;
        let mut call_rows = Vec::new();
        let mut projected: Vec<(eval::Row, AgValue)> = Vec::new();
        let mut wrote_anything = !plan.prologue_writes.is_empty();

        for bindings in surviving {
            let mut fanned_out = vec![bindings];
            for unwind in &plan.unwind_clauses {
                let mut next = Vec::with_capacity(fanned_out.len());
                for b in fanned_out {
                    let row = b.to_row(conn)?;
                    let list_val = eval::eval(&unwind.expr, &row, params)?;
                    let items = match list_val {
                        AgValue::Array(items) => items,
                        AgValue::Null => Vec::new(),
                        other => vec![other],
                    };
                    for item in items {
                        let mut b2 = b.clone();
                        b2.scalars.insert(unwind.alias.clone(), item);
                        next.push(b2);
                    }
                }
                fanned_out = next;
            }

            for mut b in fanned_out {
                if let Some(call) = &plan.call_clause {
                    let rows = run_call(conn, call, &b, params)?;
                    call_rows.extend(rows);
                    continue;
                }

                let (n, r) = apply_writes(conn, &plan.prologue_writes, &mut b, params)?;
                nodes_created += n;
                relationships_created += r;
                if n > 0 || r > 0 {
                    wrote_anything = true;
                }

                if let Some(projection) = &plan.projection {
                    let post_row = b.to_row(conn)?;
                    let obj = project_row(projection, &post_row, params)?;
                    projected.push((post_row, obj));
                }
            }
        }

        if wrote_anything {
            self.cache.invalidate();
        }

        if let Some(projection) = &plan.projection {
            let rows = finalize_projection(projected, projection, params)?;
            Ok(QueryOutput::Rows(rows))
        } else if plan.call_clause.is_some() {
            Ok(QueryOutput::Rows(call_rows))
        } else {
            Ok(QueryOutput::WriteSummary { nodes_created, relationships_created })
        }
    }

    fn run_algorithm(
        &mut self,
        conn: &Connection,
        algorithm: &crate::transform::plan::AlgorithmCall,
    ) -> Result<Vec<AgValue>, GraphQLiteError> {
        use crate::transform::plan::AlgorithmCall;
        let cfg = self.cache.config;
        let graph = self.cache.csr(conn)?;
        Ok(match algorithm {
            AlgorithmCall::PageRank { damping, iterations } => crate::csr::pagerank::run(
                graph,
                damping.unwrap_or(cfg.pagerank_damping),
                iterations.unwrap_or(cfg.pagerank_iterations),
            ),
            AlgorithmCall::LabelPropagation { iterations } => {
                crate::csr::label_propagation::run(graph, iterations.unwrap_or(cfg.label_propagation_iterations))
            }
            AlgorithmCall::DegreeCentrality => crate::csr::degree::run(graph),
        })
    }
}

fn combine_union(
    outputs: Vec<QueryOutput>,
    unions: &[(UnionKind, SingleQuery)],
) -> Result<QueryOutput, GraphQLiteError> {
    let distinct = unions.iter().any(|(kind, _)| matches!(kind, UnionKind::Distinct));
    let mut rows = Vec::new();
    for output in outputs {
        match output {
            QueryOutput::Rows(r) => rows.extend(r),
            other => return Ok(other),
        }
    }
    if distinct {
        let mut deduped: Vec<AgValue> = Vec::with_capacity(rows.len());
        for row in rows {
            if !deduped.contains(&row) {
                deduped.push(row);
            }
        }
        rows = deduped;
    }
    Ok(QueryOutput::Rows(rows))
}

/// Runs the plan's driving SELECT (if any), returning one binding map per
/// row. A plan with no MATCH (e.g. a standalone `CREATE`) drives exactly
/// one empty row, so prologue writes and per-row writes share one code
/// path (spec §4.4's "prologue writes, then the driving loop" collapses
/// naturally when there is nothing to drive).
fn fetch_driving_rows(
    conn: &Connection,
    plan: &transform::plan::Plan,
) -> Result<Vec<HashMap<String, Bound>>, GraphQLiteError> {
    let Some((sql, sql_params, vars)) = &plan.driving_sql else {
        return Ok(vec![HashMap::new()]);
    };

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| GraphQLiteError::execute(format!("failed to prepare driving SQL: {e}")))?;
    let bound = sql_params
        .iter()
        .map(sql_param_to_rusqlite)
        .collect::<Vec<_>>();
    let mut rows_out = Vec::new();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(bound))
        .map_err(|e| GraphQLiteError::execute(format!("failed to run driving SQL: {e}")))?;
    while let Some(row) = rows
        .next()
        .map_err(|e| GraphQLiteError::execute(format!("failed to read driving row: {e}")))?
    {
        let mut map = HashMap::with_capacity(vars.len());
        for (i, (var, kind)) in vars.iter().enumerate() {
            // NULL here means an unmatched OPTIONAL MATCH LEFT JOIN, not a
            // read error — the variable is bound, just to nothing.
            let id: Option<i64> = row
                .get(i)
                .map_err(|e| GraphQLiteError::execute(format!("failed to read column {var}: {e}")))?;
            let bound = match (id, kind) {
                (Some(id), EntityKind::Node) => Bound::Node(id),
                (Some(id), EntityKind::Rel) => Bound::Rel(id),
                (Some(id), EntityKind::Scalar) => Bound::Node(id),
                (None, _) => Bound::Null,
            };
            map.insert(var.clone(), bound);
        }
        rows_out.push(map);
    }
    Ok(rows_out)
}

fn sql_param_to_rusqlite(p: &transform::plan::SqlParam) -> rusqlite::types::Value {
    use transform::plan::SqlParam;
    match p {
        SqlParam::Integer(i) => rusqlite::types::Value::Integer(*i),
        SqlParam::Real(f) => rusqlite::types::Value::Real(*f),
        SqlParam::Text(s) => rusqlite::types::Value::Text(s.clone()),
        SqlParam::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        SqlParam::Null => rusqlite::types::Value::Null,
    }
}

/// Expands one variable-length/`shortestPath` step against the row's
/// already-bound start (and, if given, end) node. Returns `false` when the
/// caller should drop this driving row entirely — standard "no match, zero
/// rows" semantics for a mandatory pattern — and `true` otherwise (a match
/// was bound, or the step belongs to an `OPTIONAL MATCH` and the row is kept
/// with null bindings instead of being dropped, spec §4.3.2).
fn apply_varlen_step(
    conn: &Connection,
    step: &crate::transform::plan::VarLenStep,
    cfg: &crate::config::EngineConfig,
    bindings: &mut Bindings,
) -> Result<bool, GraphQLiteError> {
    let start_id = bindings.resolve_node(&step.start_var)?;
    let target_id = step
        .end_var
        .as_ref()
        .and_then(|v| bindings.ids.get(v))
        .and_then(|b| if let Bound::Node(id) = b { Some(*id) } else { None });

    let paths = varlen::expand(conn, step, start_id, target_id, cfg)?;
    // Bind the first matching path. Enumerating every path as a distinct
    // output row (the full relational semantics of a non-deterministic
    // join) is not implemented; this engine commits to one walk per
    // variable-length pattern per driving row.
    let Some(path) = paths.into_iter().next() else {
        if step.optional {
            if let Some(end_var) = &step.end_var {
                bindings.ids.insert(end_var.clone(), Bound::Null);
            }
            if let Some(rel_var) = &step.rel_var {
                bindings.ids.insert(rel_var.clone(), Bound::Null);
            }
            return Ok(true);
        }
        return Ok(false);
    };

    if let Some(end_var) = &step.end_var {
        bindings.ids.insert(end_var.clone(), Bound::Node(*path.nodes.last().unwrap()));
    }
    if let Some(rel_var) = &step.rel_var {
        bindings.ids.insert(rel_var.clone(), Bound::RelList(path.rels));
    }
    Ok(true)
}

fn passes_post_filter(
    filters: &[crate::ast::Expression],
    row: &eval::Row,
    params: &eval::Row,
) -> Result<bool, GraphQLiteError> {
    for filter in filters {
        let value = eval::eval(filter, row, params)?;
        if !eval::truthy(&value) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn run_call(
    conn: &Connection,
    call: &CallClause,
    bindings: &Bindings,
    params: &eval::Row,
) -> Result<Vec<AgValue>, GraphQLiteError> {
    let _ = (bindings, params); // procedures here take no arguments from the row
    let _ = &call.arguments;
    procedures::call(conn, &call.procedure_name)
}

fn project_row(
    projection: &crate::transform::plan::Projection,
    row: &eval::Row,
    params: &eval::Row,
) -> Result<AgValue, GraphQLiteError> {
    let mut fields = Vec::with_capacity(projection.columns.len());
    for col in &projection.columns {
        fields.push((col.name.clone(), eval::eval(&col.expr, row, params)?));
    }
    Ok(AgValue::Object(fields))
}

/// Applies a `WITH` projection boundary to the whole surviving row set
/// (spec §4.3.1, §3.4): project, then `HAVING`-filter, then DISTINCT, then
/// ORDER BY/SKIP/LIMIT — each needs the output of the one before it, so
/// they can't be folded into the per-row loop the rest of the pipeline uses.
fn apply_with_stage(
    conn: &Connection,
    stage: &crate::transform::plan::WithStage,
    rows: Vec<Bindings>,
    params: &eval::Row,
) -> Result<Vec<Bindings>, GraphQLiteError> {
    let projection = &stage.projection;
    let has_aggregate = projection.columns.iter().any(|c| eval::is_aggregate(&c.expr));
    let all_aggregate = has_aggregate && projection.columns.iter().all(|c| eval::is_aggregate(&c.expr));
    if has_aggregate && !all_aggregate {
        return Err(GraphQLiteError::execute(
            "WITH cannot mix an aggregate column with a plain column without a grouping key, which is not supported",
        ));
    }

    let materialized = rows
        .iter()
        .map(|b| b.to_row(conn))
        .collect::<Result<Vec<_>, _>>()?;

    let mut projected: Vec<eval::Row> = if all_aggregate {
        let mut row = eval::Row::new();
        for col in &projection.columns {
            row.insert(col.name.clone(), eval::eval_aggregate(&col.expr, &materialized, params)?);
        }
        vec![row]
    } else {
        materialized
            .iter()
            .map(|row| {
                let mut out = eval::Row::new();
                for col in &projection.columns {
                    out.insert(col.name.clone(), eval::eval(&col.expr, row, params)?);
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>, GraphQLiteError>>()?
    };

    if let Some(having) = &stage.having {
        let mut kept = Vec::with_capacity(projected.len());
        for row in projected {
            if eval::truthy(&eval::eval(having, &row, params)?) {
                kept.push(row);
            }
        }
        projected = kept;
    }

    if projection.distinct {
        let mut deduped: Vec<eval::Row> = Vec::with_capacity(projected.len());
        for row in projected {
            if !deduped.contains(&row) {
                deduped.push(row);
            }
        }
        projected = deduped;
    }

    if !projection.order_by.is_empty() {
        let mut keyed = Vec::with_capacity(projected.len());
        for row in projected {
            let mut key = Vec::with_capacity(projection.order_by.len());
            for item in &projection.order_by {
                key.push(eval::eval(&item.expr, &row, params)?);
            }
            keyed.push((key, row));
        }
        keyed.sort_by(|a, b| compare_order_keys(&a.0, &b.0, &projection.order_by));
        projected = keyed.into_iter().map(|(_, row)| row).collect();
    }

    if let Some(skip_expr) = &projection.skip {
        projected = projected.into_iter().skip(eval_usize(skip_expr, params)?).collect();
    }
    if let Some(limit_expr) = &projection.limit {
        projected.truncate(eval_usize(limit_expr, params)?);
    }

    Ok(projected.into_iter().map(row_to_bindings).collect())
}

/// Splits a materialized row back into structural (`Bound::Node`/`Rel`) and
/// scalar bindings, so a variable carried through a `WITH` (e.g. `WITH n`)
/// still resolves for a later `SET`/`DELETE` the way a directly-matched
/// variable does.
fn row_to_bindings(row: eval::Row) -> Bindings {
    let mut ids = HashMap::new();
    let mut scalars = HashMap::new();
    for (name, value) in row {
        match value {
            AgValue::Vertex(v) => {
                ids.insert(name, Bound::Node(v.id));
            }
            AgValue::Edge(e) => {
                ids.insert(name, Bound::Rel(e.id));
            }
            other => {
                scalars.insert(name, other);
            }
        }
    }
    Bindings { ids, scalars }
}

/// Applies the final `RETURN`'s DISTINCT/ORDER BY/SKIP/LIMIT (spec §4.3.7)
/// to the whole result set, after every row has already been projected.
/// ORDER BY evaluates against each row's pre-projection bindings, since it
/// may reference a variable the projection didn't select.
fn finalize_projection(
    rows: Vec<(eval::Row, AgValue)>,
    projection: &crate::transform::plan::Projection,
    params: &eval::Row,
) -> Result<Vec<AgValue>, GraphQLiteError> {
    let mut rows = rows;

    if projection.distinct {
        let mut deduped: Vec<(eval::Row, AgValue)> = Vec::with_capacity(rows.len());
        for pair in rows {
            if !deduped.iter().any(|(_, obj)| obj == &pair.1) {
                deduped.push(pair);
            }
        }
        rows = deduped;
    }

    let mut objs: Vec<AgValue> = if !projection.order_by.is_empty() {
        let mut keyed = Vec::with_capacity(rows.len());
        for (raw, obj) in rows {
            let mut key = Vec::with_capacity(projection.order_by.len());
            for item in &projection.order_by {
                key.push(eval::eval(&item.expr, &raw, params)?);
            }
            keyed.push((key, obj));
        }
        keyed.sort_by(|a, b| compare_order_keys(&a.0, &b.0, &projection.order_by));
        keyed.into_iter().map(|(_, obj)| obj).collect()
    } else {
        rows.into_iter().map(|(_, obj)| obj).collect()
    };

    if let Some(skip_expr) = &projection.skip {
        objs = objs.into_iter().skip(eval_usize(skip_expr, params)?).collect();
    }
    if let Some(limit_expr) = &projection.limit {
        objs.truncate(eval_usize(limit_expr, params)?);
    }
    Ok(objs)
}

fn eval_usize(expr: &crate::ast::Expression, params: &eval::Row) -> Result<usize, GraphQLiteError> {
    let empty = eval::Row::new();
    match eval::eval(expr, &empty, params)? {
        AgValue::Integer(i) if i >= 0 => Ok(i as usize),
        other => Err(GraphQLiteError::execute(format!(
            "SKIP/LIMIT must evaluate to a non-negative integer, got {other:?}"
        ))),
    }
}

fn agvalue_cmp(a: &AgValue, b: &AgValue) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (AgValue::Null, AgValue::Null) => Ordering::Equal,
        // Cypher orders NULL after every other value regardless of
        // direction; `compare_order_keys` flips non-null comparisons for
        // DESC but leaves this ordering alone.
        (AgValue::Null, _) => Ordering::Greater,
        (_, AgValue::Null) => Ordering::Less,
        (AgValue::Integer(x), AgValue::Integer(y)) => x.cmp(y),
        (AgValue::Float(x), AgValue::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (AgValue::Integer(x), AgValue::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (AgValue::Float(x), AgValue::Integer(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (AgValue::String(x), AgValue::String(y)) => x.cmp(y),
        (AgValue::Bool(x), AgValue::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn compare_order_keys(a: &[AgValue], b: &[AgValue], order_by: &[crate::ast::OrderItem]) -> std::cmp::Ordering {
    for (i, item) in order_by.iter().enumerate() {
        let ord = agvalue_cmp(&a[i], &b[i]);
        if ord != std::cmp::Ordering::Equal {
            return if item.descending && !matches!((&a[i], &b[i]), (AgValue::Null, _) | (_, AgValue::Null)) {
                ord.reverse()
            } else {
                ord
            };
        }
    }
    std::cmp::Ordering::Equal
}

// ---------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------

fn apply_writes(
    conn: &Connection,
    writes: &[WriteStep],
    bindings: &mut Bindings,
    params: &eval::Row,
) -> Result<(u64, u64), GraphQLiteError> {
    let mut nodes_created = 0u64;
    let mut relationships_created = 0u64;

    for step in writes {
        match step {
            WriteStep::CreateNode { binds, labels, properties } => {
                let row = bindings.to_row(conn)?;
                let id = create_node(conn, labels, properties, &row, params)?;
                if let Some(name) = binds {
                    bindings.ids.insert(name.clone(), Bound::Node(id));
                }
                nodes_created += 1;
            }
            WriteStep::CreateRel { binds, rel_type, start_var, end_var, properties } => {
                let start_id = bindings.resolve_node(start_var)?;
                let end_id = bindings.resolve_node(end_var)?;
                let row = bindings.to_row(conn)?;
                let id = create_rel(conn, rel_type, start_id, end_id, properties, &row, params)?;
                if let Some(name) = binds {
                    bindings.ids.insert(name.clone(), Bound::Rel(id));
                }
                relationships_created += 1;
            }
            WriteStep::SetProperty { variable, key, value } => {
                let (id, on_edge) = bindings.resolve_entity(variable)?;
                let row = bindings.to_row(conn)?;
                let v = eval::eval(value, &row, params)?;
                set_property(conn, id, on_edge, key, &v)?;
            }
            WriteStep::SetPropertyMapMerge { variable, map } => {
                let (id, on_edge) = bindings.resolve_entity(variable)?;
                let row = bindings.to_row(conn)?;
                let v = eval::eval(map, &row, params)?;
                if let AgValue::Object(entries) = v {
                    for (k, val) in entries {
                        set_property(conn, id, on_edge, &k, &val)?;
                    }
                }
            }
            WriteStep::SetLabel { variable, label } => {
                let id = bindings.resolve_node(variable)?;
                conn.execute(
                    "INSERT OR IGNORE INTO node_labels (node_id, label) VALUES (?1, ?2)",
                    rusqlite::params![id, label],
                )
                .map_err(|e| GraphQLiteError::execute(format!("failed to set label: {e}")))?;
            }
            WriteStep::RemoveProperty { variable, key } => {
                let (id, on_edge) = bindings.resolve_entity(variable)?;
                remove_property(conn, id, on_edge, key)?;
            }
            WriteStep::RemoveLabel { variable, label } => {
                let id = bindings.resolve_node(variable)?;
                conn.execute(
                    "DELETE FROM node_labels WHERE node_id = ?1 AND label = ?2",
                    rusqlite::params![id, label],
                )
                .map_err(|e| GraphQLiteError::execute(format!("failed to remove label: {e}")))?;
            }
            WriteStep::DeleteEntity { variable, detach } => match bindings.resolve_entity(variable)? {
                (id, false) => delete_node(conn, id, *detach)?,
                (id, true) => delete_edge(conn, id)?,
            },
            WriteStep::Merge { match_patterns, on_create, on_match } => {
                let (n, r) = apply_merge(conn, match_patterns, on_create, on_match, bindings, params)?;
                nodes_created += n;
                relationships_created += r;
            }
        }
    }

    Ok((nodes_created, relationships_created))
}

fn apply_merge(
    conn: &Connection,
    match_patterns: &[PathPattern],
    on_create: &[WriteStep],
    on_match: &[WriteStep],
    bindings: &mut Bindings,
    params: &eval::Row,
) -> Result<(u64, u64), GraphQLiteError> {
    let probe = SingleQuery {
        reading_clauses: vec![ReadingClause::Match(MatchClause {
            patterns: match_patterns.to_vec(),
            where_clause: None,
            span: Default::default(),
        })],
        ..Default::default()
    };
    let probe_plan = transform::compile(conn, &probe)?;
    let mut found = fetch_driving_rows(conn, &probe_plan)?;

    if let Some(first) = found.drain(..).next() {
        for (name, bound) in first {
            bindings.ids.insert(name, bound);
        }
        apply_writes(conn, on_match, bindings, params)
    } else {
        apply_writes(conn, on_create, bindings, params)
    }
}

fn create_node(
    conn: &Connection,
    labels: &[String],
    properties: &[(String, crate::ast::Expression)],
    row: &eval::Row,
    params: &eval::Row,
) -> Result<i64, GraphQLiteError> {
    conn.execute("INSERT INTO nodes DEFAULT VALUES", [])
        .map_err(|e| GraphQLiteError::execute(format!("failed to create node: {e}")))?;
    let id = conn.last_insert_rowid();
    for label in labels {
        conn.execute(
            "INSERT INTO node_labels (node_id, label) VALUES (?1, ?2)",
            rusqlite::params![id, label],
        )
        .map_err(|e| GraphQLiteError::execute(format!("failed to set label: {e}")))?;
    }
    for (key, expr) in properties {
        let value = eval::eval(expr, row, params)?;
        set_property(conn, id, false, key, &value)?;
    }
    Ok(id)
}

fn create_rel(
    conn: &Connection,
    rel_type: &str,
    start_id: i64,
    end_id: i64,
    properties: &[(String, crate::ast::Expression)],
    row: &eval::Row,
    params: &eval::Row,
) -> Result<i64, GraphQLiteError> {
    conn.execute(
        "INSERT INTO edges (start_id, end_id, label) VALUES (?1, ?2, ?3)",
        rusqlite::params![start_id, end_id, rel_type],
    )
    .map_err(|e| GraphQLiteError::execute(format!("failed to create relationship: {e}")))?;
    let id = conn.last_insert_rowid();
    for (key, expr) in properties {
        let value = eval::eval(expr, row, params)?;
        set_property(conn, id, true, key, &value)?;
    }
    Ok(id)
}

/// Writes a property value, replacing any existing value for the same key
/// regardless of its previous type (spec §4.3.6: `SET` may change a
/// property's type). `AgValue::Null` removes the property, matching `SET
/// n.k = NULL`'s documented meaning as a delete.
fn set_property(conn: &Connection, entity_id: i64, on_edge: bool, key: &str, value: &AgValue) -> Result<(), GraphQLiteError> {
    if value.is_null() {
        return remove_property(conn, entity_id, on_edge, key);
    }
    let key_id = crate::schema::intern_property_key(conn, key)?;
    let id_col = if on_edge { "edge_id" } else { "node_id" };
    for kind in PropKind::ALL {
        let table = kind.table(on_edge);
        conn.execute(
            &format!("DELETE FROM {table} WHERE {id_col} = ?1 AND key_id = ?2"),
            rusqlite::params![entity_id, key_id],
        )
        .map_err(|e| GraphQLiteError::execute(format!("failed to clear {table}: {e}")))?;
    }

    let (kind, sql_value): (PropKind, rusqlite::types::Value) = match value {
        AgValue::Integer(i) => (PropKind::Int, rusqlite::types::Value::Integer(*i)),
        AgValue::Float(f) => (PropKind::Real, rusqlite::types::Value::Real(*f)),
        AgValue::String(s) => (PropKind::Text, rusqlite::types::Value::Text(s.clone())),
        AgValue::Bool(b) => (PropKind::Bool, rusqlite::types::Value::Integer(if *b { 1 } else { 0 })),
        other => {
            return Err(GraphQLiteError::execute(format!(
                "property values must be scalar, got {other:?}"
            )))
        }
    };
    let table = kind.table(on_edge);
    conn.execute(
        &format!("INSERT INTO {table} ({id_col}, key_id, value) VALUES (?1, ?2, ?3)"),
        rusqlite::params![entity_id, key_id, sql_value],
    )
    .map_err(|e| GraphQLiteError::execute(format!("failed to write {table}: {e}")))?;
    Ok(())
}

fn remove_property(conn: &Connection, entity_id: i64, on_edge: bool, key: &str) -> Result<(), GraphQLiteError> {
    let Some(key_id) = crate::schema::lookup_property_key(conn, key)? else {
        return Ok(());
    };
    let id_col = if on_edge { "edge_id" } else { "node_id" };
    for kind in PropKind::ALL {
        let table = kind.table(on_edge);
        conn.execute(
            &format!("DELETE FROM {table} WHERE {id_col} = ?1 AND key_id = ?2"),
            rusqlite::params![entity_id, key_id],
        )
        .map_err(|e| GraphQLiteError::execute(format!("failed to clear {table}: {e}")))?;
    }
    Ok(())
}

fn delete_node(conn: &Connection, id: i64, detach: bool) -> Result<(), GraphQLiteError> {
    let incident_count: i64 = conn
        .query_row(
            "SELECT count(*) FROM edges WHERE start_id = ?1 OR end_id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .map_err(|e| GraphQLiteError::execute(format!("failed to check relationships on node {id}: {e}")))?;

    if incident_count > 0 {
        if !detach {
            return Err(GraphQLiteError::execute(
                "cannot delete a node with relationships still attached; use DETACH DELETE",
            ));
        }
        let rel_ids: Vec<i64> = {
            let mut stmt = conn
                .prepare("SELECT id FROM edges WHERE start_id = ?1 OR end_id = ?1")
                .map_err(|e| GraphQLiteError::execute(format!("failed to list incident relationships: {e}")))?;
            let rows = stmt
                .query_map(rusqlite::params![id], |row| row.get::<_, i64>(0))
                .map_err(|e| GraphQLiteError::execute(format!("failed to list incident relationships: {e}")))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| GraphQLiteError::execute(format!("failed to read relationship id: {e}")))?
        };
        for rel_id in rel_ids {
            delete_edge(conn, rel_id)?;
        }
    }

    for kind in PropKind::ALL {
        let table = kind.table(false);
        conn.execute(&format!("DELETE FROM {table} WHERE node_id = ?1"), rusqlite::params![id])
            .map_err(|e| GraphQLiteError::execute(format!("failed to clear {table}: {e}")))?;
    }
    conn.execute("DELETE FROM node_labels WHERE node_id = ?1", rusqlite::params![id])
        .map_err(|e| GraphQLiteError::execute(format!("failed to clear labels: {e}")))?;
    conn.execute("DELETE FROM nodes WHERE id = ?1", rusqlite::params![id])
        .map_err(|e| GraphQLiteError::execute(format!("failed to delete node {id}: {e}")))?;
    Ok(())
}

fn delete_edge(conn: &Connection, id: i64) -> Result<(), GraphQLiteError> {
    for kind in PropKind::ALL {
        let table = kind.table(true);
        conn.execute(&format!("DELETE FROM {table} WHERE edge_id = ?1"), rusqlite::params![id])
            .map_err(|e| GraphQLiteError::execute(format!("failed to clear {table}: {e}")))?;
    }
    conn.execute("DELETE FROM edges WHERE id = ?1", rusqlite::params![id])
        .map_err(|e| GraphQLiteError::execute(format!("failed to delete relationship {id}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn conn_with_schema() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn
    }

    #[test]
    fn create_then_match_round_trips_a_node() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();

        let out = exec
            .run(&conn, "CREATE (n:Person {name: 'Alice', age: 30})", &params)
            .unwrap();
        assert_eq!(
            out,
            QueryOutput::WriteSummary { nodes_created: 1, relationships_created: 0 }
        );

        let out = exec.run(&conn, "MATCH (n:Person) RETURN n.name", &params).unwrap();
        match out {
            QueryOutput::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(
                    rows[0],
                    AgValue::Object(vec![("n.name".to_string(), AgValue::String("Alice".to_string()))])
                );
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn set_then_return_reflects_the_write() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (n:Counter {value: 1})", &params).unwrap();
        exec.run(&conn, "MATCH (n:Counter) SET n.value = 2", &params).unwrap();
        let out = exec.run(&conn, "MATCH (n:Counter) RETURN n.value", &params).unwrap();
        match out {
            QueryOutput::Rows(rows) => {
                assert_eq!(
                    rows[0],
                    AgValue::Object(vec![("n.value".to_string(), AgValue::Integer(2))])
                );
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn detach_delete_removes_node_and_relationships() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (a:Person)-[:KNOWS]->(b:Person)", &params).unwrap();
        let out = exec.run(&conn, "MATCH (n:Person) DETACH DELETE n", &params).unwrap();
        assert_eq!(
            out,
            QueryOutput::WriteSummary { nodes_created: 0, relationships_created: 0 }
        );
        let remaining: i64 = conn.query_row("SELECT count(*) FROM nodes", [], |r| r.get(0)).unwrap();
        assert_eq!(remaining, 0);
        let remaining_edges: i64 = conn.query_row("SELECT count(*) FROM edges", [], |r| r.get(0)).unwrap();
        assert_eq!(remaining_edges, 0);
    }

    #[test]
    fn delete_without_detach_on_connected_node_is_an_error() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (a:Person)-[:KNOWS]->(b:Person)", &params).unwrap();
        let err = exec.run(&conn, "MATCH (n:Person) DELETE n", &params);
        assert!(err.is_err());
    }

    #[test]
    fn merge_creates_once_and_matches_thereafter() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "MERGE (n:Tag {name: 'rust'})", &params).unwrap();
        exec.run(&conn, "MERGE (n:Tag {name: 'rust'})", &params).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM node_labels WHERE label = 'Tag'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn pagerank_call_returns_unwrapped_rows() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (a:Person)-[:KNOWS]->(b:Person)", &params).unwrap();
        let out = exec.run(&conn, "RETURN pageRank()", &params).unwrap();
        match out {
            QueryOutput::AlgorithmRows(rows) => assert_eq!(rows.len(), 2),
            other => panic!("expected algorithm rows, got {other:?}"),
        }
    }

    #[test]
    fn db_labels_call_clause_dispatches_to_procedures() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (n:Person)", &params).unwrap();
        let out = exec.run(&conn, "CALL db.labels()", &params).unwrap();
        match out {
            QueryOutput::Rows(rows) => {
                assert_eq!(
                    rows,
                    vec![AgValue::Object(vec![("label".to_string(), AgValue::String("Person".to_string()))])]
                );
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn unreachable_varlen_target_yields_zero_rows_not_an_error() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (a:Person {name: 'A'})-[:KNOWS]->(b:Person {name: 'B'})", &params)
            .unwrap();
        exec.run(&conn, "CREATE (c:Person {name: 'C'})", &params).unwrap();

        let out = exec
            .run(
                &conn,
                "MATCH (a:Person {name: 'A'}), (c:Person {name: 'C'}) \
                 MATCH (a)-[*1..3]->(c) RETURN a",
                &params,
            )
            .unwrap();
        match out {
            QueryOutput::Rows(rows) => assert!(rows.is_empty()),
            other => panic!("expected zero rows, got {other:?}"),
        }
    }

    #[test]
    fn optional_match_keeps_the_row_with_null_bindings_when_nothing_matches() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (a:Person {name: 'Solo'})", &params).unwrap();

        let out = exec
            .run(
                &conn,
                "MATCH (a:Person) OPTIONAL MATCH (a)-[:KNOWS]->(b:Person) RETURN a.name, b",
                &params,
            )
            .unwrap();
        match out {
            QueryOutput::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(
                    rows[0],
                    AgValue::Object(vec![
                        ("a.name".to_string(), AgValue::String("Solo".to_string())),
                        ("b".to_string(), AgValue::Null),
                    ])
                );
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn with_clause_projects_and_applies_order_by_limit() {
        let conn = conn_with_schema();
        let mut exec = Executor::new();
        let params = eval::Row::new();
        exec.run(&conn, "CREATE (n:Person {name: 'Alice', age: 30})", &params).unwrap();
        exec.run(&conn, "CREATE (n:Person {name: 'Bob', age: 25})", &params).unwrap();

        let out = exec
            .run(
                &conn,
                "MATCH (n:Person) WITH n.name AS name, n.age AS age ORDER BY age LIMIT 1 RETURN name",
                &params,
            )
            .unwrap();
        match out {
            QueryOutput::Rows(rows) => {
                assert_eq!(rows, vec![AgValue::Object(vec![("name".to_string(), AgValue::String("Bob".to_string()))])]);
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }
}
