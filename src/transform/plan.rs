//! The output of the transform stage (spec §4.3): SQL text, parameters, and
//! a post-process plan the executor drives (spec §4.4).

use crate::ast::{Expression, OrderItem};
use crate::transform::scope::EntityKind;

/// A bound SQL parameter. Always passed positionally to `rusqlite` —
/// literals and Cypher `$param` references alike are substituted this way,
/// never string-interpolated (spec §4.3.3).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Null,
}

/// One write side effect, executed in clause order before the driving
/// SELECT (spec §4.3.6, §5's "prologue writes complete before the driving
/// SELECT is issued").
#[derive(Debug, Clone)]
pub enum WriteStep {
    CreateNode {
        /// Binds this pattern variable to the new node's id for later steps
        /// in the same clause (e.g. `CREATE (a)-[:T]->(b)` creating both).
        binds: Option<String>,
        labels: Vec<String>,
        properties: Vec<(String, Expression)>,
    },
    CreateRel {
        binds: Option<String>,
        rel_type: String,
        start_var: String,
        end_var: String,
        properties: Vec<(String, Expression)>,
    },
    SetProperty {
        variable: String,
        key: String,
        value: Expression,
    },
    SetPropertyMapMerge {
        variable: String,
        map: Expression,
    },
    SetLabel {
        variable: String,
        label: String,
    },
    RemoveProperty {
        variable: String,
        key: String,
    },
    RemoveLabel {
        variable: String,
        label: String,
    },
    /// `DELETE n` or `DELETE r` — which table to delete from is decided at
    /// execution time from the bound variable's entity kind (spec §4.3.6
    /// treats both uniformly as "delete the row").
    DeleteEntity {
        variable: String,
        detach: bool,
    },
    /// MERGE: run `match_patterns` first; if it yields zero rows, run
    /// `on_create` (a nested CREATE-style write list); if it yields rows,
    /// run `on_match` against the bound variables (spec §9's resolved
    /// match-whole-or-create-whole semantics).
    Merge {
        match_patterns: Vec<crate::ast::PathPattern>,
        on_create: Vec<WriteStep>,
        on_match: Vec<WriteStep>,
    },
}

/// A bounded or unbounded hop expansion the executor must drive with BFS/DFS
/// rather than a single SQL join (spec §4.3.5, §4.4).
#[derive(Debug, Clone)]
pub struct VarLenStep {
    pub start_var: String,
    pub end_var: Option<String>,
    pub rel_var: Option<String>,
    pub rel_types: Vec<String>,
    pub direction: crate::ast::Direction,
    pub min_hops: u32,
    pub max_hops: Option<u32>,
    pub shortest_only: bool,
    /// From an `OPTIONAL MATCH`: a driving row with no matching path keeps
    /// its other bindings with `end_var`/`rel_var` left null, rather than
    /// being dropped from the result set (spec §4.3.2).
    pub optional: bool,
}

/// Which graph algorithm (if any) a RETURN clause dispatches to, and with
/// which arguments (spec §4.4's "Degree/algorithms").
#[derive(Debug, Clone)]
pub enum AlgorithmCall {
    PageRank { damping: Option<f64>, iterations: Option<u32> },
    LabelPropagation { iterations: Option<u32> },
    DegreeCentrality,
}

#[derive(Debug, Clone)]
pub struct ProjectionColumn {
    pub name: String,
    pub expr: Expression,
}

#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub columns: Vec<ProjectionColumn>,
    pub distinct: bool,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<Expression>,
    pub limit: Option<Expression>,
}

/// A `WITH` projection boundary (spec §4.3.1, §3.4): re-projects the row set
/// through `projection` (same shape as a `RETURN`'s), then `having` — WITH's
/// own `WHERE`, evaluated against the *projected* row rather than the raw
/// match bindings, since it may filter on a column the projection just
/// introduced (e.g. `WITH count(*) AS c WHERE c > 1`).
#[derive(Debug, Clone)]
pub struct WithStage {
    pub projection: Projection,
    pub having: Option<Expression>,
}

/// The full compiled plan for one `SingleQuery`.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Writes to run before the driving read, in clause order.
    pub prologue_writes: Vec<WriteStep>,
    /// SQL producing the driving rows: `(sql, params, column -> (variable, kind))`.
    pub driving_sql: Option<(String, Vec<SqlParam>, Vec<(String, EntityKind)>)>,
    pub varlen_steps: Vec<VarLenStep>,
    pub algorithm: Option<AlgorithmCall>,
    pub projection: Option<Projection>,
    /// WHERE/inline-property predicates not pushed into `driving_sql`,
    /// evaluated in Rust once a row's variables are fully materialized.
    pub post_filter: Vec<Expression>,
    pub unwind_clauses: Vec<crate::ast::UnwindClause>,
    pub call_clause: Option<crate::ast::CallClause>,
    /// `WITH` projection boundaries, applied in clause order over the whole
    /// matched row set before any subsequent write or the final `RETURN`.
    pub with_stages: Vec<WithStage>,
}
