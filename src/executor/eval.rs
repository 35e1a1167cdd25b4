//! Expression evaluator: runs over fully materialized rows (variable name
//! → [`AgValue`]) once the driving SQL and any variable-length expansion
//! have bound every pattern variable. This is where WHERE predicates that
//! weren't pushed into SQL (spec §4.3.4) and RETURN projections (§4.3.7)
//! are actually computed.

use std::collections::HashMap;

use regex::Regex;

use crate::ast::{BinaryOp, Expression, Literal, UnaryOp};
use crate::error::GraphQLiteError;
use crate::value::AgValue;

pub type Row = HashMap<String, AgValue>;

pub fn eval(expr: &Expression, row: &Row, params: &Row) -> Result<AgValue, GraphQLiteError> {
    match expr {
        Expression::Literal(lit) => Ok(literal_value(lit)),
        Expression::Parameter(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| GraphQLiteError::transform(format!("missing parameter ${name}"))),
        Expression::Variable(name) => row
            .get(name)
            .cloned()
            .ok_or_else(|| GraphQLiteError::transform(format!("unbound variable {name}"))),
        Expression::Property { base, key } => {
            let base_val = eval(base, row, params)?;
            property_of(&base_val, key)
        }
        Expression::Index { base, index } => {
            let base_val = eval(base, row, params)?;
            let idx_val = eval(index, row, params)?;
            index_into(&base_val, &idx_val)
        }
        Expression::Unary { op, operand } => eval_unary(*op, operand, row, params),
        Expression::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, row, params),
        Expression::FunctionCall { name, args, .. } => eval_function(name, args, row, params),
        Expression::List(items) => {
            let values = items
                .iter()
                .map(|e| eval(e, row, params))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AgValue::Array(values))
        }
        Expression::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((k.clone(), eval(v, row, params)?));
            }
            Ok(AgValue::Object(out))
        }
        Expression::Case { operand, when_then, else_ } => {
            eval_case(operand.as_deref(), when_then, else_.as_deref(), row, params)
        }
        Expression::Coalesce(args) => {
            for arg in args {
                let v = eval(arg, row, params)?;
                if !v.is_null() {
                    return Ok(v);
                }
            }
            Ok(AgValue::Null)
        }
        Expression::ListComprehension {
            variable,
            list,
            predicate,
            projection,
        } => eval_list_comprehension(variable, list, predicate.as_deref(), projection.as_deref(), row, params),
        Expression::Reduce {
            accumulator,
            initial,
            variable,
            list,
            expr,
        } => eval_reduce(accumulator, initial, variable, list, expr, row, params),
        Expression::PatternPredicate(_) => Err(GraphQLiteError::transform(
            "pattern predicates are only supported inside MATCH/OPTIONAL MATCH, not as a standalone expression",
        )),
    }
}

fn literal_value(lit: &Literal) -> AgValue {
    match lit {
        Literal::Null => AgValue::Null,
        Literal::Bool(b) => AgValue::Bool(*b),
        Literal::Integer(i) => AgValue::Integer(*i),
        Literal::Float(f) => AgValue::Float(*f),
        Literal::String(s) => AgValue::String(s.clone()),
    }
}

fn property_of(base: &AgValue, key: &str) -> Result<AgValue, GraphQLiteError> {
    let props = match base {
        AgValue::Vertex(v) => &v.properties,
        AgValue::Edge(e) => &e.properties,
        AgValue::Null => return Ok(AgValue::Null),
        _ => return Err(GraphQLiteError::transform(format!("{key} accessed on a non-entity value"))),
    };
    Ok(props
        .iter()
        .find(|p| p.key == key)
        .map(|p| p.value.clone())
        .unwrap_or(AgValue::Null))
}

fn index_into(base: &AgValue, index: &AgValue) -> Result<AgValue, GraphQLiteError> {
    match (base, index) {
        (AgValue::Array(items), AgValue::Integer(i)) => {
            let idx = if *i < 0 { items.len() as i64 + i } else { *i };
            Ok(usize::try_from(idx)
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned()
                .unwrap_or(AgValue::Null))
        }
        (AgValue::Null, _) => Ok(AgValue::Null),
        _ => Err(GraphQLiteError::transform("index access requires a list and an integer")),
    }
}

fn eval_unary(
    op: UnaryOp,
    operand: &Expression,
    row: &Row,
    params: &Row,
) -> Result<AgValue, GraphQLiteError> {
    let v = eval(operand, row, params)?;
    Ok(match op {
        UnaryOp::IsNull => AgValue::Bool(v.is_null()),
        UnaryOp::IsNotNull => AgValue::Bool(!v.is_null()),
        UnaryOp::Not => match v {
            AgValue::Bool(b) => AgValue::Bool(!b),
            AgValue::Null => AgValue::Null,
            _ => return Err(GraphQLiteError::transform("NOT requires a boolean operand")),
        },
        UnaryOp::Neg => match v {
            AgValue::Integer(i) => AgValue::Integer(-i),
            AgValue::Float(f) => AgValue::Float(-f),
            AgValue::Null => AgValue::Null,
            _ => return Err(GraphQLiteError::transform("unary - requires a numeric operand")),
        },
    })
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expression,
    rhs: &Expression,
    row: &Row,
    params: &Row,
) -> Result<AgValue, GraphQLiteError> {
    // Short-circuit boolean connectives over three-valued logic.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let l = eval(lhs, row, params)?;
        return eval_short_circuit(op, l, rhs, row, params);
    }

    let l = eval(lhs, row, params)?;
    let r = eval(rhs, row, params)?;

    if matches!(op, BinaryOp::Xor) {
        return match (as_bool(&l), as_bool(&r)) {
            (Some(a), Some(b)) => Ok(AgValue::Bool(a ^ b)),
            _ => Ok(AgValue::Null),
        };
    }

    if l.is_null() || r.is_null() {
        return Ok(AgValue::Null);
    }

    match op {
        BinaryOp::Eq => Ok(AgValue::Bool(l == r)),
        BinaryOp::Neq => Ok(AgValue::Bool(l != r)),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => compare(op, &l, &r),
        BinaryOp::Add => arith(op, &l, &r),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => arith(op, &l, &r),
        BinaryOp::StartsWith => string_pred(op, &l, &r),
        BinaryOp::EndsWith => string_pred(op, &l, &r),
        BinaryOp::Contains => string_pred(op, &l, &r),
        BinaryOp::In => in_list(&l, &r),
        BinaryOp::RegexMatch => regex_match(&l, &r),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => unreachable!("handled above"),
    }
}

fn eval_short_circuit(
    op: BinaryOp,
    lhs_value: AgValue,
    rhs_expr: &Expression,
    row: &Row,
    params: &Row,
) -> Result<AgValue, GraphQLiteError> {
    let l = as_bool(&lhs_value);
    match (op, l) {
        (BinaryOp::And, Some(false)) => return Ok(AgValue::Bool(false)),
        (BinaryOp::Or, Some(true)) => return Ok(AgValue::Bool(true)),
        _ => {}
    }
    let r = as_bool(&eval(rhs_expr, row, params)?);
    Ok(match op {
        BinaryOp::And => match (l, r) {
            (Some(a), Some(b)) => AgValue::Bool(a && b),
            (Some(false), None) | (None, Some(false)) => AgValue::Bool(false),
            _ => AgValue::Null,
        },
        BinaryOp::Or => match (l, r) {
            (Some(a), Some(b)) => AgValue::Bool(a || b),
            (Some(true), None) | (None, Some(true)) => AgValue::Bool(true),
            _ => AgValue::Null,
        },
        _ => unreachable!(),
    })
}

fn as_bool(v: &AgValue) -> Option<bool> {
    match v {
        AgValue::Bool(b) => Some(*b),
        _ => None,
    }
}

fn compare(op: BinaryOp, l: &AgValue, r: &AgValue) -> Result<AgValue, GraphQLiteError> {
    let ordering = match (l, r) {
        (AgValue::Integer(a), AgValue::Integer(b)) => a.partial_cmp(b),
        (AgValue::Float(a), AgValue::Float(b)) => a.partial_cmp(b),
        (AgValue::Integer(a), AgValue::Float(b)) => (*a as f64).partial_cmp(b),
        (AgValue::Float(a), AgValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (AgValue::String(a), AgValue::String(b)) => a.partial_cmp(b),
        _ => return Err(GraphQLiteError::transform("comparison requires comparable operand types")),
    };
    let Some(ordering) = ordering else {
        return Ok(AgValue::Null);
    };
    Ok(AgValue::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Lte => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Gte => ordering.is_ge(),
        _ => unreachable!(),
    }))
}

fn arith(op: BinaryOp, l: &AgValue, r: &AgValue) -> Result<AgValue, GraphQLiteError> {
    if op == BinaryOp::Add {
        if let (AgValue::String(a), AgValue::String(b)) = (l, r) {
            return Ok(AgValue::String(format!("{a}{b}")));
        }
    }
    let (a, b) = match (l, r) {
        (AgValue::Integer(a), AgValue::Integer(b)) => {
            return Ok(int_arith(op, *a, *b));
        }
        (AgValue::Integer(a), AgValue::Float(b)) => (*a as f64, *b),
        (AgValue::Float(a), AgValue::Integer(b)) => (*a, *b as f64),
        (AgValue::Float(a), AgValue::Float(b)) => (*a, *b),
        _ => return Err(GraphQLiteError::transform("arithmetic requires numeric operands")),
    };
    Ok(AgValue::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => unreachable!(),
    }))
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> AgValue {
    match op {
        BinaryOp::Add => AgValue::Integer(a + b),
        BinaryOp::Sub => AgValue::Integer(a - b),
        BinaryOp::Mul => AgValue::Integer(a * b),
        BinaryOp::Div => AgValue::Float(a as f64 / b as f64),
        BinaryOp::Mod => AgValue::Integer(a % b),
        _ => unreachable!(),
    }
}

fn string_pred(op: BinaryOp, l: &AgValue, r: &AgValue) -> Result<AgValue, GraphQLiteError> {
    let (AgValue::String(a), AgValue::String(b)) = (l, r) else {
        return Err(GraphQLiteError::transform("string predicate requires string operands"));
    };
    Ok(AgValue::Bool(match op {
        BinaryOp::StartsWith => a.starts_with(b.as_str()),
        BinaryOp::EndsWith => a.ends_with(b.as_str()),
        BinaryOp::Contains => a.contains(b.as_str()),
        _ => unreachable!(),
    }))
}

fn in_list(needle: &AgValue, haystack: &AgValue) -> Result<AgValue, GraphQLiteError> {
    match haystack {
        AgValue::Array(items) => Ok(AgValue::Bool(items.contains(needle))),
        _ => Err(GraphQLiteError::transform("IN requires a list on the right-hand side")),
    }
}

fn regex_match(l: &AgValue, r: &AgValue) -> Result<AgValue, GraphQLiteError> {
    let (AgValue::String(text), AgValue::String(pattern)) = (l, r) else {
        return Err(GraphQLiteError::transform("=~ requires string operands"));
    };
    let re = Regex::new(pattern)
        .map_err(|e| GraphQLiteError::transform(format!("invalid regex {pattern}: {e}")))?;
    Ok(AgValue::Bool(re.is_match(text)))
}

fn eval_function(
    name: &str,
    args: &[Expression],
    row: &Row,
    params: &Row,
) -> Result<AgValue, GraphQLiteError> {
    match name.to_ascii_lowercase().as_str() {
        "count" => Err(GraphQLiteError::transform(
            "count() is only supported as a WITH/RETURN aggregate over the matched rows, not as a per-row expression",
        )),
        "tostring" => {
            let v = eval(&args[0], row, params)?;
            Ok(AgValue::String(to_display_string(&v)))
        }
        "toupper" => as_string_fn(args, row, params, |s| s.to_uppercase()),
        "tolower" => as_string_fn(args, row, params, |s| s.to_lowercase()),
        "size" => {
            let v = eval(&args[0], row, params)?;
            Ok(match v {
                AgValue::Array(items) => AgValue::Integer(items.len() as i64),
                AgValue::String(s) => AgValue::Integer(s.chars().count() as i64),
                AgValue::Null => AgValue::Null,
                _ => return Err(GraphQLiteError::transform("size() requires a list or string")),
            })
        }
        "id" => {
            let v = eval(&args[0], row, params)?;
            Ok(match v {
                AgValue::Vertex(v) => AgValue::Integer(v.id),
                AgValue::Edge(e) => AgValue::Integer(e.id),
                _ => return Err(GraphQLiteError::transform("id() requires a node or relationship")),
            })
        }
        "labels" => {
            let v = eval(&args[0], row, params)?;
            match v {
                AgValue::Vertex(v) => Ok(AgValue::Array(v.labels.into_iter().map(AgValue::String).collect())),
                _ => Err(GraphQLiteError::transform("labels() requires a node")),
            }
        }
        "type" => {
            let v = eval(&args[0], row, params)?;
            match v {
                AgValue::Edge(e) => Ok(AgValue::String(e.label)),
                _ => Err(GraphQLiteError::transform("type() requires a relationship")),
            }
        }
        other => Err(GraphQLiteError::transform(format!("unknown function {other}"))),
    }
}

fn as_string_fn(
    args: &[Expression],
    row: &Row,
    params: &Row,
    f: impl Fn(&str) -> String,
) -> Result<AgValue, GraphQLiteError> {
    match eval(&args[0], row, params)? {
        AgValue::String(s) => Ok(AgValue::String(f(&s))),
        AgValue::Null => Ok(AgValue::Null),
        _ => Err(GraphQLiteError::transform("expected a string argument")),
    }
}

fn to_display_string(v: &AgValue) -> String {
    match v {
        AgValue::Null => "null".to_string(),
        AgValue::Bool(b) => b.to_string(),
        AgValue::Integer(i) => i.to_string(),
        AgValue::Float(f) => f.to_string(),
        AgValue::String(s) => s.clone(),
        other => other.to_json_string(),
    }
}

fn eval_case(
    operand: Option<&Expression>,
    when_then: &[(Expression, Expression)],
    else_: Option<&Expression>,
    row: &Row,
    params: &Row,
) -> Result<AgValue, GraphQLiteError> {
    let subject = operand.map(|o| eval(o, row, params)).transpose()?;
    for (when, then) in when_then {
        let matched = match &subject {
            Some(s) => *s == eval(when, row, params)?,
            None => as_bool(&eval(when, row, params)?).unwrap_or(false),
        };
        if matched {
            return eval(then, row, params);
        }
    }
    match else_ {
        Some(e) => eval(e, row, params),
        None => Ok(AgValue::Null),
    }
}

fn eval_list_comprehension(
    variable: &str,
    list: &Expression,
    predicate: Option<&Expression>,
    projection: Option<&Expression>,
    row: &Row,
    params: &Row,
) -> Result<AgValue, GraphQLiteError> {
    let AgValue::Array(items) = eval(list, row, params)? else {
        return Err(GraphQLiteError::transform("list comprehension requires a list"));
    };
    let mut out = Vec::new();
    for item in items {
        let mut scoped = row.clone();
        scoped.insert(variable.to_string(), item.clone());
        if let Some(pred) = predicate {
            if !as_bool(&eval(pred, &scoped, params)?).unwrap_or(false) {
                continue;
            }
        }
        match projection {
            Some(proj) => out.push(eval(proj, &scoped, params)?),
            None => out.push(item),
        }
    }
    Ok(AgValue::Array(out))
}

fn eval_reduce(
    accumulator: &str,
    initial: &Expression,
    variable: &str,
    list: &Expression,
    expr: &Expression,
    row: &Row,
    params: &Row,
) -> Result<AgValue, GraphQLiteError> {
    let mut acc = eval(initial, row, params)?;
    let AgValue::Array(items) = eval(list, row, params)? else {
        return Err(GraphQLiteError::transform("REDUCE requires a list"));
    };
    for item in items {
        let mut scoped = row.clone();
        scoped.insert(accumulator.to_string(), acc);
        scoped.insert(variable.to_string(), item);
        acc = eval(expr, &scoped, params)?;
    }
    Ok(acc)
}

pub fn truthy(value: &AgValue) -> bool {
    matches!(value, AgValue::Bool(true))
}

/// Whether `expr` needs the whole row set rather than one row at a time.
/// Only `count` is implemented; any other aggregate-shaped call is caught
/// by `eval_function`'s rejection once it's actually evaluated.
pub fn is_aggregate(expr: &Expression) -> bool {
    matches!(expr, Expression::FunctionCall { name, .. } if name.eq_ignore_ascii_case("count"))
}

/// Evaluate an aggregate function over every row in `rows` at once (spec
/// §3.4's WITH/RETURN aggregation). There is no `GROUP BY` support: the
/// whole row set is always one group, so a projection mixing an aggregate
/// column with a non-aggregate one has no well-defined per-row value and
/// isn't something callers should build (see `with_stage`'s all-or-nothing
/// check).
pub fn eval_aggregate(expr: &Expression, rows: &[Row], params: &Row) -> Result<AgValue, GraphQLiteError> {
    let Expression::FunctionCall { name, args, .. } = expr else {
        return Err(GraphQLiteError::transform("expected an aggregate function call"));
    };
    match name.to_ascii_lowercase().as_str() {
        "count" => {
            let count = match args.first() {
                None => rows.len(),
                Some(Expression::Variable(v)) if v == "*" => rows.len(),
                Some(arg) => {
                    let mut n = 0usize;
                    for row in rows {
                        if !eval(arg, row, params)?.is_null() {
                            n += 1;
                        }
                    }
                    n
                }
            };
            Ok(AgValue::Integer(count as i64))
        }
        other => Err(GraphQLiteError::transform(format!("{other}() is not a supported aggregate"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression as E;

    #[test]
    fn arithmetic_and_comparison() {
        let row = Row::new();
        let params = Row::new();
        let expr = E::bin(BinaryOp::Add, E::Literal(Literal::Integer(2)), E::Literal(Literal::Integer(3)));
        assert_eq!(eval(&expr, &row, &params).unwrap(), AgValue::Integer(5));

        let cmp = E::bin(BinaryOp::Gt, E::Literal(Literal::Integer(5)), E::Literal(Literal::Integer(3)));
        assert_eq!(eval(&cmp, &row, &params).unwrap(), AgValue::Bool(true));
    }

    #[test]
    fn three_valued_and() {
        let row = Row::new();
        let params = Row::new();
        let expr = E::bin(BinaryOp::And, E::Literal(Literal::Bool(false)), E::Literal(Literal::Null));
        assert_eq!(eval(&expr, &row, &params).unwrap(), AgValue::Bool(false));
    }

    #[test]
    fn coalesce_picks_first_non_null() {
        let row = Row::new();
        let params = Row::new();
        let expr = E::Coalesce(vec![E::Literal(Literal::Null), E::Literal(Literal::Integer(7))]);
        assert_eq!(eval(&expr, &row, &params).unwrap(), AgValue::Integer(7));
    }
}
