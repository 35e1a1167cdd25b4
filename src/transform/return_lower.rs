//! RETURN/WITH projection lowering (spec §4.3.7): column naming follows,
//! in order, (a) explicit `AS alias`, (b) `n.k` renders as `n.k`, (c) a
//! bare variable renders as the variable name.

use super::plan::{AlgorithmCall, Projection, ProjectionColumn};
use crate::ast::{Expression, OrderItem, ProjectionItem};

pub fn lower_projection(
    items: &[ProjectionItem],
    distinct: bool,
    order_by: &[OrderItem],
    skip: &Option<Expression>,
    limit: &Option<Expression>,
) -> Projection {
    let columns = items
        .iter()
        .map(|item| ProjectionColumn {
            name: column_name(item),
            expr: item.expr.clone(),
        })
        .collect();

    Projection {
        columns,
        distinct,
        order_by: order_by.to_vec(),
        skip: skip.clone(),
        limit: limit.clone(),
    }
}

fn column_name(item: &ProjectionItem) -> String {
    if let Some(alias) = &item.alias {
        return alias.clone();
    }
    match &item.expr {
        Expression::Property { base, key } => {
            if let Expression::Variable(v) = base.as_ref() {
                format!("{v}.{key}")
            } else {
                key.clone()
            }
        }
        Expression::Variable(v) => v.clone(),
        _ => expr_fallback_name(&item.expr),
    }
}

fn expr_fallback_name(expr: &Expression) -> String {
    match expr {
        Expression::FunctionCall { name, .. } => name.clone(),
        Expression::Literal(_) => "literal".to_string(),
        _ => "expr".to_string(),
    }
}

/// Detects a RETURN clause whose single item is a call to one of the
/// pseudo-function graph algorithms (spec §4.4's "Degree/algorithms").
pub fn detect_algorithm_call(items: &[ProjectionItem]) -> Option<AlgorithmCall> {
    let [item] = items else { return None };
    let Expression::FunctionCall { name, args, .. } = &item.expr else {
        return None;
    };
    match name.to_ascii_lowercase().as_str() {
        "pagerank" => Some(AlgorithmCall::PageRank {
            damping: args.first().and_then(literal_f64),
            iterations: args.get(1).and_then(literal_u32),
        }),
        "labelpropagation" => Some(AlgorithmCall::LabelPropagation {
            iterations: args.first().and_then(literal_u32),
        }),
        "degreecentrality" => Some(AlgorithmCall::DegreeCentrality),
        _ => None,
    }
}

fn literal_f64(expr: &Expression) -> Option<f64> {
    match expr {
        Expression::Literal(crate::ast::Literal::Float(f)) => Some(*f),
        Expression::Literal(crate::ast::Literal::Integer(i)) => Some(*i as f64),
        _ => None,
    }
}

fn literal_u32(expr: &Expression) -> Option<u32> {
    match expr {
        Expression::Literal(crate::ast::Literal::Integer(i)) => Some(*i as u32),
        _ => None,
    }
}
