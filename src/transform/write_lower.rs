//! Write-clause lowering (spec §4.3.6): CREATE/SET/REMOVE/DELETE/MERGE to
//! [`WriteStep`]s the executor runs in clause order before the driving read.

use super::plan::WriteStep;
use crate::ast::{
    CreateClause, DeleteClause, Expression, MergeClause, NodePattern, PathPattern, RelPattern,
    RemoveClause, RemoveItem, SetClause, SetItem,
};

pub fn lower_create(clause: &CreateClause) -> Vec<WriteStep> {
    let mut steps = Vec::new();
    for pattern in &clause.patterns {
        lower_create_pattern(pattern, &mut steps);
    }
    steps
}

fn lower_create_pattern(pattern: &PathPattern, steps: &mut Vec<WriteStep>) {
    for node in &pattern.nodes {
        steps.push(create_node_step(node));
    }
    for (i, rel) in pattern.rels.iter().enumerate() {
        let start_var = pattern.nodes[i]
            .variable
            .clone()
            .unwrap_or_else(|| format!("__anon_node_{i}"));
        let end_var = pattern.nodes[i + 1]
            .variable
            .clone()
            .unwrap_or_else(|| format!("__anon_node_{}", i + 1));
        steps.push(create_rel_step(rel, start_var, end_var));
    }
}

fn create_node_step(node: &NodePattern) -> WriteStep {
    WriteStep::CreateNode {
        binds: node.variable.clone(),
        labels: node.labels.clone(),
        properties: map_entries(&node.properties),
    }
}

fn create_rel_step(rel: &RelPattern, start_var: String, end_var: String) -> WriteStep {
    WriteStep::CreateRel {
        binds: rel.variable.clone(),
        rel_type: rel.types.first().cloned().unwrap_or_default(),
        start_var,
        end_var,
        properties: map_entries(&rel.properties),
    }
}

fn map_entries(expr: &Option<Expression>) -> Vec<(String, Expression)> {
    match expr {
        Some(Expression::Map(entries)) => entries.clone(),
        _ => Vec::new(),
    }
}

pub fn lower_set(clause: &SetClause) -> Vec<WriteStep> {
    clause.items.iter().map(lower_set_item).collect()
}

fn lower_set_item(item: &SetItem) -> WriteStep {
    match item {
        SetItem::Property { variable, key, value } => WriteStep::SetProperty {
            variable: variable.clone(),
            key: key.clone(),
            value: value.clone(),
        },
        SetItem::PropertyMapMerge { variable, map } => WriteStep::SetPropertyMapMerge {
            variable: variable.clone(),
            map: map.clone(),
        },
        SetItem::Label { variable, label } => WriteStep::SetLabel {
            variable: variable.clone(),
            label: label.clone(),
        },
    }
}

pub fn lower_remove(clause: &RemoveClause) -> Vec<WriteStep> {
    clause
        .items
        .iter()
        .map(|item| match item {
            RemoveItem::Property { variable, key } => WriteStep::RemoveProperty {
                variable: variable.clone(),
                key: key.clone(),
            },
            RemoveItem::Label { variable, label } => WriteStep::RemoveLabel {
                variable: variable.clone(),
                label: label.clone(),
            },
        })
        .collect()
}

pub fn lower_delete(clause: &DeleteClause) -> Vec<WriteStep> {
    clause
        .variables
        .iter()
        .filter_map(|expr| match expr {
            Expression::Variable(name) => Some(WriteStep::DeleteEntity {
                variable: name.clone(),
                detach: clause.detach,
            }),
            _ => None,
        })
        .collect()
}

/// MERGE is resolved per spec §9 as match-whole-or-create-whole: no
/// partial-pattern merge.
pub fn lower_merge(clause: &MergeClause) -> WriteStep {
    let mut on_create = Vec::new();
    lower_create_pattern(&clause.pattern, &mut on_create);
    on_create.extend(clause.on_create.iter().map(lower_set_item));

    let on_match = clause.on_match.iter().map(lower_set_item).collect();

    WriteStep::Merge {
        match_patterns: vec![clause.pattern.clone()],
        on_create,
        on_match,
    }
}
