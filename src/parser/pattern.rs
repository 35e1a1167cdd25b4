//! Graph pattern grammar: nodes, relationships, variable-length ranges
//! (spec §4.2's `Pattern` / `Rel_pattern` productions).

use super::expr::parse_expression;
use super::Parser;
use crate::ast::{Direction, NodePattern, PathPattern, RelPattern, Span, VarLenRange};
use crate::error::GraphQLiteError;
use crate::scanner::token::Keyword;

pub(super) fn parse_path_pattern(p: &mut Parser) -> Result<PathPattern, GraphQLiteError> {
    let start_loc = p.loc();

    let (variable, is_shortest_path) = if p.at_keyword(Keyword::ShortestPath) {
        p.advance();
        p.expect_char('(')?;
        let pattern = parse_path_pattern_inner(p, start_loc, None, true)?;
        p.expect_char(')')?;
        return Ok(pattern);
    } else if let crate::scanner::token::TokenKind::Identifier(_) = p.peek().kind.clone() {
        if p.at_char_at(1, '=') {
            let name = p.expect_name()?;
            p.advance(); // '='
            (Some(name), false)
        } else {
            (None, false)
        }
    } else {
        (None, false)
    };

    parse_path_pattern_inner(p, start_loc, variable, is_shortest_path)
}

fn parse_path_pattern_inner(
    p: &mut Parser,
    start_loc: crate::error::Location,
    variable: Option<String>,
    is_shortest_path: bool,
) -> Result<PathPattern, GraphQLiteError> {
    let mut nodes = Vec::new();
    let mut rels = Vec::new();

    nodes.push(parse_node_pattern(p)?);
    loop {
        if p.at_char('-') || p.at_char('<') {
            rels.push(parse_rel_pattern(p)?);
            nodes.push(parse_node_pattern(p)?);
        } else {
            break;
        }
    }

    Ok(PathPattern {
        variable,
        is_shortest_path,
        nodes,
        rels,
        span: Span::new(start_loc.line, start_loc.column, 0),
    })
}

fn parse_node_pattern(p: &mut Parser) -> Result<NodePattern, GraphQLiteError> {
    p.expect_char('(')?;
    let mut node = NodePattern::default();

    if let crate::scanner::token::TokenKind::Identifier(_) = p.peek().kind.clone() {
        node.variable = Some(p.expect_name()?);
    }

    while p.eat_char(':') {
        node.labels.push(p.expect_name()?);
    }

    if p.at_char('{') {
        node.properties = Some(parse_map_literal(p)?);
    }

    p.expect_char(')')?;
    Ok(node)
}

fn parse_rel_pattern(p: &mut Parser) -> Result<RelPattern, GraphQLiteError> {
    let left_arrow = p.eat_char('<');
    p.expect_char('-')?;

    let mut rel = RelPattern {
        variable: None,
        types: Vec::new(),
        direction: Direction::Both,
        range: None,
        properties: None,
    };

    if p.eat_char('[') {
        if let crate::scanner::token::TokenKind::Identifier(_) = p.peek().kind.clone() {
            rel.variable = Some(p.expect_name()?);
        }
        while p.eat_char(':') {
            rel.types.push(p.expect_name()?);
            while p.eat_char('|') {
                rel.types.push(p.expect_name()?);
            }
        }
        if p.eat_char('*') {
            rel.range = Some(parse_varlen_range(p)?);
        }
        if p.at_char('{') {
            rel.properties = Some(parse_map_literal(p)?);
        }
        p.expect_char(']')?;
    }

    p.expect_char('-')?;
    let right_arrow = p.eat_char('>');

    rel.direction = match (left_arrow, right_arrow) {
        (true, false) => Direction::Left,
        (false, true) => Direction::Right,
        _ => Direction::Both,
    };

    Ok(rel)
}

fn parse_varlen_range(p: &mut Parser) -> Result<VarLenRange, GraphQLiteError> {
    // `*`, `*n`, `*n..`, `*n..m`, `*..m`
    let min = if let crate::scanner::token::TokenKind::Integer(i) = p.peek().kind.clone() {
        p.advance();
        i as u32
    } else {
        1
    };

    if p.at_operator(crate::scanner::token::Operator::DotDot) {
        p.advance();
        let max = if let crate::scanner::token::TokenKind::Integer(i) = p.peek().kind.clone() {
            p.advance();
            Some(i as u32)
        } else {
            None
        };
        Ok(VarLenRange { min, max })
    } else {
        Ok(VarLenRange {
            min,
            max: Some(min),
        })
    }
}

fn parse_map_literal(p: &mut Parser) -> Result<crate::ast::Expression, GraphQLiteError> {
    parse_expression(p)
}
