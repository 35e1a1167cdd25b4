//! Expression grammar, precedence-climbing style (spec §4.2's expression
//! ladder). Lowest precedence first: `OR` < `XOR` < `AND` < `NOT` <
//! comparison < string/list predicates < additive < multiplicative < unary
//! < postfix < atom — mirrors the teacher's `expression.rs` precedence
//! chain, just as a plain recursive descent instead of nested `nom::alt`.

use super::pattern::parse_path_pattern;
use super::Parser;
use crate::ast::{BinaryOp, Expression, Literal, UnaryOp};
use crate::error::GraphQLiteError;
use crate::scanner::token::{Keyword, Operator, TokenKind};

pub(super) fn parse_expression(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    parse_or(p)
}

fn parse_or(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut lhs = parse_xor(p)?;
    while p.eat_keyword(Keyword::Or) {
        let rhs = parse_xor(p)?;
        lhs = Expression::bin(BinaryOp::Or, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_xor(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut lhs = parse_and(p)?;
    while p.eat_keyword(Keyword::Xor) {
        let rhs = parse_and(p)?;
        lhs = Expression::bin(BinaryOp::Xor, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_and(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut lhs = parse_not(p)?;
    while p.eat_keyword(Keyword::And) {
        let rhs = parse_not(p)?;
        lhs = Expression::bin(BinaryOp::And, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_not(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    if p.eat_keyword(Keyword::Not) {
        let operand = parse_not(p)?;
        return Ok(Expression::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        });
    }
    parse_comparison(p)
}

fn parse_comparison(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut lhs = parse_string_predicate(p)?;
    loop {
        let op = if p.at_char('=') {
            Some(BinaryOp::Eq)
        } else if p.at_operator(Operator::NotEq) {
            Some(BinaryOp::Neq)
        } else if p.at_operator(Operator::LtEq) {
            Some(BinaryOp::Lte)
        } else if p.at_operator(Operator::GtEq) {
            Some(BinaryOp::Gte)
        } else if p.at_char('<') {
            Some(BinaryOp::Lt)
        } else if p.at_char('>') {
            Some(BinaryOp::Gt)
        } else {
            None
        };
        let Some(op) = op else { break };
        p.advance();
        let rhs = parse_string_predicate(p)?;
        lhs = Expression::bin(op, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_string_predicate(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut lhs = parse_additive(p)?;
    loop {
        if p.eat_keyword(Keyword::In) {
            let rhs = parse_additive(p)?;
            lhs = Expression::bin(BinaryOp::In, lhs, rhs);
        } else if p.at_keyword(Keyword::Starts) {
            p.advance();
            p.expect_keyword(Keyword::With)?;
            let rhs = parse_additive(p)?;
            lhs = Expression::bin(BinaryOp::StartsWith, lhs, rhs);
        } else if p.at_keyword(Keyword::Ends) {
            p.advance();
            p.expect_keyword(Keyword::With)?;
            let rhs = parse_additive(p)?;
            lhs = Expression::bin(BinaryOp::EndsWith, lhs, rhs);
        } else if p.eat_keyword(Keyword::Contains) {
            let rhs = parse_additive(p)?;
            lhs = Expression::bin(BinaryOp::Contains, lhs, rhs);
        } else if p.at_operator(Operator::RegexEq) {
            p.advance();
            let rhs = parse_additive(p)?;
            lhs = Expression::bin(BinaryOp::RegexMatch, lhs, rhs);
        } else if p.at_keyword(Keyword::Is) {
            p.advance();
            let negate = p.eat_keyword(Keyword::Not);
            p.expect_keyword(Keyword::Null)?;
            lhs = Expression::Unary {
                op: if negate { UnaryOp::IsNotNull } else { UnaryOp::IsNull },
                operand: Box::new(lhs),
            };
        } else {
            break;
        }
    }
    Ok(lhs)
}

fn parse_additive(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut lhs = parse_multiplicative(p)?;
    loop {
        if p.at_char('+') {
            p.advance();
            let rhs = parse_multiplicative(p)?;
            lhs = Expression::bin(BinaryOp::Add, lhs, rhs);
        } else if p.at_char('-') {
            p.advance();
            let rhs = parse_multiplicative(p)?;
            lhs = Expression::bin(BinaryOp::Sub, lhs, rhs);
        } else {
            break;
        }
    }
    Ok(lhs)
}

fn parse_multiplicative(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut lhs = parse_unary(p)?;
    loop {
        if p.at_char('*') {
            p.advance();
            let rhs = parse_unary(p)?;
            lhs = Expression::bin(BinaryOp::Mul, lhs, rhs);
        } else if p.at_char('/') {
            p.advance();
            let rhs = parse_unary(p)?;
            lhs = Expression::bin(BinaryOp::Div, lhs, rhs);
        } else if p.at_char('%') {
            p.advance();
            let rhs = parse_unary(p)?;
            lhs = Expression::bin(BinaryOp::Mod, lhs, rhs);
        } else {
            break;
        }
    }
    Ok(lhs)
}

fn parse_unary(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    if p.eat_char('-') {
        let operand = parse_unary(p)?;
        return Ok(Expression::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        });
    }
    parse_postfix(p)
}

fn parse_postfix(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let mut base = parse_atom(p)?;
    loop {
        if p.eat_char('.') {
            let key = p.expect_name()?;
            base = Expression::Property {
                base: Box::new(base),
                key,
            };
        } else if p.eat_char('[') {
            let index = parse_expression(p)?;
            p.expect_char(']')?;
            base = Expression::Index {
                base: Box::new(base),
                index: Box::new(index),
            };
        } else {
            break;
        }
    }
    Ok(base)
}

fn parse_atom(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    match p.peek().kind.clone() {
        TokenKind::Integer(i) => {
            p.advance();
            Ok(Expression::Literal(Literal::Integer(i)))
        }
        TokenKind::Decimal(f) => {
            p.advance();
            Ok(Expression::Literal(Literal::Float(f)))
        }
        TokenKind::String(s) => {
            p.advance();
            Ok(Expression::Literal(Literal::String(s)))
        }
        TokenKind::Parameter(name) => {
            p.advance();
            Ok(Expression::Parameter(name))
        }
        TokenKind::Keyword(Keyword::True) => {
            p.advance();
            Ok(Expression::Literal(Literal::Bool(true)))
        }
        TokenKind::Keyword(Keyword::False) => {
            p.advance();
            Ok(Expression::Literal(Literal::Bool(false)))
        }
        TokenKind::Keyword(Keyword::Null) => {
            p.advance();
            Ok(Expression::Literal(Literal::Null))
        }
        TokenKind::Keyword(Keyword::Case) => parse_case(p),
        TokenKind::Keyword(Keyword::Coalesce) => parse_coalesce(p),
        TokenKind::Keyword(Keyword::Reduce) => parse_reduce(p),
        TokenKind::Keyword(Keyword::Exists) => parse_exists(p),
        TokenKind::Char('(') => {
            p.advance();
            let expr = parse_expression(p)?;
            p.expect_char(')')?;
            Ok(expr)
        }
        TokenKind::Char('[') => parse_list_or_comprehension(p),
        TokenKind::Char('{') => parse_map(p),
        TokenKind::Identifier(_) | TokenKind::BackquotedIdent(_) => parse_variable_or_call(p),
        TokenKind::Keyword(Keyword::Count) => parse_variable_or_call(p),
        _ => Err(p.err_unexpected()),
    }
}

fn parse_variable_or_call(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    let name = p.expect_name()?;
    if p.eat_char('(') {
        let distinct = p.eat_keyword(Keyword::Distinct);
        let mut args = Vec::new();
        if !p.at_char(')') {
            loop {
                if p.at_char('*') {
                    // count(*)
                    p.advance();
                    args.push(Expression::Variable("*".to_string()));
                } else {
                    args.push(parse_expression(p)?);
                }
                if !p.eat_char(',') {
                    break;
                }
            }
        }
        p.expect_char(')')?;
        Ok(Expression::FunctionCall { name, args, distinct })
    } else {
        Ok(Expression::Variable(name))
    }
}

fn parse_list_or_comprehension(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    p.expect_char('[')?;

    // `[x IN list WHERE pred | projection]`
    if let TokenKind::Identifier(_) = p.peek().kind.clone() {
        if matches!(&p.peek_at(1).kind, TokenKind::Keyword(Keyword::In)) {
            let variable = p.expect_name()?;
            p.expect_keyword(Keyword::In)?;
            let list = parse_expression(p)?;
            let predicate = if p.eat_keyword(Keyword::Where) {
                Some(Box::new(parse_expression(p)?))
            } else {
                None
            };
            let projection = if p.eat_char('|') {
                Some(Box::new(parse_expression(p)?))
            } else {
                None
            };
            p.expect_char(']')?;
            return Ok(Expression::ListComprehension {
                variable,
                list: Box::new(list),
                predicate,
                projection,
            });
        }
    }

    let mut items = Vec::new();
    if !p.at_char(']') {
        loop {
            items.push(parse_expression(p)?);
            if !p.eat_char(',') {
                break;
            }
        }
    }
    p.expect_char(']')?;
    Ok(Expression::List(items))
}

fn parse_map(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    p.expect_char('{')?;
    let mut items = Vec::new();
    if !p.at_char('}') {
        loop {
            let key = p.expect_name()?;
            p.expect_char(':')?;
            let value = parse_expression(p)?;
            items.push((key, value));
            if !p.eat_char(',') {
                break;
            }
        }
    }
    p.expect_char('}')?;
    Ok(Expression::Map(items))
}

fn parse_case(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    p.expect_keyword(Keyword::Case)?;
    let operand = if p.at_keyword(Keyword::When) {
        None
    } else {
        Some(Box::new(parse_expression(p)?))
    };
    let mut when_then = Vec::new();
    while p.eat_keyword(Keyword::When) {
        let when = parse_expression(p)?;
        p.expect_keyword(Keyword::Then)?;
        let then = parse_expression(p)?;
        when_then.push((when, then));
    }
    let else_ = if p.eat_keyword(Keyword::Else) {
        Some(Box::new(parse_expression(p)?))
    } else {
        None
    };
    p.expect_keyword(Keyword::End)?;
    Ok(Expression::Case {
        operand,
        when_then,
        else_,
    })
}

fn parse_coalesce(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    p.expect_keyword(Keyword::Coalesce)?;
    p.expect_char('(')?;
    let mut args = Vec::new();
    if !p.at_char(')') {
        loop {
            args.push(parse_expression(p)?);
            if !p.eat_char(',') {
                break;
            }
        }
    }
    p.expect_char(')')?;
    Ok(Expression::Coalesce(args))
}

fn parse_reduce(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    p.expect_keyword(Keyword::Reduce)?;
    p.expect_char('(')?;
    let accumulator = p.expect_name()?;
    p.expect_char('=')?;
    let initial = parse_expression(p)?;
    p.expect_char(',')?;
    let variable = p.expect_name()?;
    p.expect_keyword(Keyword::In)?;
    let list = parse_expression(p)?;
    p.expect_char('|')?;
    let expr = parse_expression(p)?;
    p.expect_char(')')?;
    Ok(Expression::Reduce {
        accumulator,
        initial: Box::new(initial),
        variable,
        list: Box::new(list),
        expr: Box::new(expr),
    })
}

fn parse_exists(p: &mut Parser) -> Result<Expression, GraphQLiteError> {
    p.expect_keyword(Keyword::Exists)?;
    p.expect_char('(')?;
    let pattern = parse_path_pattern(p)?;
    p.expect_char(')')?;
    Ok(Expression::PatternPredicate(Box::new(pattern)))
}
