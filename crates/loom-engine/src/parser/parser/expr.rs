//! Expression parsing (precedence climbing)

use super::{ParseError, Parser};
use crate::parser::ast::*;
use crate::parser::precedence::{binary_op, get_precedence, is_right_associative, Precedence};
use crate::parser::token::Token;

/// Parse an expression.
pub fn parse_expression(parser: &mut Parser) -> Result<Expression, ParseError> {
    parse_precedence(parser, Precedence::Assignment)
}

fn parse_precedence(parser: &mut Parser, min: Precedence) -> Result<Expression, ParseError> {
    parser.enter()?;
    let result = parse_precedence_inner(parser, min);
    parser.leave();
    result
}

fn parse_precedence_inner(parser: &mut Parser, min: Precedence) -> Result<Expression, ParseError> {
    let mut left = parse_unary(parser)?;

    loop {
        let token = parser.current().clone();
        let prec = get_precedence(&token);
        if prec == Precedence::None || prec < min {
            break;
        }

        left = match token {
            Token::Dot => {
                parser.advance();
                let name = parser.expect_identifier()?;
                let span = left.span.merge(&name.span);
                Expression::new(
                    ExprKind::Member {
                        object: Box::new(left),
                        name,
                    },
                    span,
                )
            }
            Token::LeftParen => {
                let args = parse_arguments(parser)?;
                let span = left.span.merge(&parser.previous_span());
                Expression::new(
                    ExprKind::Call {
                        callee: Box::new(left),
                        args,
                    },
                    span,
                )
            }
            Token::As => {
                parser.advance();
                let ty = parser.parse_type()?;
                let span = left.span.merge(&ty.span);
                Expression::new(
                    ExprKind::As {
                        expr: Box::new(left),
                        ty,
                    },
                    span,
                )
            }
            Token::Equal => {
                if !matches!(left.kind, ExprKind::Name(_) | ExprKind::Member { .. }) {
                    return Err(ParseError::invalid_syntax(
                        "The left-hand side of an assignment must be a variable, field or property",
                        left.span,
                    ));
                }
                parser.advance();
                let next = if is_right_associative(&token) { prec } else { prec.next() };
                let value = parse_precedence(parser, next)?;
                let span = left.span.merge(&value.span);
                Expression::new(
                    ExprKind::Assign {
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                    span,
                )
            }
            other => {
                let Some(op) = binary_op(&other) else {
                    break;
                };
                parser.advance();
                let right = parse_precedence(parser, prec.next())?;
                let span = left.span.merge(&right.span);
                Expression::new(
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                )
            }
        };
    }

    Ok(left)
}

fn parse_unary(parser: &mut Parser) -> Result<Expression, ParseError> {
    let start = parser.current_span();
    let op = match parser.current() {
        Token::Bang => UnaryOp::Not,
        Token::Minus => UnaryOp::Negate,
        _ => return parse_primary(parser),
    };
    parser.advance();
    // Operand binds member access and calls but nothing looser
    let operand = parse_precedence(parser, Precedence::Unary)?;
    let span = start.merge(&operand.span);
    Ok(Expression::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        span,
    ))
}

/// Parse a primary expression (literal, name, `this`, `new`, parenthesized).
pub fn parse_primary(parser: &mut Parser) -> Result<Expression, ParseError> {
    let span = parser.current_span();
    let kind = match parser.current().clone() {
        Token::IntLiteral(n) => {
            parser.advance();
            ExprKind::Int(n)
        }
        Token::FloatLiteral(n) => {
            parser.advance();
            ExprKind::Float(n)
        }
        Token::StringLiteral(s) => {
            parser.advance();
            ExprKind::Str(s)
        }
        Token::True => {
            parser.advance();
            ExprKind::Bool(true)
        }
        Token::False => {
            parser.advance();
            ExprKind::Bool(false)
        }
        Token::Null => {
            parser.advance();
            ExprKind::Null
        }
        Token::This => {
            parser.advance();
            ExprKind::This
        }
        Token::Identifier(name) => {
            parser.advance();
            ExprKind::Name(name)
        }
        Token::LeftParen => {
            parser.advance();
            let inner = parse_expression(parser)?;
            parser.expect(Token::RightParen)?;
            return Ok(Expression::new(inner.kind, span.merge(&parser.previous_span())));
        }
        Token::New => {
            parser.advance();
            let ty = parser.parse_type()?;
            let args = parse_arguments(parser)?;
            ExprKind::New { ty, args }
        }
        _ => {
            return Err(parser.unexpected_token(&[]));
        }
    };
    Ok(Expression::new(kind, span.merge(&parser.previous_span())))
}

fn parse_arguments(parser: &mut Parser) -> Result<Vec<Expression>, ParseError> {
    parser.expect(Token::LeftParen)?;
    let mut args = Vec::new();
    if !parser.check(&Token::RightParen) {
        loop {
            args.push(parse_expression(parser)?);
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }
    parser.expect(Token::RightParen)?;
    Ok(args)
}
