//! Statement parsing

use super::{recovery, ParseError, Parser};
use crate::parser::ast::*;
use crate::parser::token::Token;

/// Parse `{ statements }`.
///
/// Statement-level errors are recorded and skipped so the rest of the
/// block is still checked.
pub fn parse_block(parser: &mut Parser) -> Result<Block, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::LeftBrace)?;
    let mut statements = Vec::new();

    while !parser.check(&Token::RightBrace) && !parser.at_eof() {
        match parse_statement(parser) {
            Ok(stmt) => statements.push(stmt),
            Err(err) => {
                parser.record(err);
                recovery::sync_to_statement(parser);
            }
        }
    }
    parser.expect(Token::RightBrace)?;

    Ok(Block {
        statements,
        span: parser.combine_spans(&start, &parser.previous_span()),
    })
}

/// Parse a statement.
pub fn parse_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    parser.enter()?;
    let result = parse_statement_inner(parser);
    parser.leave();
    result
}

fn parse_statement_inner(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start = parser.current_span();
    match parser.current() {
        Token::Var => {
            parser.advance();
            let name = parser.expect_identifier()?;
            parser.expect(Token::Equal)?;
            let initializer = super::expr::parse_expression(parser)?;
            parser.expect(Token::Semicolon)?;
            Ok(Statement::Var {
                name,
                initializer,
                span: parser.combine_spans(&start, &parser.previous_span()),
            })
        }
        Token::Return => {
            parser.advance();
            let value = if parser.check(&Token::Semicolon) {
                None
            } else {
                Some(super::expr::parse_expression(parser)?)
            };
            parser.expect(Token::Semicolon)?;
            Ok(Statement::Return {
                value,
                span: parser.combine_spans(&start, &parser.previous_span()),
            })
        }
        Token::If => parse_if(parser),
        Token::LeftBrace => Ok(Statement::Block(parse_block(parser)?)),
        Token::Semicolon => {
            parser.advance();
            Ok(Statement::Block(Block {
                statements: Vec::new(),
                span: start,
            }))
        }
        _ => {
            let expression = super::expr::parse_expression(parser)?;
            if !matches!(
                expression.kind,
                ExprKind::Call { .. } | ExprKind::Assign { .. } | ExprKind::New { .. }
            ) {
                return Err(ParseError::invalid_syntax(
                    "Only assignment, call and new expressions can be used as a statement",
                    expression.span,
                ));
            }
            parser.expect(Token::Semicolon)?;
            Ok(Statement::Expression(expression))
        }
    }
}

fn parse_if(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::If)?;
    parser.expect(Token::LeftParen)?;
    let condition = super::expr::parse_expression(parser)?;
    parser.expect(Token::RightParen)?;
    let then_branch = parse_branch(parser)?;

    let else_branch = if parser.eat(&Token::Else) {
        Some(parse_branch(parser)?)
    } else {
        None
    };

    Ok(Statement::If {
        condition,
        then_branch,
        else_branch,
        span: parser.combine_spans(&start, &parser.previous_span()),
    })
}

/// A branch is a block or a single statement wrapped into one.
fn parse_branch(parser: &mut Parser) -> Result<Block, ParseError> {
    if parser.check(&Token::LeftBrace) {
        return parse_block(parser);
    }
    let stmt = parse_statement(parser)?;
    let span = stmt.span();
    Ok(Block {
        statements: vec![stmt],
        span,
    })
}
