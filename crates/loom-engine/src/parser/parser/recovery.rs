//! Error recovery strategies for the parser.
//!
//! After an error the parser skips tokens until it reaches a point where
//! parsing can resume, so one pass reports as many errors as possible.
//! Every strategy consumes at least one token or stops at a boundary the
//! caller handles, so recovery always terminates.

use super::Parser;
use crate::parser::token::Token;

/// Skip to the next top-level declaration (`class`, visibility keyword, `import`).
pub fn sync_to_declaration(parser: &mut Parser) {
    if !parser.at_eof() {
        parser.advance();
    }
    while !parser.at_eof() {
        match parser.current() {
            Token::Class | Token::Public | Token::Private | Token::Protected | Token::Import => return,
            _ => {
                parser.advance();
            }
        }
    }
}

/// Skip to the next class member.
///
/// Stops before a visibility keyword or the closing brace of the class, or
/// after a `;` / balanced `{ ... }` that ends the broken member.
pub fn sync_to_member(parser: &mut Parser) {
    let mut depth = 0usize;
    while !parser.at_eof() {
        match parser.current() {
            Token::LeftBrace => {
                depth += 1;
                parser.advance();
            }
            Token::RightBrace => {
                if depth == 0 {
                    return;
                }
                depth -= 1;
                parser.advance();
                if depth == 0 {
                    return;
                }
            }
            Token::Semicolon if depth == 0 => {
                parser.advance();
                return;
            }
            Token::Public | Token::Private | Token::Protected if depth == 0 => return,
            _ => {
                parser.advance();
            }
        }
    }
}

/// Skip to the end of the current statement.
///
/// Consumes through the next `;` at the current nesting level, or stops
/// before the `}` closing the enclosing block.
pub fn sync_to_statement(parser: &mut Parser) {
    let mut depth = 0usize;
    while !parser.at_eof() {
        match parser.current() {
            Token::LeftBrace => {
                depth += 1;
                parser.advance();
            }
            Token::RightBrace => {
                if depth == 0 {
                    return;
                }
                depth -= 1;
                parser.advance();
            }
            Token::Semicolon if depth == 0 => {
                parser.advance();
                return;
            }
            _ => {
                parser.advance();
            }
        }
    }
}
