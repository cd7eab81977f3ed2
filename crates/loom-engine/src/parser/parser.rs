//! Recursive descent parser for Loom source.
//!
//! Transforms the lexer's token stream into a [`CompilationUnit`]. The
//! grammar is small: imports, an optional file-scoped namespace, and class
//! declarations whose members are fields, constructors, properties and
//! methods.

pub mod decl;
pub mod expr;
pub mod recovery;
pub mod stmt;

use super::ast::*;
use super::lexer::{LexError, Lexer};
use super::token::{Span, Token};

pub use super::error::{ParseError, ParseErrorKind};

/// Maximum nesting depth of statements and expressions.
pub const MAX_PARSE_DEPTH: usize = 64;

/// Parser state.
pub struct Parser {
    /// Pre-tokenized input
    tokens: Vec<(Token, Span)>,

    /// Current position in token stream
    pos: usize,

    /// Accumulated parse errors (allows continuing after errors)
    errors: Vec<ParseError>,

    /// Current nesting depth
    pub(crate) depth: usize,
}

impl Parser {
    /// Create a new parser from source code.
    pub fn new(source: &str) -> Result<Self, Vec<LexError>> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            depth: 0,
        })
    }

    /// Parse the entire source into a compilation unit.
    ///
    /// Returns all accumulated errors on failure.
    pub fn parse(mut self) -> Result<CompilationUnit, Vec<ParseError>> {
        let start_span = self.current_span();
        let mut imports = Vec::new();
        let mut namespace = None;
        let mut classes = Vec::new();

        while self.check(&Token::Import) {
            match decl::parse_import(&mut self) {
                Ok(import) => imports.push(import),
                Err(err) => {
                    self.errors.push(err);
                    recovery::sync_to_declaration(&mut self);
                }
            }
        }

        if self.check(&Token::Namespace) {
            match decl::parse_namespace(&mut self) {
                Ok(ns) => namespace = Some(ns),
                Err(err) => {
                    self.errors.push(err);
                    recovery::sync_to_declaration(&mut self);
                }
            }
        }

        while !self.at_eof() {
            if self.check(&Token::Import) {
                let err = ParseError::invalid_syntax(
                    "Import directives must precede the namespace and all declarations",
                    self.current_span(),
                );
                self.errors.push(err);
                recovery::sync_to_declaration(&mut self);
                continue;
            }

            match decl::parse_class(&mut self) {
                Ok(class) => classes.push(class),
                Err(err) => {
                    self.errors.push(err);
                    recovery::sync_to_declaration(&mut self);
                }
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let span = self.combine_spans(&start_span, &self.current_span());
        Ok(CompilationUnit {
            imports,
            namespace,
            classes,
            span,
        })
    }

    // ========================================================================
    // Token Management
    // ========================================================================

    /// Get the current token.
    #[inline]
    pub fn current(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    /// Get the current token's span.
    #[inline]
    pub fn current_span(&self) -> Span {
        self.tokens[self.pos].1
    }

    /// Peek at the next token (lookahead).
    #[inline]
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(tok, _)| tok)
    }

    /// Span of the most recently consumed token.
    pub fn previous_span(&self) -> Span {
        if self.pos == 0 {
            self.current_span()
        } else {
            self.tokens[self.pos - 1].1
        }
    }

    /// Advance to the next token, returning the previous current token.
    pub fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    /// Check if the current token matches the given kind.
    #[inline]
    pub fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(expected)
    }

    /// Check if the current token is the identifier `word`.
    pub fn check_word(&self, word: &str) -> bool {
        self.current().identifier() == Some(word)
    }

    /// Check if we've reached EOF.
    #[inline]
    pub fn at_eof(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    /// Consume the current token if it matches the expected kind.
    pub fn expect(&mut self, expected: Token) -> Result<Token, ParseError> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected_token(&[expected]))
        }
    }

    /// Consume an identifier.
    pub fn expect_identifier(&mut self) -> Result<Identifier, ParseError> {
        let span = self.current_span();
        match self.current() {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(Identifier { name, span })
            }
            _ => Err(self.unexpected_token(&[Token::Identifier(String::new())])),
        }
    }

    /// Consume the current token if it matches; report whether it did.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Error Handling
    // ========================================================================

    /// Create an "unexpected token" error at the current position.
    pub fn unexpected_token(&self, expected: &[Token]) -> ParseError {
        let span = self.current_span();
        if self.at_eof() {
            ParseError::unexpected_eof(expected.to_vec(), span)
        } else {
            ParseError::unexpected_token(expected.to_vec(), self.current().clone(), span)
        }
    }

    /// Record an error and keep going.
    pub(crate) fn record(&mut self, err: ParseError) {
        self.errors.push(err);
    }

    /// Enter a nested construct, failing past [`MAX_PARSE_DEPTH`].
    pub(crate) fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            self.depth -= 1;
            return Err(ParseError::parser_limit_exceeded(
                format!("Maximum nesting depth ({}) exceeded", MAX_PARSE_DEPTH),
                self.current_span(),
            ));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Combine two spans into one.
    pub fn combine_spans(&self, start: &Span, end: &Span) -> Span {
        start.merge(end)
    }

    // ========================================================================
    // Shared grammar pieces
    // ========================================================================

    /// Parse a dotted name: `a.b.c`
    pub fn parse_qualified_name(&mut self) -> Result<QualifiedName, ParseError> {
        let first = self.expect_identifier()?;
        let start = first.span;
        let mut parts = vec![first.name];
        while self.check(&Token::Dot) {
            self.advance();
            parts.push(self.expect_identifier()?.name);
        }
        Ok(QualifiedName {
            parts,
            span: self.combine_spans(&start, &self.previous_span()),
        })
    }

    /// Parse a type reference: `a.b.Name<T1, T2>`
    pub fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        self.enter()?;
        let result = self.parse_type_inner();
        self.leave();
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeRef, ParseError> {
        let name = self.parse_qualified_name()?;
        let mut args = Vec::new();
        if self.check(&Token::Less) {
            self.advance();
            loop {
                args.push(self.parse_type()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::Greater)?;
        }
        Ok(TypeRef {
            path: name.parts,
            args,
            span: self.combine_spans(&name.span, &self.previous_span()),
        })
    }
}

/// Parse `source` into a compilation unit, surfacing lexer errors as parse errors.
pub fn parse_source(source: &str) -> Result<CompilationUnit, SourceErrors> {
    let parser = Parser::new(source).map_err(SourceErrors::Lex)?;
    parser.parse().map_err(SourceErrors::Parse)
}

/// Errors from [`parse_source`].
#[derive(Debug, Clone)]
pub enum SourceErrors {
    Lex(Vec<LexError>),
    Parse(Vec<ParseError>),
}
