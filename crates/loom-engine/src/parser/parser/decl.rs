//! Declaration parsing: imports, namespace, classes and members

use super::{recovery, ParseError, Parser};
use crate::parser::ast::*;
use crate::parser::token::Token;

/// Parse `import a.b;`
pub fn parse_import(parser: &mut Parser) -> Result<Import, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::Import)?;
    let path = parser.parse_qualified_name()?;
    parser.expect(Token::Semicolon)?;
    Ok(Import {
        path,
        span: parser.combine_spans(&start, &parser.previous_span()),
    })
}

/// Parse the file-scoped `namespace a.b;`
pub fn parse_namespace(parser: &mut Parser) -> Result<QualifiedName, ParseError> {
    parser.expect(Token::Namespace)?;
    let name = parser.parse_qualified_name()?;
    if parser.check(&Token::LeftBrace) {
        return Err(ParseError::invalid_syntax(
            "Block namespaces are not supported",
            parser.current_span(),
        )
        .with_suggestion(format!("Use a file-scoped declaration: namespace {};", name.dotted())));
    }
    parser.expect(Token::Semicolon)?;
    Ok(name)
}

fn parse_visibility(parser: &mut Parser) -> Visibility {
    match parser.current() {
        Token::Public => {
            parser.advance();
            Visibility::Public
        }
        Token::Private | Token::Protected => {
            parser.advance();
            Visibility::Private
        }
        _ => Visibility::Private,
    }
}

/// Parse a class declaration.
pub fn parse_class(parser: &mut Parser) -> Result<ClassDecl, ParseError> {
    let start = parser.current_span();
    let visibility = parse_visibility(parser);
    parser.expect(Token::Class)?;
    let name = parser.expect_identifier()?;

    let mut supertypes = Vec::new();
    if parser.eat(&Token::Colon) {
        loop {
            supertypes.push(parser.parse_type()?);
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }

    parser.expect(Token::LeftBrace)?;

    let mut members = Vec::new();
    while !parser.check(&Token::RightBrace) && !parser.at_eof() {
        match parse_member(parser) {
            Ok(member) => members.push(member),
            Err(err) => {
                parser.record(err);
                recovery::sync_to_member(parser);
            }
        }
    }
    parser.expect(Token::RightBrace)?;

    Ok(ClassDecl {
        visibility,
        name,
        supertypes,
        members,
        span: parser.combine_spans(&start, &parser.previous_span()),
    })
}

fn parse_member(parser: &mut Parser) -> Result<Member, ParseError> {
    let start = parser.current_span();
    let visibility = parse_visibility(parser);

    // Constructor: Name( with no return type. The name is checked during lowering.
    if matches!(parser.current(), Token::Identifier(_)) && matches!(parser.peek(), Some(Token::LeftParen)) {
        let name = parser.expect_identifier()?;
        let params = parse_parameters(parser)?;
        let body = super::stmt::parse_block(parser)?;
        return Ok(Member::Constructor(ConstructorDecl {
            visibility,
            name,
            params,
            body,
            span: parser.combine_spans(&start, &parser.previous_span()),
        }));
    }

    let ty = parser.parse_type()?;
    let name = parser.expect_identifier()?;

    match parser.current() {
        Token::LeftParen => {
            let params = parse_parameters(parser)?;
            let body = super::stmt::parse_block(parser)?;
            Ok(Member::Method(MethodDecl {
                visibility,
                return_type: ty,
                name,
                params,
                body,
                span: parser.combine_spans(&start, &parser.previous_span()),
            }))
        }
        Token::LeftBrace => parse_property(parser, visibility, ty, name, start),
        Token::Equal | Token::Semicolon => {
            let initializer = if parser.eat(&Token::Equal) {
                Some(super::expr::parse_expression(parser)?)
            } else {
                None
            };
            parser.expect(Token::Semicolon)?;
            Ok(Member::Field(FieldDecl {
                visibility,
                ty,
                name,
                initializer,
                span: parser.combine_spans(&start, &parser.previous_span()),
            }))
        }
        _ => Err(parser.unexpected_token(&[Token::LeftParen, Token::LeftBrace, Token::Equal, Token::Semicolon])),
    }
}

fn parse_parameters(parser: &mut Parser) -> Result<Vec<Parameter>, ParseError> {
    parser.expect(Token::LeftParen)?;
    let mut params = Vec::new();
    if !parser.check(&Token::RightParen) {
        loop {
            let ty = parser.parse_type()?;
            let name = parser.expect_identifier()?;
            params.push(Parameter { ty, name });
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }
    parser.expect(Token::RightParen)?;
    Ok(params)
}

fn parse_property(
    parser: &mut Parser,
    visibility: Visibility,
    ty: TypeRef,
    name: Identifier,
    start: crate::parser::token::Span,
) -> Result<Member, ParseError> {
    parser.expect(Token::LeftBrace)?;
    let mut getter = None;
    let mut setter = None;

    while !parser.check(&Token::RightBrace) && !parser.at_eof() {
        // Accessor-level visibility is accepted and ignored
        if parser.current().is_visibility() {
            parser.advance();
        }

        let accessor_span = parser.current_span();
        let is_get = parser.check_word("get");
        let is_set = parser.check_word("set");
        if !is_get && !is_set {
            return Err(ParseError::invalid_syntax(
                format!("Expected 'get' or 'set' accessor, found '{}'", parser.current()),
                accessor_span,
            ));
        }
        parser.advance();

        let body = if parser.eat(&Token::Semicolon) {
            None
        } else {
            Some(super::stmt::parse_block(parser)?)
        };
        let accessor = Accessor {
            body,
            span: parser.combine_spans(&accessor_span, &parser.previous_span()),
        };

        let slot = if is_get { &mut getter } else { &mut setter };
        if slot.is_some() {
            return Err(ParseError::invalid_syntax(
                format!(
                    "Property '{}' already has a '{}' accessor",
                    name.name,
                    if is_get { "get" } else { "set" }
                ),
                accessor_span,
            ));
        }
        *slot = Some(accessor);
    }
    parser.expect(Token::RightBrace)?;

    if getter.is_none() && setter.is_none() {
        return Err(ParseError::invalid_syntax(
            format!("Property '{}' must declare at least one accessor", name.name),
            name.span,
        ));
    }

    Ok(Member::Property(PropertyDecl {
        visibility,
        ty,
        name,
        getter,
        setter,
        span: parser.combine_spans(&start, &parser.previous_span()),
    }))
}
