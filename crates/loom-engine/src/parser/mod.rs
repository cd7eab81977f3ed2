//! Lexer and parser for Loom source.
//!
//! # Example
//!
//! ```ignore
//! use loom_engine::parser::Lexer;
//!
//! let source = r#"
//!     public class Greeter {
//!         public string Greet(string name) { return "Hello " + name; }
//!     }
//! "#;
//!
//! match Lexer::new(source).tokenize() {
//!     Ok(tokens) => {
//!         for (token, span) in tokens {
//!             println!("{:?} at {}:{}", token, span.line, span.column);
//!         }
//!     }
//!     Err(errors) => {
//!         for err in errors {
//!             eprintln!("{}", err);
//!         }
//!     }
//! }
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod precedence;
pub mod token;

pub use error::{ParseError, ParseErrorKind};
pub use lexer::{escape, unescape, LexError, Lexer};
pub use parser::{parse_source, Parser, SourceErrors};
pub use token::{Span, Token};
