pub mod ast;
pub mod error;
pub mod parser;
pub mod tokenizer;

#[cfg(test)]
mod tests_expressions;

pub use ast::*;
pub use error::{format_error, ParseError, ParseResult};
pub use parser::{parse_expression, parse_iteration, parse_program, Parser};
pub use tokenizer::{tokenize, Token};
