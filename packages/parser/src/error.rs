//! Error types for the expression parser

use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {pos}: expected {expected}, found {found}")]
    UnexpectedToken {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of expression at {pos}: expected {expected}")]
    UnexpectedEof { pos: usize, expected: String },

    #[error("Invalid syntax at {pos}: {message}")]
    InvalidSyntax { pos: usize, message: String },

    #[error("Lexer error at {pos}")]
    LexerError { pos: usize },
}

impl ParseError {
    pub fn unexpected_token(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(pos: usize, expected: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            pos,
            expected: expected.into(),
        }
    }

    pub fn invalid_syntax(pos: usize, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            pos,
            message: message.into(),
        }
    }

    pub fn lexer_error(pos: usize) -> Self {
        Self::LexerError { pos }
    }

    pub fn pos(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { pos, .. }
            | ParseError::UnexpectedEof { pos, .. }
            | ParseError::InvalidSyntax { pos, .. }
            | ParseError::LexerError { pos } => *pos,
        }
    }

    fn label(&self) -> String {
        match self {
            ParseError::UnexpectedToken { expected, .. } | ParseError::UnexpectedEof { expected, .. } => {
                format!("expected {}", expected)
            }
            ParseError::InvalidSyntax { message, .. } => message.clone(),
            ParseError::LexerError { .. } => "unrecognized character".to_string(),
        }
    }
}

/// Pretty-print an error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, error: &ParseError) -> String {
    use ariadne::{Config, Label, Report, ReportKind, Source};

    let name = "expression";
    let start = error.pos().min(source.len());
    let end = (start + 1).min(source.len()).max(start);

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, name, start)
        .with_config(Config::default().with_color(false))
        .with_message(error.to_string())
        .with_label(Label::new((name, start..end)).with_message(error.label()))
        .finish();

    if report.write((name, Source::from(source)), &mut output).is_err() {
        return error.to_string();
    }
    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}

/// Plain one-line rendering when ariadne is not compiled in
#[cfg(not(feature = "pretty-errors"))]
pub fn format_error(source: &str, error: &ParseError) -> String {
    format!("{} in `{}` ({})", error, source, error.label())
}
