use crate::error::{ParseError, ParseResult};
use logos::Logos;
use std::fmt;

/// Token types for binding expressions
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token<'src> {
    // Keywords
    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    #[token("undefined")]
    Undefined,

    #[token("this")]
    This,

    #[token("typeof")]
    Typeof,

    #[token("let")]
    Let,

    #[token("const")]
    Const,

    #[token("var")]
    Var,

    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("return")]
    Return,

    #[token("in")]
    In,

    // Identifiers (magics start with `$`)
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice())]
    Ident(&'src str),

    // String literals (quotes retained, stripped by the parser)
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    #[regex(r"'([^'\\]|\\.)*'", |lex| lex.slice())]
    String(&'src str),

    #[regex(r"`([^`\\]|\\.)*`", |lex| lex.slice())]
    Template(&'src str),

    // Numbers
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    #[regex(r"\.[0-9]+", |lex| lex.slice())]
    Number(&'src str),

    // Symbols
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token("...")]
    Ellipsis,

    #[token("?")]
    Question,

    #[token("?.")]
    QuestionDot,

    #[token("=>")]
    Arrow,

    // Assignment
    #[token("=")]
    Assign,

    #[token("+=")]
    PlusAssign,

    #[token("-=")]
    MinusAssign,

    #[token("*=")]
    StarAssign,

    #[token("/=")]
    SlashAssign,

    #[token("||=")]
    OrAssign,

    #[token("&&=")]
    AndAssign,

    #[token("??=")]
    NullishAssign,

    // Comparison
    #[token("==")]
    EqualsEquals,

    #[token("!=")]
    NotEquals,

    #[token("===")]
    StrictEquals,

    #[token("!==")]
    StrictNotEquals,

    #[token("<")]
    LAngle,

    #[token(">")]
    RAngle,

    #[token("<=")]
    LessThanEquals,

    #[token(">=")]
    GreaterThanEquals,

    // Arithmetic
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("++")]
    PlusPlus,

    #[token("--")]
    MinusMinus,

    // Logical
    #[token("!")]
    Bang,

    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("??")]
    Nullish,
}

impl<'src> Token<'src> {
    /// Keywords are valid property names after `.` and inside object literals
    pub fn keyword_text(&self) -> Option<&'static str> {
        match self {
            Token::True => Some("true"),
            Token::False => Some("false"),
            Token::Null => Some("null"),
            Token::Undefined => Some("undefined"),
            Token::This => Some("this"),
            Token::Typeof => Some("typeof"),
            Token::Let => Some("let"),
            Token::Const => Some("const"),
            Token::Var => Some("var"),
            Token::If => Some("if"),
            Token::Else => Some("else"),
            Token::Return => Some("return"),
            Token::In => Some("in"),
            _ => None,
        }
    }
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(keyword) = self.keyword_text() {
            return write!(f, "{}", keyword);
        }
        match self {
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::String(s) => write!(f, "string {}", s),
            Token::Template(s) => write!(f, "template {}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Ellipsis => write!(f, "..."),
            Token::Question => write!(f, "?"),
            Token::QuestionDot => write!(f, "?."),
            Token::Arrow => write!(f, "=>"),
            Token::Assign => write!(f, "="),
            Token::PlusAssign => write!(f, "+="),
            Token::MinusAssign => write!(f, "-="),
            Token::StarAssign => write!(f, "*="),
            Token::SlashAssign => write!(f, "/="),
            Token::OrAssign => write!(f, "||="),
            Token::AndAssign => write!(f, "&&="),
            Token::NullishAssign => write!(f, "??="),
            Token::EqualsEquals => write!(f, "=="),
            Token::NotEquals => write!(f, "!="),
            Token::StrictEquals => write!(f, "==="),
            Token::StrictNotEquals => write!(f, "!=="),
            Token::LAngle => write!(f, "<"),
            Token::RAngle => write!(f, ">"),
            Token::LessThanEquals => write!(f, "<="),
            Token::GreaterThanEquals => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::PlusPlus => write!(f, "++"),
            Token::MinusMinus => write!(f, "--"),
            Token::Bang => write!(f, "!"),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Nullish => write!(f, "??"),
            _ => write!(f, "keyword"),
        }
    }
}

/// Tokenize a source string, failing on the first unrecognized character
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token<'_>, std::ops::Range<usize>)>> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(ParseError::lexer_error(span.start)),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token<'_>> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = kinds("this open $refs _private typeof");
        assert_eq!(
            tokens,
            vec![
                Token::This,
                Token::Ident("open"),
                Token::Ident("$refs"),
                Token::Ident("_private"),
                Token::Typeof,
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        // `index` and `iffy` must not lex as `in` / `if`
        assert_eq!(kinds("index iffy"), vec![Token::Ident("index"), Token::Ident("iffy")]);
    }

    #[test]
    fn test_operators_prefer_longest_match() {
        let tokens = kinds("a === b !== c ?? d ?. e => f ... ++");
        assert!(tokens.contains(&Token::StrictEquals));
        assert!(tokens.contains(&Token::StrictNotEquals));
        assert!(tokens.contains(&Token::Nullish));
        assert!(tokens.contains(&Token::QuestionDot));
        assert!(tokens.contains(&Token::Arrow));
        assert!(tokens.contains(&Token::Ellipsis));
        assert!(tokens.contains(&Token::PlusPlus));
    }

    #[test]
    fn test_strings_and_numbers() {
        let tokens = kinds(r#""double" 'single' `tpl ${x}` 42 3.5 .5 1e3"#);
        assert_eq!(tokens[0], Token::String("\"double\""));
        assert_eq!(tokens[1], Token::String("'single'"));
        assert!(matches!(tokens[2], Token::Template(_)));
        assert_eq!(tokens[3], Token::Number("42"));
        assert_eq!(tokens[4], Token::Number("3.5"));
        assert_eq!(tokens[5], Token::Number(".5"));
        assert_eq!(tokens[6], Token::Number("1e3"));
    }

    #[test]
    fn test_unknown_character_is_lexer_error() {
        let err = tokenize("a # b").unwrap_err();
        assert!(matches!(err, ParseError::LexerError { pos: 2 }));
    }
}
