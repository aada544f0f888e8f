use crate::error::{ParseError, ParseResult};
use logos::Logos;
use std::fmt;

/// Token types for the computed-value expression language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
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

    // Identifiers
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice())]
    Ident(&'src str),

    // String literals (quotes included)
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| lex.slice())]
    String(&'src str),

    // Backtick template strings (backticks included)
    #[regex(r"`([^`\\]|\\.)*`", |lex| lex.slice())]
    Template(&'src str),

    // Numbers
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice())]
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

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("?.")]
    QuestionDot,

    #[token("?")]
    Question,

    #[token("??")]
    QuestionQuestion,

    #[token("=>")]
    Arrow,

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

    #[token("!")]
    Bang,

    #[token("===")]
    #[token("==")]
    EqualsEquals,

    #[token("!==")]
    #[token("!=")]
    NotEquals,

    #[token("<")]
    LAngle,

    #[token(">")]
    RAngle,

    #[token("<=")]
    LessThanEquals,

    #[token(">=")]
    GreaterThanEquals,

    #[token("&&")]
    And,

    #[token("||")]
    Or,
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Undefined => write!(f, "undefined"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::String(s) => write!(f, "string {}", s),
            Token::Template(s) => write!(f, "template {}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Colon => write!(f, "':'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::QuestionDot => write!(f, "'?.'"),
            Token::Question => write!(f, "'?'"),
            Token::QuestionQuestion => write!(f, "'??'"),
            Token::Arrow => write!(f, "'=>'"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Bang => write!(f, "'!'"),
            Token::EqualsEquals => write!(f, "'=='"),
            Token::NotEquals => write!(f, "'!='"),
            Token::LAngle => write!(f, "'<'"),
            Token::RAngle => write!(f, "'>'"),
            Token::LessThanEquals => write!(f, "'<='"),
            Token::GreaterThanEquals => write!(f, "'>='"),
            Token::And => write!(f, "'&&'"),
            Token::Or => write!(f, "'||'"),
        }
    }
}

/// Tokenize source into a vector of tokens with their byte ranges
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token<'_>, std::ops::Range<usize>)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(ParseError::lexer_error(span.clone(), &source[span]));
            }
        }
    }

    Ok(tokens)
}
