//! Lexer for SQL DDL using logos.
//!
//! Only the subset of SQL needed to describe tables is tokenized as
//! keywords. Everything else comes through as identifiers, literals or
//! symbols so that the parser can skip statements it does not understand.

use logos::{FilterResult, Logos};
use thiserror::Error;

/// Token types for SQL DDL.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Statement keywords
    #[token("create", ignore(ascii_case))]
    Create,

    #[token("table", ignore(ascii_case))]
    Table,

    #[token("alter", ignore(ascii_case))]
    Alter,

    #[token("add", ignore(ascii_case))]
    Add,

    #[token("if", ignore(ascii_case))]
    If,

    #[token("exists", ignore(ascii_case))]
    Exists,

    // Column and table constraints
    #[token("not", ignore(ascii_case))]
    Not,

    #[token("null", ignore(ascii_case))]
    Null,

    #[token("primary", ignore(ascii_case))]
    Primary,

    #[token("key", ignore(ascii_case))]
    Key,

    #[token("foreign", ignore(ascii_case))]
    Foreign,

    #[token("references", ignore(ascii_case))]
    References,

    #[token("unique", ignore(ascii_case))]
    Unique,

    #[token("default", ignore(ascii_case))]
    Default,

    #[token("constraint", ignore(ascii_case))]
    Constraint,

    #[token("auto_increment", ignore(ascii_case))]
    #[token("autoincrement", ignore(ascii_case))]
    AutoIncrement,

    #[token("check", ignore(ascii_case))]
    Check,

    #[token("index", ignore(ascii_case))]
    Index,

    #[token("comment", ignore(ascii_case))]
    Comment,

    #[token("unsigned", ignore(ascii_case))]
    Unsigned,

    #[token("generated", ignore(ascii_case))]
    Generated,

    #[token("always", ignore(ascii_case))]
    Always,

    #[token("as", ignore(ascii_case))]
    As,

    #[token("identity", ignore(ascii_case))]
    Identity,

    // Referential actions
    #[token("on", ignore(ascii_case))]
    On,

    #[token("delete", ignore(ascii_case))]
    Delete,

    #[token("update", ignore(ascii_case))]
    Update,

    #[token("cascade", ignore(ascii_case))]
    Cascade,

    #[token("set", ignore(ascii_case))]
    Set,

    #[token("restrict", ignore(ascii_case))]
    Restrict,

    #[token("no", ignore(ascii_case))]
    No,

    #[token("action", ignore(ascii_case))]
    Action,

    // Symbols
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

    #[token(".")]
    Dot,

    #[token("=")]
    Eq,

    #[token("-")]
    Minus,

    #[token("+")]
    Plus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token(":")]
    Colon,

    /// Comparison and other operators, only seen inside skipped expressions.
    #[regex(r"[<>!|&%^~?@][<>!|&%^~?@=]*", |lex| lex.slice().to_string())]
    Operator(String),

    // Literals
    #[regex(r"'([^']|'')*'", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].replace("''", "'")
    })]
    StringLiteral(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().to_string())]
    Decimal(String),

    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Integer(String),

    // Identifiers
    #[regex(r#""([^"]|"")+""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].replace("\"\"", "\"")
    })]
    #[regex(r"`[^`]+`", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    QuotedIdent(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Comments (skipped)
    #[regex(r"--[^\n]*", logos::skip)]
    #[token("/*", block_comment)]
    Trivia,
}

/// Skips to the first `*/`. An unterminated comment is an error spanning
/// the rest of the input.
fn block_comment(lex: &mut logos::Lexer<'_, Token>) -> FilterResult<(), ()> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(())
        }
    }
}

impl Token {
    /// Returns the identifier text if this token can name a table or column.
    ///
    /// Besides plain and quoted identifiers this accepts the non-reserved
    /// keywords (`key`, `comment`, `action`, ...) which are common column
    /// names.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Token::Ident(name) | Token::QuotedIdent(name) => Some(name),
            other => other.soft_keyword(),
        }
    }

    /// Returns the lowercase keyword text for keywords that may double as identifiers.
    pub fn soft_keyword(&self) -> Option<&'static str> {
        Some(match self {
            Token::Add => "add",
            Token::If => "if",
            Token::Exists => "exists",
            Token::Key => "key",
            Token::Index => "index",
            Token::Comment => "comment",
            Token::Unsigned => "unsigned",
            Token::Generated => "generated",
            Token::Always => "always",
            Token::Identity => "identity",
            Token::Delete => "delete",
            Token::Update => "update",
            Token::Cascade => "cascade",
            Token::Set => "set",
            Token::Restrict => "restrict",
            Token::No => "no",
            Token::Action => "action",
            _ => return None,
        })
    }

    /// Returns true if this is a bare identifier equal to `word`, ignoring case.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident(name) if name.eq_ignore_ascii_case(word))
    }
}

/// A token with its span information.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

/// Lexer wrapper that provides iteration over spanned tokens.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    /// Creates a new lexer for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }

    /// Returns the source string being lexed.
    pub fn source(&self) -> &'source str {
        self.inner.source()
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<SpannedToken, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let span = self.inner.span();

        match token {
            Ok(token) => Some(Ok(SpannedToken { token, span })),
            Err(_) => {
                let slice = &self.inner.source()[span.clone()];
                Some(Err(LexerError {
                    span,
                    message: format!("unexpected character: {:?}", slice),
                }))
            }
        }
    }
}

/// An error that occurred during lexing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct LexerError {
    pub span: std::ops::Range<usize>,
    pub message: String,
}

/// Convenience function to lex a source string into a vector of tokens.
pub fn lex(source: &str) -> Result<Vec<SpannedToken>, LexerError> {
    Lexer::new(source).collect()
}
