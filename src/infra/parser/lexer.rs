//! Token definitions for V source
//!
//! Only what the declaration parser needs is distinguished. Operators and
//! other punctuation collapse into `Op`; line comments and block comments
//! (which nest in V) are skipped.

use std::ops::Range;

use logos::{Lexer, Logos, Skip};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("/*", block_comment)]
    BlockComment,

    #[token("\n")]
    Newline,

    // Keywords
    #[token("module")]
    Module,
    #[token("import")]
    Import,
    #[token("pub")]
    Pub,
    #[token("mut")]
    Mut,
    #[token("fn")]
    Fn,
    #[token("struct")]
    Struct,
    #[token("union")]
    Union,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[0-9][0-9A-Za-z_]*")]
    Number,

    #[regex(r"'([^'\\]|\\.)*'")]
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    #[regex(r"`([^`\\]|\\.)+`")]
    Char,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token("@")]
    At,

    #[regex(r"[+\-*/%<>!|^~?#$&;\\]")]
    Op,
}

impl Token {
    pub fn is_open(&self) -> bool {
        matches!(self, Token::LParen | Token::LBrace | Token::LBracket)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Token::RParen | Token::RBrace | Token::RBracket)
    }

    /// Tokens that can name something after `fn` / `struct`
    pub fn is_name(&self) -> bool {
        matches!(
            self,
            Token::Ident | Token::Module | Token::Import | Token::Mut | Token::Union
        )
    }
}

/// Skip a block comment, honoring nesting. Unterminated comments run to EOF.
fn block_comment(lex: &mut Lexer<Token>) -> Skip {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0;

    while i < rest.len() {
        match (rest[i], rest.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    break;
                }
            }
            _ => i += 1,
        }
    }

    lex.bump(i.min(rest.len()));
    Skip
}

/// A token with its byte span; `None` marks text the lexer could not match
pub type Spanned = (Option<Token>, Range<usize>);

pub fn tokenize(source: &str) -> Vec<Spanned> {
    Token::lexer(source)
        .spanned()
        .map(|(token, span)| (token.ok(), span))
        .collect()
}
