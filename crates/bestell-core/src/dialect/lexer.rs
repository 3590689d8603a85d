//! SQL tokenizer used by the translator.
//!
//! Just enough lexing to know what is code and what is data: string
//! literals, quoted identifiers and comments are single opaque tokens, so a
//! `?` inside `'Was ist das?'` is never mistaken for a parameter.

use crate::error::TranslationError;

/// Parameter marker styles found in either dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder {
    /// `?` (SQLite, next free index)
    Positional,
    /// `?NNN` (SQLite, explicit index)
    Numbered(usize),
    /// `$NNN` (PostgreSQL)
    Dollar(usize),
    /// `:name`, `@name`, `$name`
    Named,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Whitespace,
    Comment,
    Word,
    QuotedIdent,
    StringLit,
    Number,
    Placeholder(Placeholder),
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            offset,
        }
    }

    /// A synthesized keyword token.
    pub fn word(text: &str, offset: usize) -> Self {
        Token::new(TokenKind::Word, text, offset)
    }

    /// A synthesized single space.
    pub fn space(offset: usize) -> Self {
        Token::new(TokenKind::Whitespace, " ", offset)
    }

    pub fn is_significant(&self) -> bool {
        !matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Case-insensitive keyword match.
    pub fn is_kw(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }
}

/// Splits SQL text into tokens. Concatenating the token texts gives back
/// the input unchanged.
pub(crate) fn tokenize(sql: &str) -> Result<Vec<Token>, TranslationError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < sql.len() {
        let start = pos;
        let rest = &sql[pos..];
        let Some(c) = rest.chars().next() else { break };

        let kind = if c.is_whitespace() {
            pos += take_while(rest, char::is_whitespace);
            TokenKind::Whitespace
        } else if rest.starts_with("--") {
            pos += rest.find('\n').unwrap_or(rest.len());
            TokenKind::Comment
        } else if rest.starts_with("/*") {
            let end = rest[2..]
                .find("*/")
                .ok_or_else(|| TranslationError::malformed(start, "unterminated block comment"))?;
            pos += end + 4;
            TokenKind::Comment
        } else if c == '\'' {
            pos += quoted_len(rest, '\'')
                .ok_or_else(|| TranslationError::malformed(start, "unterminated string literal"))?;
            TokenKind::StringLit
        } else if c == '"' || c == '`' {
            pos += quoted_len(rest, c).ok_or_else(|| {
                TranslationError::malformed(start, "unterminated quoted identifier")
            })?;
            TokenKind::QuotedIdent
        } else if c.is_ascii_digit() {
            pos += take_while(rest, |c| c.is_ascii_alphanumeric() || c == '.');
            TokenKind::Number
        } else if c.is_alphabetic() || c == '_' {
            pos += take_while(rest, |c| c.is_alphanumeric() || c == '_');
            TokenKind::Word
        } else if c == '?' {
            let digits = take_while(&rest[1..], |c| c.is_ascii_digit());
            pos += 1 + digits;
            if digits == 0 {
                TokenKind::Placeholder(Placeholder::Positional)
            } else {
                TokenKind::Placeholder(Placeholder::Numbered(parse_index(sql, start + 1, pos)?))
            }
        } else if c == '$' {
            let after = &rest[1..];
            let digits = take_while(after, |c| c.is_ascii_digit());
            if digits > 0 {
                pos += 1 + digits;
                TokenKind::Placeholder(Placeholder::Dollar(parse_index(sql, start + 1, pos)?))
            } else if after.starts_with('$') || dollar_tag_len(after).is_some() {
                return Err(TranslationError::malformed(
                    start,
                    "dollar-quoted strings are not supported",
                ));
            } else {
                let name = take_while(after, |c| c.is_alphanumeric() || c == '_');
                pos += 1 + name;
                if name == 0 {
                    TokenKind::Punct
                } else {
                    TokenKind::Placeholder(Placeholder::Named)
                }
            }
        } else if c == ':' && rest[1..].starts_with(':') {
            pos += 2;
            TokenKind::Punct
        } else if (c == ':' || c == '@')
            && rest[1..].chars().next().is_some_and(|n| n.is_alphabetic() || n == '_')
        {
            pos += 1 + take_while(&rest[1..], |c| c.is_alphanumeric() || c == '_');
            TokenKind::Placeholder(Placeholder::Named)
        } else {
            pos += c.len_utf8();
            TokenKind::Punct
        };

        tokens.push(Token::new(kind, &sql[start..pos], start));
    }

    Ok(tokens)
}

/// Renders tokens back into SQL text.
pub(crate) fn render(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

fn take_while(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(s.len(), |(i, _)| i)
}

/// Length of a quoted run starting at `s[0] == quote`, where a doubled quote
/// is an escaped quote.
fn quoted_len(s: &str, quote: char) -> Option<usize> {
    let mut chars = s.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            if chars.peek().is_some_and(|&(_, n)| n == quote) {
                chars.next();
                continue;
            }
            return Some(i + c.len_utf8());
        }
    }
    None
}

/// `tag$` of a `$tag$` opener, if `s` (text after the first `$`) has one.
fn dollar_tag_len(s: &str) -> Option<usize> {
    let tag = take_while(s, |c| c.is_alphanumeric() || c == '_');
    (tag > 0 && s[tag..].starts_with('$')).then_some(tag + 1)
}

fn parse_index(sql: &str, from: usize, to: usize) -> Result<usize, TranslationError> {
    match sql[from..to].parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(TranslationError::malformed(from, "parameter index must be 1 or greater")),
    }
}
