//! Token-level rewrites between the two dialects.
//!
//! Both directions work the same way: a placeholder pass over the whole
//! token stream, then a keyword pass per statement (statements are split on
//! `;`). Every rewrite either produces target text or fails; nothing the
//! target cannot run is passed through silently.

use super::lexer::{tokenize, Placeholder, Token, TokenKind};
use super::{ConflictKeys, Dialect};
use crate::error::TranslationError;

type Rewrite<T> = Result<T, TranslationError>;

const SERIAL_TYPES: &[&str] = &[
    "SMALLSERIAL",
    "SERIAL",
    "BIGSERIAL",
    "SERIAL2",
    "SERIAL4",
    "SERIAL8",
];

const INTEGER_TYPES: &[&str] = &["SMALLINT", "INT", "INTEGER", "BIGINT", "INT2", "INT4", "INT8"];

const SEQUENCE_FUNCTIONS: &[&str] = &["NEXTVAL", "CURRVAL", "SETVAL"];

// =============================================================================
// PostgreSQL → SQLite
// =============================================================================

pub(crate) fn to_sqlite(mut tokens: Vec<Token>) -> Rewrite<Vec<Token>> {
    placeholders_to_sqlite(&mut tokens)?;
    per_statement(tokens, statement_to_sqlite)
}

/// `$1..$n` used once each, in order, become bare `?`. Anything else keeps
/// its explicit index as `?N`.
fn placeholders_to_sqlite(tokens: &mut [Token]) -> Rewrite<()> {
    let mut indices = Vec::new();
    for tok in tokens.iter() {
        match tok.kind {
            TokenKind::Placeholder(Placeholder::Dollar(n)) => indices.push(n),
            TokenKind::Placeholder(_) => {
                return Err(TranslationError::malformed(
                    tok.offset,
                    format!("'{}' is not a PostgreSQL parameter", tok.text),
                ))
            }
            _ => {}
        }
    }

    let sequential = indices.iter().enumerate().all(|(pos, &n)| n == pos + 1);

    for tok in tokens.iter_mut() {
        if let TokenKind::Placeholder(Placeholder::Dollar(n)) = tok.kind {
            if sequential {
                tok.kind = TokenKind::Placeholder(Placeholder::Positional);
                tok.text = "?".to_string();
            } else {
                tok.kind = TokenKind::Placeholder(Placeholder::Numbered(n));
                tok.text = format!("?{}", n);
            }
        }
    }

    Ok(())
}

fn statement_to_sqlite(tokens: &[Token]) -> Rewrite<Vec<Token>> {
    let target = Dialect::Sqlite;
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];
        let offset = tok.offset;

        if tok.is_punct("::") {
            return Err(TranslationError::unsupported("'::' cast", target));
        }

        if tok.kind != TokenKind::Word {
            out.push(tok.clone());
            i += 1;
            continue;
        }

        if tok.is_kw("ILIKE") {
            out.push(Token::word(&match_case(&tok.text, "like"), offset));
        } else if tok.is_kw("LIKE") {
            return Err(TranslationError::unsupported("case-sensitive LIKE", target));
        } else if let Some(close) = tok
            .is_kw("NOW")
            .then(|| empty_parens_after(tokens, i))
            .flatten()
        {
            out.extend(datetime_now(offset));
            i = close + 1;
            continue;
        } else if let Some(end) = keywords_at(tokens, i, &["START", "TRANSACTION"]) {
            out.push(Token::word("BEGIN", offset));
            i = end + 1;
            continue;
        } else if is_any_kw(tok, SERIAL_TYPES) {
            let end = next_sig(tokens, i)
                .and_then(|j| keywords_at(tokens, j, &["PRIMARY", "KEY"]))
                .ok_or_else(|| {
                    TranslationError::unsupported("serial column without PRIMARY KEY", target)
                })?;
            out.extend(keyword_tokens("INTEGER PRIMARY KEY AUTOINCREMENT", offset));
            i = end + 1;
            continue;
        } else if is_any_kw(tok, INTEGER_TYPES) && next_kw_is(tokens, i, "GENERATED") {
            let end = next_sig(tokens, i)
                .and_then(|g| identity_primary_key_end(tokens, g))
                .ok_or_else(|| {
                    TranslationError::unsupported("identity column without PRIMARY KEY", target)
                })?;
            out.extend(keyword_tokens("INTEGER PRIMARY KEY AUTOINCREMENT", offset));
            i = end + 1;
            continue;
        } else if tok.is_kw("FOR")
            && next_sig(tokens, i)
                .is_some_and(|j| is_any_kw(&tokens[j], &["UPDATE", "SHARE", "NO", "KEY"]))
        {
            return Err(TranslationError::unsupported("FOR UPDATE/SHARE row locking", target));
        } else if keywords_at(tokens, i, &["DISTINCT", "ON"]).is_some() {
            return Err(TranslationError::unsupported("DISTINCT ON", target));
        } else if keywords_at(tokens, i, &["CREATE", "SEQUENCE"]).is_some() {
            return Err(TranslationError::unsupported("CREATE SEQUENCE", target));
        } else if is_any_kw(tok, SEQUENCE_FUNCTIONS) && next_punct_is(tokens, i, "(") {
            return Err(TranslationError::unsupported(
                format!("{}()", tok.text.to_ascii_lowercase()),
                target,
            ));
        } else if keywords_at(tokens, i, &["ON", "CONFLICT", "ON", "CONSTRAINT"]).is_some() {
            return Err(TranslationError::unsupported("ON CONFLICT ON CONSTRAINT", target));
        } else {
            out.push(tok.clone());
        }

        i += 1;
    }

    Ok(out)
}

/// `GENERATED {ALWAYS | BY DEFAULT} AS IDENTITY PRIMARY KEY` starting at `g`.
fn identity_primary_key_end(tokens: &[Token], g: usize) -> Option<usize> {
    keywords_at(
        tokens,
        g,
        &["GENERATED", "ALWAYS", "AS", "IDENTITY", "PRIMARY", "KEY"],
    )
    .or_else(|| {
        keywords_at(
            tokens,
            g,
            &["GENERATED", "BY", "DEFAULT", "AS", "IDENTITY", "PRIMARY", "KEY"],
        )
    })
}

fn datetime_now(offset: usize) -> Vec<Token> {
    vec![
        Token::word("datetime", offset),
        Token::new(TokenKind::Punct, "(", offset),
        Token::new(TokenKind::StringLit, "'now'", offset),
        Token::new(TokenKind::Punct, ")", offset),
    ]
}

// =============================================================================
// SQLite → PostgreSQL
// =============================================================================

pub(crate) fn to_postgres(mut tokens: Vec<Token>, keys: &ConflictKeys) -> Rewrite<Vec<Token>> {
    placeholders_to_postgres(&mut tokens)?;
    per_statement(tokens, |stmt| statement_to_postgres(stmt, keys))
}

/// `?` takes the index after the largest one assigned so far, as SQLite
/// numbers it. `?N` and `$N` keep `N`.
fn placeholders_to_postgres(tokens: &mut [Token]) -> Rewrite<()> {
    let mut highest: usize = 0;

    for tok in tokens.iter_mut() {
        let n = match tok.kind {
            TokenKind::Placeholder(Placeholder::Positional) => highest.saturating_add(1),
            TokenKind::Placeholder(Placeholder::Numbered(n))
            | TokenKind::Placeholder(Placeholder::Dollar(n)) => n,
            TokenKind::Placeholder(Placeholder::Named) => {
                return Err(TranslationError::unsupported(
                    format!("named parameter '{}'", tok.text),
                    Dialect::Postgres,
                ))
            }
            _ => continue,
        };

        highest = highest.max(n);
        tok.kind = TokenKind::Placeholder(Placeholder::Dollar(n));
        tok.text = format!("${}", n);
    }

    Ok(())
}

/// SQLite's conflict clause on `INSERT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictMode {
    /// Plain `INSERT`.
    Abort,
    Ignore,
    Replace,
}

/// What the translator needs to know about an `INSERT` statement's head.
#[derive(Debug)]
struct InsertHead {
    /// Index of `INSERT` / `REPLACE`.
    start: usize,
    /// Index of the conflict mode keyword (`start` when there is none).
    mode_end: usize,
    mode: ConflictMode,
    table: String,
    columns: Option<Vec<String>>,
}

fn parse_insert_head(tokens: &[Token]) -> Rewrite<Option<InsertHead>> {
    let Some(start) = tokens.iter().position(Token::is_significant) else {
        return Ok(None);
    };
    let first = &tokens[start];

    let (mode, mode_end) = if first.is_kw("REPLACE") {
        (ConflictMode::Replace, start)
    } else if first.is_kw("INSERT") {
        match keywords_at(tokens, start, &["INSERT", "OR"]) {
            Some(or) => {
                let m = next_sig(tokens, or).ok_or_else(|| {
                    TranslationError::malformed(tokens[or].offset, "INSERT OR without a mode")
                })?;
                let mode = if tokens[m].is_kw("IGNORE") {
                    ConflictMode::Ignore
                } else if tokens[m].is_kw("REPLACE") {
                    ConflictMode::Replace
                } else {
                    return Err(TranslationError::unsupported(
                        format!("INSERT OR {}", tokens[m].text.to_ascii_uppercase()),
                        Dialect::Postgres,
                    ));
                };
                (mode, m)
            }
            None => (ConflictMode::Abort, start),
        }
    } else {
        return Ok(None);
    };

    let into = next_sig(tokens, mode_end)
        .filter(|&j| tokens[j].is_kw("INTO"))
        .ok_or_else(|| TranslationError::malformed(first.offset, "INSERT without INTO"))?;

    let missing_table = || TranslationError::malformed(tokens[into].offset, "INSERT without table");
    let mut table_at = next_sig(tokens, into).ok_or_else(missing_table)?;
    while let Some(dot) = next_sig(tokens, table_at).filter(|&j| tokens[j].is_punct(".")) {
        table_at = next_sig(tokens, dot).ok_or_else(missing_table)?;
    }

    let table_tok = &tokens[table_at];
    if !matches!(table_tok.kind, TokenKind::Word | TokenKind::QuotedIdent) {
        return Err(missing_table());
    }

    Ok(Some(InsertHead {
        start,
        mode_end,
        mode,
        table: table_tok.text.clone(),
        columns: column_list(tokens, table_at)?,
    }))
}

/// The `(a, b, c)` column list following the table name, if present.
fn column_list(tokens: &[Token], table_at: usize) -> Rewrite<Option<Vec<String>>> {
    let Some(open) = next_sig(tokens, table_at).filter(|&j| tokens[j].is_punct("(")) else {
        return Ok(None);
    };

    let mut columns = Vec::new();
    let mut at = open;
    loop {
        at = next_sig(tokens, at)
            .ok_or_else(|| TranslationError::malformed(tokens[open].offset, "unclosed column list"))?;
        let tok = &tokens[at];
        match tok.kind {
            TokenKind::Word | TokenKind::QuotedIdent => columns.push(tok.text.clone()),
            _ if tok.is_punct(",") => {}
            _ if tok.is_punct(")") => break,
            _ => {
                return Err(TranslationError::malformed(
                    tok.offset,
                    format!("unexpected '{}' in column list", tok.text),
                ))
            }
        }
    }

    Ok(Some(columns))
}

fn statement_to_postgres(tokens: &[Token], keys: &ConflictKeys) -> Rewrite<Vec<Token>> {
    let target = Dialect::Postgres;
    let head = parse_insert_head(tokens)?;
    let mode = head.as_ref().map_or(ConflictMode::Abort, |h| h.mode);
    let mut out = Vec::with_capacity(tokens.len() + 16);
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];
        let offset = tok.offset;

        // INSERT OR IGNORE / INSERT OR REPLACE / REPLACE → INSERT
        if let Some(head) = head.as_ref().filter(|h| h.start == i && h.mode != ConflictMode::Abort) {
            out.push(Token::word(&match_case(&tok.text, "insert"), offset));
            if head.mode_end == i {
                i += 1;
                continue;
            }
            let or = next_sig(tokens, i).unwrap_or(head.mode_end);
            out.extend(tokens[i + 1..or].iter().cloned());
            i = head.mode_end + 1;
            while tokens.get(i).is_some_and(|t| t.kind == TokenKind::Whitespace) {
                i += 1;
            }
            continue;
        }

        if tok.kind != TokenKind::Word {
            out.push(tok.clone());
            i += 1;
            continue;
        }

        if tok.is_kw("LIKE") {
            out.push(Token::word(&match_case(&tok.text, "ilike"), offset));
        } else if tok.is_kw("GLOB") {
            return Err(TranslationError::unsupported("GLOB", target));
        } else if tok.is_kw("PRAGMA") {
            return Err(TranslationError::unsupported("PRAGMA", target));
        } else if tok.is_kw("DATETIME") && next_punct_is(tokens, i, "(") {
            let close = datetime_now_end(tokens, i).ok_or_else(|| {
                TranslationError::unsupported("datetime() other than datetime('now')", target)
            })?;
            out.push(Token::word("NOW", offset));
            out.push(Token::new(TokenKind::Punct, "(", offset));
            out.push(Token::new(TokenKind::Punct, ")", offset));
            i = close + 1;
            continue;
        } else if tok.is_kw("STRFTIME") && next_punct_is(tokens, i, "(") {
            return Err(TranslationError::unsupported("strftime()", target));
        } else if let Some(end) =
            keywords_at(tokens, i, &["INTEGER", "PRIMARY", "KEY", "AUTOINCREMENT"])
        {
            out.extend(keyword_tokens("BIGSERIAL PRIMARY KEY", offset));
            i = end + 1;
            continue;
        } else if tok.is_kw("AUTOINCREMENT") {
            return Err(TranslationError::unsupported(
                "AUTOINCREMENT outside INTEGER PRIMARY KEY",
                target,
            ));
        } else if tok.is_kw("BEGIN")
            && next_sig(tokens, i)
                .is_some_and(|j| is_any_kw(&tokens[j], &["IMMEDIATE", "DEFERRED", "EXCLUSIVE"]))
        {
            let mut end = next_sig(tokens, i).unwrap_or(i);
            if let Some(t) = next_sig(tokens, end).filter(|&t| tokens[t].is_kw("TRANSACTION")) {
                end = t;
            }
            out.push(Token::word("BEGIN", offset));
            i = end + 1;
            continue;
        } else if let Some(resolution) = keywords_at(tokens, i, &["ON", "CONFLICT"])
            .and_then(|c| next_sig(tokens, c))
            .filter(|&r| {
                is_any_kw(&tokens[r], &["REPLACE", "IGNORE", "ABORT", "FAIL", "ROLLBACK"])
            })
        {
            // column-constraint form, e.g. `UNIQUE ON CONFLICT REPLACE`
            return Err(TranslationError::unsupported(
                format!("ON CONFLICT {}", tokens[resolution].text.to_uppercase()),
                target,
            ));
        } else if let Some(conflict) = keywords_at(tokens, i, &["ON", "CONFLICT"]) {
            if mode != ConflictMode::Abort {
                return Err(TranslationError::malformed(
                    offset,
                    "INSERT OR IGNORE/REPLACE combined with ON CONFLICT",
                ));
            }
            out.extend(tokens[i..=conflict].iter().cloned());
            let do_update = next_sig(tokens, conflict)
                .and_then(|j| keywords_at(tokens, j, &["DO", "UPDATE"]))
                .is_some();
            if do_update {
                let head = head.as_ref().ok_or_else(|| {
                    TranslationError::malformed(offset, "ON CONFLICT outside INSERT")
                })?;
                out.push(Token::space(offset));
                out.extend(tokenize(&format!("({})", conflict_target(keys, &head.table)?))?);
            }
            i = conflict + 1;
            continue;
        } else {
            out.push(tok.clone());
        }

        i += 1;
    }

    if let Some(head) = head.as_ref() {
        let clause = match head.mode {
            ConflictMode::Abort => None,
            ConflictMode::Ignore => Some("ON CONFLICT DO NOTHING".to_string()),
            ConflictMode::Replace => Some(replace_clause(keys, head)?),
        };
        if let Some(clause) = clause {
            append_conflict_clause(&mut out, &clause)?;
        }
    }

    Ok(out)
}

/// `( 'now' )` after `datetime`; returns the index of `)`.
fn datetime_now_end(tokens: &[Token], i: usize) -> Option<usize> {
    let open = next_sig(tokens, i)?;
    let arg = next_sig(tokens, open)?;
    let close = next_sig(tokens, arg)?;
    let is_now = tokens[arg].kind == TokenKind::StringLit
        && tokens[arg].text.eq_ignore_ascii_case("'now'");
    (is_now && tokens[close].is_punct(")")).then_some(close)
}

fn conflict_target(keys: &ConflictKeys, table: &str) -> Rewrite<String> {
    keys.get(table)
        .map(|cols| cols.join(", "))
        .ok_or_else(|| TranslationError::UnknownConflictKey {
            table: table.to_string(),
        })
}

/// `ON CONFLICT (keys) DO UPDATE SET c = EXCLUDED.c` for every listed column
/// that is not part of the key.
fn replace_clause(keys: &ConflictKeys, head: &InsertHead) -> Rewrite<String> {
    let columns = head.columns.as_ref().ok_or_else(|| {
        TranslationError::unsupported("INSERT OR REPLACE without a column list", Dialect::Postgres)
    })?;
    let key_columns = keys
        .get(&head.table)
        .ok_or_else(|| TranslationError::UnknownConflictKey {
            table: head.table.clone(),
        })?;

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !key_columns.contains(&ConflictKeys::normalize(c)))
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();

    let target = key_columns.join(", ");
    if updates.is_empty() {
        Ok(format!("ON CONFLICT ({}) DO NOTHING", target))
    } else {
        Ok(format!(
            "ON CONFLICT ({}) DO UPDATE SET {}",
            target,
            updates.join(", ")
        ))
    }
}

/// Places the clause before a top-level `RETURNING`, or at the end of the
/// statement.
fn append_conflict_clause(out: &mut Vec<Token>, clause: &str) -> Rewrite<()> {
    let mut clause_tokens = tokenize(clause)?;
    let mut depth = 0usize;
    let mut returning = None;

    for (i, tok) in out.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_kw("RETURNING") {
            returning = Some(i);
            break;
        }
    }

    match returning {
        Some(at) => {
            let offset = out[at].offset;
            clause_tokens.push(Token::space(offset));
            out.splice(at..at, clause_tokens);
        }
        None => {
            let at = out
                .iter()
                .rposition(Token::is_significant)
                .map_or(out.len(), |p| p + 1);
            let offset = out.get(at).map_or(0, |t| t.offset);
            clause_tokens.insert(0, Token::space(offset));
            out.splice(at..at, clause_tokens);
        }
    }

    Ok(())
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Applies `rewrite` to each `;`-separated statement, keeping the separators.
fn per_statement(
    tokens: Vec<Token>,
    mut rewrite: impl FnMut(&[Token]) -> Rewrite<Vec<Token>>,
) -> Rewrite<Vec<Token>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut start = 0;

    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_punct(";") {
            out.extend(rewrite(&tokens[start..i])?);
            out.push(tok.clone());
            start = i + 1;
        }
    }
    out.extend(rewrite(&tokens[start..])?);

    Ok(out)
}

fn next_sig(tokens: &[Token], i: usize) -> Option<usize> {
    (i + 1..tokens.len()).find(|&j| tokens[j].is_significant())
}

fn next_kw_is(tokens: &[Token], i: usize, keyword: &str) -> bool {
    next_sig(tokens, i).is_some_and(|j| tokens[j].is_kw(keyword))
}

fn next_punct_is(tokens: &[Token], i: usize, punct: &str) -> bool {
    next_sig(tokens, i).is_some_and(|j| tokens[j].is_punct(punct))
}

/// Matches `keywords` against consecutive significant tokens starting at
/// `i`. Returns the index of the last one.
fn keywords_at(tokens: &[Token], i: usize, keywords: &[&str]) -> Option<usize> {
    let mut at = i;
    for (n, keyword) in keywords.iter().enumerate() {
        if n > 0 {
            at = next_sig(tokens, at)?;
        }
        if !tokens.get(at)?.is_kw(keyword) {
            return None;
        }
    }
    Some(at)
}

fn is_any_kw(tok: &Token, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| tok.is_kw(kw))
}

/// `( )` after `i`; returns the index of `)`.
fn empty_parens_after(tokens: &[Token], i: usize) -> Option<usize> {
    let open = next_sig(tokens, i).filter(|&j| tokens[j].is_punct("("))?;
    next_sig(tokens, open).filter(|&j| tokens[j].is_punct(")"))
}

/// Keeps lowercase input lowercase; anything else comes out uppercase.
fn match_case(original: &str, keyword: &str) -> String {
    if original.chars().any(|c| c.is_ascii_uppercase()) {
        keyword.to_ascii_uppercase()
    } else {
        keyword.to_ascii_lowercase()
    }
}

/// Space-separated keywords as tokens.
fn keyword_tokens(text: &str, offset: usize) -> Vec<Token> {
    let mut out = Vec::new();
    for (n, word) in text.split(' ').enumerate() {
        if n > 0 {
            out.push(Token::space(offset));
        }
        out.push(Token::word(word, offset));
    }
    out
}
