//! # Dialect Translation
//!
//! One canonical query text, two databases.
//!
//! ## Canonical Form
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Query Text Flow                                    │
//! │                                                                         │
//! │  Repository code (PostgreSQL text, $1..$n markers)                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Translator::translate                                                 │
//! │  ├── lexer:   literals / identifiers / comments are opaque             │
//! │  └── rewrite: placeholders, ILIKE, NOW(), upserts, identity keys       │
//! │           │                                                             │
//! │     ┌─────┴──────┐                                                      │
//! │     ▼            ▼                                                      │
//! │  PostgreSQL    SQLite                                                  │
//! │  (unchanged)   (rewritten)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Translation is a pure function of the text. Anything the target dialect
//! cannot express comes back as a [`TranslationError`] instead of being
//! passed through for the database to reject (or worse, accept with other
//! semantics).
//!
//! ## Known Limitation
//! `ILIKE` becomes SQLite `LIKE`, which folds ASCII letters only:
//! `'Ä' LIKE 'ä'` is false on SQLite and true on PostgreSQL.

mod lexer;
mod rewrite;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TranslationError;

// =============================================================================
// Dialect
// =============================================================================

/// SQL dialects the data-access core runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// The dialect queries are written in.
    pub const CANONICAL: Dialect = Dialect::Postgres;
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "PostgreSQL"),
            Dialect::Sqlite => write!(f, "SQLite"),
        }
    }
}

// =============================================================================
// Conflict Keys
// =============================================================================

/// Unique key columns per table.
///
/// SQLite's `INSERT OR REPLACE` resolves conflicts on any unique key,
/// PostgreSQL's `ON CONFLICT` needs them named. This registry supplies the
/// names when translating toward PostgreSQL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictKeys {
    tables: BTreeMap<String, Vec<String>>,
}

impl ConflictKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `columns` as the conflict key of `table`.
    pub fn with(mut self, table: &str, columns: &[&str]) -> Self {
        self.insert(table, columns);
        self
    }

    pub fn insert(&mut self, table: &str, columns: &[&str]) {
        self.tables.insert(
            Self::normalize(table),
            columns.iter().map(|c| Self::normalize(c)).collect(),
        );
    }

    /// Key columns of `table`, matched without quotes or case.
    pub fn get(&self, table: &str) -> Option<&[String]> {
        self.tables.get(&Self::normalize(table)).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub(crate) fn normalize(ident: &str) -> String {
        ident
            .trim_matches(|c| c == '"' || c == '`')
            .to_ascii_lowercase()
    }
}

// =============================================================================
// Translator
// =============================================================================

/// Rewrites query text from one dialect to another.
///
/// ## Example
/// ```rust
/// use bestell_core::dialect::{Dialect, Translator};
///
/// let translator = Translator::new(Dialect::Postgres, Dialect::Sqlite);
/// let sql = translator
///     .translate("SELECT * FROM customers WHERE nachname ILIKE $1 AND vorname = $2")
///     .unwrap();
/// assert_eq!(sql, "SELECT * FROM customers WHERE nachname LIKE ? AND vorname = ?");
/// ```
#[derive(Debug, Clone)]
pub struct Translator {
    from: Dialect,
    to: Dialect,
    keys: ConflictKeys,
}

impl Translator {
    pub fn new(from: Dialect, to: Dialect) -> Self {
        Translator {
            from,
            to,
            keys: ConflictKeys::default(),
        }
    }

    /// Sets the conflict key registry used for SQLite upserts.
    pub fn with_conflict_keys(mut self, keys: ConflictKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn from(&self) -> Dialect {
        self.from
    }

    pub fn to(&self) -> Dialect {
        self.to
    }

    pub fn conflict_keys(&self) -> &ConflictKeys {
        &self.keys
    }

    /// Translates `sql`. Same-dialect translation returns the input as is.
    pub fn translate(&self, sql: &str) -> Result<String, TranslationError> {
        translate(sql, self.from, self.to, &self.keys)
    }
}

/// Translates `sql` from `from` to `to`.
pub fn translate(
    sql: &str,
    from: Dialect,
    to: Dialect,
    keys: &ConflictKeys,
) -> Result<String, TranslationError> {
    if from == to {
        return Ok(sql.to_string());
    }

    let tokens = lexer::tokenize(sql)?;
    let rewritten = match to {
        Dialect::Sqlite => rewrite::to_sqlite(tokens)?,
        Dialect::Postgres => rewrite::to_postgres(tokens, keys)?,
    };

    Ok(lexer::render(&rewritten))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys() -> ConflictKeys {
        ConflictKeys::new()
            .with("customers", &["kundennummer"])
            .with("charges", &["internal_id"])
            .with("sequences", &["name"])
    }

    fn to_sqlite(sql: &str) -> Result<String, TranslationError> {
        translate(sql, Dialect::Postgres, Dialect::Sqlite, &keys())
    }

    fn to_postgres(sql: &str) -> Result<String, TranslationError> {
        translate(sql, Dialect::Sqlite, Dialect::Postgres, &keys())
    }

    fn is_unsupported(result: Result<String, TranslationError>) -> bool {
        matches!(result, Err(TranslationError::Unsupported { .. }))
    }

    // -------------------------------------------------------------------------
    // Placeholders
    // -------------------------------------------------------------------------

    #[test]
    fn test_sequential_placeholders_become_positional() {
        assert_eq!(
            to_sqlite("SELECT * FROM charges WHERE color = $1 AND size = $2").unwrap(),
            "SELECT * FROM charges WHERE color = ? AND size = ?"
        );
    }

    #[test]
    fn test_reused_placeholders_keep_index() {
        assert_eq!(
            to_sqlite("UPDATE charges SET amount = amount - $1 WHERE amount >= $1 AND color = $2")
                .unwrap(),
            "UPDATE charges SET amount = amount - ?1 WHERE amount >= ?1 AND color = ?2"
        );
    }

    #[test]
    fn test_positional_placeholders_to_postgres() {
        assert_eq!(
            to_postgres("SELECT * FROM t WHERE a = ? AND b = ?3 AND c = ?").unwrap(),
            "SELECT * FROM t WHERE a = $1 AND b = $3 AND c = $4"
        );
    }

    #[test]
    fn test_markers_inside_literals_untouched() {
        let sql = "SELECT 'Preis? $1' AS note, \"col?\" FROM t -- $2\nWHERE a = $1";
        assert_eq!(
            to_sqlite(sql).unwrap(),
            "SELECT 'Preis? $1' AS note, \"col?\" FROM t -- $2\nWHERE a = ?"
        );
    }

    #[test]
    fn test_named_parameters_rejected() {
        assert!(is_unsupported(to_postgres("SELECT * FROM t WHERE a = :a")));
        assert!(is_unsupported(to_postgres("SELECT * FROM t WHERE a = @a")));
        assert!(to_sqlite("SELECT * FROM t WHERE a = ?").is_err());
    }

    // -------------------------------------------------------------------------
    // Case-insensitive match, timestamps
    // -------------------------------------------------------------------------

    #[test]
    fn test_ilike_to_like_and_back() {
        assert_eq!(
            to_sqlite("SELECT COUNT(*) FROM customers WHERE bestellnummer ILIKE $1").unwrap(),
            "SELECT COUNT(*) FROM customers WHERE bestellnummer LIKE ?"
        );
        assert_eq!(
            to_postgres("select 1 from t where a like ?").unwrap(),
            "select 1 from t where a ilike $1"
        );
    }

    #[test]
    fn test_plain_like_cannot_reach_sqlite() {
        assert!(is_unsupported(to_sqlite("SELECT 1 FROM t WHERE a LIKE $1")));
    }

    #[test]
    fn test_now_and_datetime() {
        assert_eq!(
            to_sqlite("UPDATE charges SET last_updated = NOW() WHERE internal_id = $1").unwrap(),
            "UPDATE charges SET last_updated = datetime('now') WHERE internal_id = ?"
        );
        assert_eq!(
            to_postgres("UPDATE charges SET last_updated = datetime('now')").unwrap(),
            "UPDATE charges SET last_updated = NOW()"
        );
        assert!(is_unsupported(to_postgres("SELECT datetime('now', '-1 day')")));
        assert!(is_unsupported(to_postgres("SELECT strftime('%Y', 'now')")));
    }

    #[test]
    fn test_current_timestamp_passes_both_ways() {
        let sql = "UPDATE charges SET last_updated = CURRENT_TIMESTAMP";
        assert_eq!(to_sqlite(sql).unwrap(), sql);
        assert_eq!(to_postgres(sql).unwrap(), sql);
    }

    // -------------------------------------------------------------------------
    // Upserts
    // -------------------------------------------------------------------------

    #[test]
    fn test_postgres_upsert_passes_to_sqlite() {
        let sql = "INSERT INTO sequences (name, value) VALUES ($1, 1) \
                   ON CONFLICT (name) DO UPDATE SET value = sequences.value + 1 RETURNING value";
        assert_eq!(
            to_sqlite(sql).unwrap(),
            "INSERT INTO sequences (name, value) VALUES (?, 1) \
             ON CONFLICT (name) DO UPDATE SET value = sequences.value + 1 RETURNING value"
        );
    }

    #[test]
    fn test_insert_or_ignore() {
        assert_eq!(
            to_postgres("INSERT OR IGNORE INTO sequences (name, value) VALUES (?, 0)").unwrap(),
            "INSERT INTO sequences (name, value) VALUES ($1, 0) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn test_insert_or_ignore_before_returning() {
        assert_eq!(
            to_postgres("INSERT OR IGNORE INTO sequences (name) VALUES (?) RETURNING value")
                .unwrap(),
            "INSERT INTO sequences (name) VALUES ($1) ON CONFLICT DO NOTHING RETURNING value"
        );
    }

    #[test]
    fn test_insert_or_replace_keeps_update_half() {
        assert_eq!(
            to_postgres(
                "INSERT OR REPLACE INTO customers (kundennummer, vorname, nachname) VALUES (?, ?, ?)"
            )
            .unwrap(),
            "INSERT INTO customers (kundennummer, vorname, nachname) VALUES ($1, $2, $3) \
             ON CONFLICT (kundennummer) DO UPDATE SET vorname = EXCLUDED.vorname, \
             nachname = EXCLUDED.nachname"
        );
    }

    #[test]
    fn test_replace_into() {
        assert_eq!(
            to_postgres("REPLACE INTO sequences (name, value) VALUES (?, ?)").unwrap(),
            "INSERT INTO sequences (name, value) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value"
        );
    }

    #[test]
    fn test_replace_of_key_only_does_nothing() {
        assert_eq!(
            to_postgres("INSERT OR REPLACE INTO sequences (name) VALUES (?)").unwrap(),
            "INSERT INTO sequences (name) VALUES ($1) ON CONFLICT (name) DO NOTHING"
        );
    }

    #[test]
    fn test_replace_needs_known_table_and_columns() {
        assert!(matches!(
            to_postgres("INSERT OR REPLACE INTO invoices (id, total) VALUES (?, ?)"),
            Err(TranslationError::UnknownConflictKey { table }) if table == "invoices"
        ));
        assert!(is_unsupported(to_postgres(
            "INSERT OR REPLACE INTO customers VALUES (?, ?, ?)"
        )));
    }

    #[test]
    fn test_targetless_do_update_gets_target() {
        assert_eq!(
            to_postgres(
                "INSERT INTO customers (kundennummer, vorname) VALUES (?, ?) \
                 ON CONFLICT DO UPDATE SET vorname = excluded.vorname"
            )
            .unwrap(),
            "INSERT INTO customers (kundennummer, vorname) VALUES ($1, $2) \
             ON CONFLICT (kundennummer) DO UPDATE SET vorname = excluded.vorname"
        );
    }

    #[test]
    fn test_other_conflict_modes_rejected() {
        assert!(is_unsupported(to_postgres("INSERT OR ABORT INTO t (a) VALUES (?)")));
        assert!(is_unsupported(to_postgres("INSERT OR FAIL INTO t (a) VALUES (?)")));
        assert!(is_unsupported(to_postgres("INSERT OR ROLLBACK INTO t (a) VALUES (?)")));
        assert!(is_unsupported(to_sqlite(
            "INSERT INTO t (a) VALUES ($1) ON CONFLICT ON CONSTRAINT t_pkey DO NOTHING"
        )));
    }

    #[test]
    fn test_column_conflict_clause_rejected() {
        let err = to_postgres("CREATE TABLE t (a TEXT UNIQUE ON CONFLICT REPLACE)").unwrap_err();
        assert_eq!(err, TranslationError::unsupported("ON CONFLICT REPLACE", Dialect::Postgres));

        for mode in ["IGNORE", "ABORT", "FAIL", "ROLLBACK"] {
            let sql = format!("CREATE TABLE t (a TEXT NOT NULL ON CONFLICT {})", mode.to_lowercase());
            assert!(is_unsupported(to_postgres(&sql)), "{}", mode);
        }

        // the upsert clause still translates
        assert!(to_postgres("INSERT INTO t (a) VALUES (?) ON CONFLICT DO NOTHING").is_ok());
    }

    // -------------------------------------------------------------------------
    // DDL and transaction control
    // -------------------------------------------------------------------------

    #[test]
    fn test_identity_columns() {
        assert_eq!(
            to_sqlite("CREATE TABLE cup_orders (id BIGSERIAL PRIMARY KEY, kundennummer TEXT)")
                .unwrap(),
            "CREATE TABLE cup_orders (id INTEGER PRIMARY KEY AUTOINCREMENT, kundennummer TEXT)"
        );
        assert_eq!(
            to_sqlite("CREATE TABLE t (id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY)")
                .unwrap(),
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT)"
        );
        assert_eq!(
            to_postgres("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, x TEXT)").unwrap(),
            "CREATE TABLE t (id BIGSERIAL PRIMARY KEY, x TEXT)"
        );
        assert!(is_unsupported(to_sqlite("CREATE TABLE t (n SERIAL)")));
        assert!(is_unsupported(to_postgres("CREATE TABLE t (n AUTOINCREMENT)")));
    }

    #[test]
    fn test_transaction_control() {
        assert_eq!(to_sqlite("START TRANSACTION").unwrap(), "BEGIN");
        assert_eq!(to_postgres("BEGIN IMMEDIATE TRANSACTION").unwrap(), "BEGIN");
        assert_eq!(to_postgres("BEGIN EXCLUSIVE").unwrap(), "BEGIN");
        assert_eq!(to_sqlite("COMMIT").unwrap(), "COMMIT");
        assert_eq!(to_postgres("ROLLBACK").unwrap(), "ROLLBACK");
    }

    // -------------------------------------------------------------------------
    // Rejections
    // -------------------------------------------------------------------------

    #[test]
    fn test_postgres_only_constructs_rejected() {
        assert!(matches!(
            to_sqlite("SELECT $1::text"),
            Err(TranslationError::Unsupported { target: Dialect::Sqlite, .. })
        ));
        assert!(is_unsupported(to_sqlite("SELECT * FROM charges FOR UPDATE")));
        assert!(is_unsupported(to_sqlite("SELECT DISTINCT ON (color) * FROM charges")));
        assert!(is_unsupported(to_sqlite("CREATE SEQUENCE IF NOT EXISTS batch_number_seq")));
        assert!(is_unsupported(to_sqlite("SELECT nextval('batch_number_seq')")));
        assert!(matches!(
            to_sqlite("SELECT $$x$$"),
            Err(TranslationError::Malformed { .. })
        ));
    }

    #[test]
    fn test_sqlite_only_constructs_rejected() {
        assert!(is_unsupported(to_postgres("PRAGMA foreign_keys = ON")));
        assert!(is_unsupported(to_postgres("SELECT * FROM t WHERE a GLOB ?")));
    }

    #[test]
    fn test_same_dialect_is_identity() {
        let sql = "SELECT a::text FROM t WHERE b LIKE $1 FOR UPDATE";
        assert_eq!(
            translate(sql, Dialect::Postgres, Dialect::Postgres, &keys()).unwrap(),
            sql
        );
    }

    #[test]
    fn test_multiple_statements() {
        assert_eq!(
            to_postgres("INSERT OR IGNORE INTO sequences (name) VALUES ('a'); SELECT ?").unwrap(),
            "INSERT INTO sequences (name) VALUES ('a') ON CONFLICT DO NOTHING; SELECT $1"
        );
    }

    #[test]
    fn test_translator_struct() {
        let translator =
            Translator::new(Dialect::Sqlite, Dialect::Postgres).with_conflict_keys(keys());
        assert_eq!(translator.from(), Dialect::Sqlite);
        assert_eq!(translator.to(), Dialect::Postgres);
        assert!(translator
            .translate("REPLACE INTO customers (kundennummer, barcode) VALUES (?, ?)")
            .is_ok());
        assert!(Translator::new(Dialect::Sqlite, Dialect::Postgres)
            .translate("REPLACE INTO customers (kundennummer, barcode) VALUES (?, ?)")
            .is_err());
    }

    #[test]
    fn test_conflict_keys_normalize() {
        let keys = ConflictKeys::new().with("\"Customers\"", &["KundenNummer"]);
        assert_eq!(keys.get("customers"), Some(&["kundennummer".to_string()][..]));
        assert!(keys.get("charges").is_none());
    }

    // -------------------------------------------------------------------------
    // Round-trip laws
    // -------------------------------------------------------------------------

    const COLUMNS: &[&str] = &["vorname", "nachname", "bestellnummer", "barcode", "dateien"];

    /// Parameter indices: either `1..=n` in order or an arbitrary sequence.
    fn indices() -> impl Strategy<Value = Vec<usize>> {
        prop_oneof![
            (1usize..6).prop_map(|n| (1..=n).collect()),
            prop::collection::vec(1usize..6, 1..6),
        ]
    }

    fn literal() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["'x'", "'Was? $1'", "'it''s ?2'", "''"]).prop_map(String::from)
    }

    fn pg_select() -> impl Strategy<Value = String> {
        (indices(), literal(), any::<bool>()).prop_map(|(idx, lit, ilike)| {
            let preds: Vec<String> = idx
                .iter()
                .enumerate()
                .map(|(n, i)| {
                    let op = if ilike && n == 0 { "ILIKE" } else { "=" };
                    format!("{} {} ${}", COLUMNS[n % COLUMNS.len()], op, i)
                })
                .collect();
            format!(
                "SELECT kundennummer, {} AS note FROM customers WHERE {}",
                lit,
                preds.join(" AND ")
            )
        })
    }

    fn pg_upsert() -> impl Strategy<Value = String> {
        (
            prop::sample::subsequence(COLUMNS.to_vec(), 0..=COLUMNS.len()),
            any::<bool>(),
        )
            .prop_map(|(cols, returning)| {
                let mut all = vec!["kundennummer"];
                all.extend(cols.iter().copied());
                let marks: Vec<String> = (1..=all.len()).map(|i| format!("${}", i)).collect();
                let action = if cols.is_empty() {
                    "DO NOTHING".to_string()
                } else {
                    let sets: Vec<String> =
                        cols.iter().map(|c| format!("{} = EXCLUDED.{}", c, c)).collect();
                    format!("DO UPDATE SET {}", sets.join(", "))
                };
                let mut sql = format!(
                    "INSERT INTO customers ({}) VALUES ({}) ON CONFLICT (kundennummer) {}",
                    all.join(", "),
                    marks.join(", "),
                    action
                );
                if returning {
                    sql.push_str(" RETURNING kundennummer");
                }
                sql
            })
    }

    fn sqlite_query() -> impl Strategy<Value = String> {
        let upsert = (
            prop::sample::subsequence(COLUMNS.to_vec(), 0..=COLUMNS.len()),
            prop::sample::select(vec!["INSERT OR REPLACE", "REPLACE", "INSERT OR IGNORE"]),
        )
            .prop_map(|(cols, verb)| {
                let mut all = vec!["kundennummer"];
                all.extend(cols.iter().copied());
                let marks = vec!["?"; all.len()].join(", ");
                format!("{} INTO customers ({}) VALUES ({})", verb, all.join(", "), marks)
            });
        let select = (prop::collection::vec(prop::option::of(1usize..6), 1..6), literal())
            .prop_map(|(marks, lit)| {
                let preds: Vec<String> = marks
                    .iter()
                    .enumerate()
                    .map(|(n, m)| {
                        let mark = m.map_or("?".to_string(), |i| format!("?{}", i));
                        format!("{} LIKE {}", COLUMNS[n % COLUMNS.len()], mark)
                    })
                    .collect();
                format!("SELECT {} FROM customers WHERE {}", lit, preds.join(" OR "))
            });
        prop_oneof![upsert, select]
    }

    proptest! {
        #[test]
        fn prop_postgres_round_trip_is_identity(sql in prop_oneof![pg_select(), pg_upsert()]) {
            let sqlite = to_sqlite(&sql).unwrap();
            prop_assert_eq!(to_postgres(&sqlite).unwrap(), sql);
        }

        #[test]
        fn prop_sqlite_round_trip_is_stable(sql in sqlite_query()) {
            let normalized = to_postgres(&sql).unwrap();
            let back = to_postgres(&to_sqlite(&normalized).unwrap()).unwrap();
            prop_assert_eq!(back, normalized);
        }

        #[test]
        fn prop_lexer_never_panics(sql in ".{0,64}") {
            let _ = to_sqlite(&sql);
            let _ = to_postgres(&sql);
        }
    }
}
