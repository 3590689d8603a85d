//! # Query Parameters and Execution
//!
//! Parameters travel as [`Value`]s and are always bound, never spliced into
//! query text. The helpers here run already-translated SQL on any sqlx
//! executor: the pool (autocommit), a pooled connection, or a transaction.

use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Executor};
use tracing::debug;

use crate::error::DbResult;

/// A bindable query parameter. Every variant is nullable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(Option<i64>),
    Real(Option<f64>),
    Text(Option<String>),
    Bool(Option<bool>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(Some(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(Some(i64::from(v)))
    }
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(Some(v))
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(Some(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Some(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Some(v))
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(Some(v.clone()))
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        Value::Text(v)
    }
}

impl From<Option<&str>> for Value {
    fn from(v: Option<&str>) -> Self {
        Value::Text(v.map(str::to_string))
    }
}

/// Binds `params` in order.
pub(crate) fn bind_all<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Any, AnyArguments<'q>> {
    params
        .iter()
        .cloned()
        .fold(sqlx::query(sql), |query, value| match value {
            Value::Int(v) => query.bind(v),
            Value::Real(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Bool(v) => query.bind(v),
        })
}

// =============================================================================
// Execution
// =============================================================================

/// Runs a statement, returning the number of affected rows.
pub(crate) async fn execute<'c, E>(executor: E, sql: &str, params: &[Value]) -> DbResult<u64>
where
    E: Executor<'c, Database = Any>,
{
    debug!(sql = %sql, params = params.len(), "Executing statement");
    let result = bind_all(sql, params).execute(executor).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn fetch_all<'c, E>(executor: E, sql: &str, params: &[Value]) -> DbResult<Vec<AnyRow>>
where
    E: Executor<'c, Database = Any>,
{
    debug!(sql = %sql, params = params.len(), "Fetching rows");
    Ok(bind_all(sql, params).fetch_all(executor).await?)
}

pub(crate) async fn fetch_optional<'c, E>(
    executor: E,
    sql: &str,
    params: &[Value],
) -> DbResult<Option<AnyRow>>
where
    E: Executor<'c, Database = Any>,
{
    debug!(sql = %sql, params = params.len(), "Fetching optional row");
    Ok(bind_all(sql, params).fetch_optional(executor).await?)
}

pub(crate) async fn fetch_one<'c, E>(executor: E, sql: &str, params: &[Value]) -> DbResult<AnyRow>
where
    E: Executor<'c, Database = Any>,
{
    debug!(sql = %sql, params = params.len(), "Fetching one row");
    Ok(bind_all(sql, params).fetch_one(executor).await?)
}

// =============================================================================
// Unit Tests
// =============================================================================
