//! Repository: filtered reads and row-returning mutations for the three record kinds.
//!
//! Every function maps `sqlx` failures into [`StorageError`](crate::error::StorageError).
//! A missing row is `Ok(None)`, never an error.

pub mod creator_channels;
pub mod guilds;
pub mod temporary_channels;

use sqlx::{QueryBuilder, Sqlite};

/// Append `column = value` to the WHERE clause when the filter field is set.
pub(crate) fn push_filter(
    builder: &mut QueryBuilder<'_, Sqlite>,
    has_where: &mut bool,
    column: &'static str,
    value: Option<i64>,
) {
    let Some(value) = value else {
        return;
    };
    if *has_where {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_where = true;
    }
    builder.push(column).push(" = ").push_bind(value);
}

/// Append the ordering and optional row cap shared by every multi-row read.
pub(crate) fn push_order_and_limit(builder: &mut QueryBuilder<'_, Sqlite>, limit: Option<i64>) {
    builder.push(" ORDER BY id");
    if let Some(limit) = limit {
        builder.push(" LIMIT ").push_bind(limit);
    }
}
