use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::models::{
    ChannelId, CreateTemporaryChannelParams, TemporaryChannelFilter, TemporaryChannelRow,
};
use crate::error::StorageError;

use super::{push_filter, push_order_and_limit};

/// List temporary channels matching the filter.
pub async fn list_temporary_channels(
    pool: &SqlitePool,
    filter: &TemporaryChannelFilter,
) -> Result<Vec<TemporaryChannelRow>, StorageError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM temporary_voice_channels");
    let mut has_where = false;
    push_filter(&mut builder, &mut has_where, "id", filter.id);
    push_filter(&mut builder, &mut has_where, "guild_id", filter.guild_id);
    push_filter(&mut builder, &mut has_where, "channel_id", filter.channel_id);
    push_filter(&mut builder, &mut has_where, "owner_id", filter.owner_id);
    push_filter(&mut builder, &mut has_where, "user_count", filter.user_count);
    push_order_and_limit(&mut builder, filter.limit);

    Ok(builder
        .build_query_as::<TemporaryChannelRow>()
        .fetch_all(pool)
        .await?)
}

/// Get the first temporary channel matching the filter.
pub async fn get_temporary_channel(
    pool: &SqlitePool,
    filter: &TemporaryChannelFilter,
) -> Result<Option<TemporaryChannelRow>, StorageError> {
    let filter = TemporaryChannelFilter {
        limit: Some(1),
        ..*filter
    };
    Ok(list_temporary_channels(pool, &filter)
        .await?
        .into_iter()
        .next())
}

/// Get a temporary channel by its external channel id.
pub async fn get_by_channel_id(
    pool: &SqlitePool,
    channel_id: ChannelId,
) -> Result<Option<TemporaryChannelRow>, StorageError> {
    get_temporary_channel(
        pool,
        &TemporaryChannelFilter {
            channel_id: Some(channel_id),
            ..Default::default()
        },
    )
    .await
}

/// Insert a temporary channel record.
pub async fn create_temporary_channel(
    pool: &SqlitePool,
    p: &CreateTemporaryChannelParams,
) -> Result<TemporaryChannelRow, StorageError> {
    Ok(sqlx::query_as::<_, TemporaryChannelRow>(
        "INSERT INTO temporary_voice_channels (guild_id, channel_id, user_count, owner_id) \
         VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(p.guild_id)
    .bind(p.channel_id)
    .bind(p.user_count)
    .bind(p.owner_id)
    .fetch_one(pool)
    .await?)
}

/// Set the occupant count. Returns `None` if the record no longer exists.
pub async fn set_user_count(
    pool: &SqlitePool,
    id: i64,
    user_count: i64,
) -> Result<Option<TemporaryChannelRow>, StorageError> {
    Ok(sqlx::query_as::<_, TemporaryChannelRow>(
        "UPDATE temporary_voice_channels SET user_count = ? WHERE id = ? RETURNING *",
    )
    .bind(user_count)
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

/// Delete a temporary channel record. Returns the deleted row, or `None` if it was already gone.
pub async fn delete_temporary_channel(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<TemporaryChannelRow>, StorageError> {
    Ok(sqlx::query_as::<_, TemporaryChannelRow>(
        "DELETE FROM temporary_voice_channels WHERE id = ? RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?)
}
