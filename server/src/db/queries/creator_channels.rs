use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::models::{CreateCreatorChannelParams, CreatorChannelFilter, CreatorChannelRow};
use crate::error::StorageError;

use super::{push_filter, push_order_and_limit};

/// List creator channels matching the filter.
pub async fn list_creator_channels(
    pool: &SqlitePool,
    filter: &CreatorChannelFilter,
) -> Result<Vec<CreatorChannelRow>, StorageError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM creator_channels");
    let mut has_where = false;
    push_filter(&mut builder, &mut has_where, "id", filter.id);
    push_filter(&mut builder, &mut has_where, "guild_id", filter.guild_id);
    push_filter(&mut builder, &mut has_where, "channel_id", filter.channel_id);
    push_order_and_limit(&mut builder, filter.limit);

    Ok(builder
        .build_query_as::<CreatorChannelRow>()
        .fetch_all(pool)
        .await?)
}

/// Get the first creator channel matching the filter.
pub async fn get_creator_channel(
    pool: &SqlitePool,
    filter: &CreatorChannelFilter,
) -> Result<Option<CreatorChannelRow>, StorageError> {
    let filter = CreatorChannelFilter {
        limit: Some(1),
        ..*filter
    };
    Ok(list_creator_channels(pool, &filter)
        .await?
        .into_iter()
        .next())
}

/// Insert a creator channel record.
pub async fn create_creator_channel(
    pool: &SqlitePool,
    p: &CreateCreatorChannelParams,
) -> Result<CreatorChannelRow, StorageError> {
    Ok(sqlx::query_as::<_, CreatorChannelRow>(
        "INSERT INTO creator_channels (guild_id, channel_id, user_limit) VALUES (?, ?, ?) \
         RETURNING *",
    )
    .bind(p.guild_id)
    .bind(p.channel_id)
    .bind(p.user_limit)
    .fetch_one(pool)
    .await?)
}
