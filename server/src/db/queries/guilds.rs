use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::models::{GuildFilter, GuildId, GuildRow};
use crate::error::StorageError;

use super::{push_filter, push_order_and_limit};

/// List guilds matching the filter.
pub async fn list_guilds(
    pool: &SqlitePool,
    filter: &GuildFilter,
) -> Result<Vec<GuildRow>, StorageError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM guilds");
    let mut has_where = false;
    push_filter(&mut builder, &mut has_where, "id", filter.id);
    push_filter(&mut builder, &mut has_where, "guild_id", filter.guild_id);
    push_order_and_limit(&mut builder, filter.limit);

    Ok(builder
        .build_query_as::<GuildRow>()
        .fetch_all(pool)
        .await?)
}

/// Get the first guild matching the filter.
pub async fn get_guild(
    pool: &SqlitePool,
    filter: &GuildFilter,
) -> Result<Option<GuildRow>, StorageError> {
    let filter = GuildFilter {
        limit: Some(1),
        ..*filter
    };
    Ok(list_guilds(pool, &filter).await?.into_iter().next())
}

/// Insert a guild record.
pub async fn create_guild(pool: &SqlitePool, guild_id: GuildId) -> Result<GuildRow, StorageError> {
    Ok(
        sqlx::query_as::<_, GuildRow>("INSERT INTO guilds (guild_id) VALUES (?) RETURNING *")
            .bind(guild_id)
            .fetch_one(pool)
            .await?,
    )
}

/// Ensure a guild record exists for the external guild id, creating it if needed.
pub async fn ensure_guild(pool: &SqlitePool, guild_id: GuildId) -> Result<GuildRow, StorageError> {
    let by_external = GuildFilter {
        guild_id: Some(guild_id),
        ..Default::default()
    };
    if let Some(row) = get_guild(pool, &by_external).await? {
        return Ok(row);
    }
    match create_guild(pool, guild_id).await {
        Ok(row) => Ok(row),
        // A concurrent caller may have inserted it between the lookup and the insert.
        Err(e) => get_guild(pool, &by_external).await?.ok_or(e),
    }
}
