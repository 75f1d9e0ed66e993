use sqlx::Connection;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use tracing::info;

/// Open the channel-record store: WAL journal, 5 s busy timeout, up to five connections.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("database connected: {}", database_url);
    Ok(pool)
}

/// Split a migration into statements. Trigger bodies (`BEGIN ... END;`) stay whole,
/// since the channel-kind exclusion triggers contain inner semicolons.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_begin = false;

    for line in sql.lines() {
        let trimmed = line.trim();
        // Table comments in the migration files sit between statements
        if trimmed.starts_with("--") && current.trim().is_empty() {
            continue;
        }

        current.push_str(line);
        current.push('\n');

        let upper = trimmed.to_uppercase();
        if upper.starts_with("BEGIN") || upper.ends_with(" BEGIN") {
            in_begin = true;
        }

        if in_begin {
            if upper.starts_with("END;") || upper == "END" {
                in_begin = false;
                let stmt = current.trim().to_string();
                let stmt = stmt.strip_suffix(';').unwrap_or(&stmt).trim().to_string();
                if !stmt.is_empty() {
                    statements.push(stmt);
                }
                current.clear();
            }
        } else {
            while let Some(pos) = current.find(';') {
                let stmt = current[..pos].trim().to_string();
                if !stmt.is_empty() && !stmt.starts_with("--") {
                    statements.push(stmt);
                }
                current = current[pos + 1..].to_string();
            }
        }
    }

    // A final statement without a semicolon
    let remaining = current.trim().to_string();
    if !remaining.is_empty() && !remaining.starts_with("--") {
        let remaining = remaining
            .strip_suffix(';')
            .unwrap_or(&remaining)
            .trim()
            .to_string();
        if !remaining.is_empty() {
            statements.push(remaining);
        }
    }

    statements
}

/// Bring the store up to the latest schema version. Versions already listed in
/// `schema_version` are skipped, so startup can call this unconditionally.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (\
            version     INTEGER PRIMARY KEY, \
            applied_at  TEXT NOT NULL DEFAULT (datetime('now'))\
        )",
    )
    .execute(pool)
    .await?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await?;

    let migrations: &[(i64, &str)] = &[
        (1, include_str!("../../migrations/001_initial.sql")),
        (
            2,
            include_str!("../../migrations/002_channel_kind_exclusion.sql"),
        ),
    ];

    for &(version, sql) in migrations {
        if version <= current_version {
            continue;
        }
        info!("applying migration {version}...");
        // `REFERENCES guilds(id)` is checked per connection; keep it off while tables are built
        let mut conn = pool.acquire().await?;
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;
        let result: Result<(), sqlx::Error> = async {
            let mut tx = conn.begin().await?;
            for statement in split_sql_statements(sql) {
                if !statement.is_empty() {
                    sqlx::query(&statement).execute(&mut *tx).await?;
                }
            }
            sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await?;
        result?;
    }

    let final_version = migrations.last().map(|m| m.0).unwrap_or(0);
    info!("database migrations applied (version: {final_version})");
    Ok(())
}
