//! Database-backed cache on a SeaORM connection.

use crate::codec;
use crate::config::DatabaseCacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::namespace::Namespace;
use crate::traits::CacheStore;
use crate::value::CacheValue;
use async_trait::async_trait;
use cachet_log::{debug, info};
use sea_orm::sea_query::{
    Alias, ColumnDef, Cond, Expr, Index, LikeExpr, OnConflict, Query, SimpleExpr, Table,
};
use sea_orm::{ConnectOptions, ConnectionTrait, DatabaseConnection, DbBackend};
use std::time::Duration;

const KEY: &str = "k";
const VALUE: &str = "v";
const EXPIRES: &str = "expires";
const UPDATED: &str = "updated";

/// Rows per `IN (...)` delete.
const DELETE_BATCH: usize = 500;

/// Cache stored in a relational table.
///
/// Layout: `k` (namespaced key, primary key), `v` (codec payload), `expires`
/// (unix seconds, `NULL` for never) and `updated` (unix seconds of the last
/// write). Expired rows are invisible to reads and removed by
/// `clear(true)`, which sweeps the whole table.
///
/// The driver offers no compare operations: a plain table has no portable
/// atomic read-modify-write.
#[derive(Clone)]
pub struct DatabaseCache {
    conn: DatabaseConnection,
    table: String,
    namespace: Namespace,
}

impl DatabaseCache {
    /// Driver name.
    pub const NAME: &'static str = "database";

    /// Longest namespaced key the `k` column holds.
    pub const MAX_KEY_LENGTH: usize = 255;

    /// Use an existing connection.
    pub fn new(conn: DatabaseConnection, config: DatabaseCacheConfig, namespace: Namespace) -> Self {
        Self {
            conn,
            table: config.table,
            namespace,
        }
    }

    /// Connect to `database_url` and make sure the cache table exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the database cannot be
    /// reached.
    pub async fn connect(
        database_url: &str,
        config: DatabaseCacheConfig,
        namespace: Namespace,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let mut options = ConnectOptions::new(database_url);
        options.connect_timeout(timeout).sqlx_logging(false);

        let conn = sea_orm::Database::connect(options)
            .await
            .map_err(|e| CacheError::unavailable(Self::NAME, e.to_string()))?;

        info!("Database cache connection established");

        let cache = Self::new(conn, config, namespace);
        cache.ensure_schema().await?;
        Ok(cache)
    }

    /// Whether the driver is compiled in.
    pub fn is_available() -> bool {
        cfg!(feature = "database")
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Cache table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Create the cache table and its `expires` index if missing.
    pub async fn ensure_schema(&self) -> CacheResult<()> {
        let backend = self.conn.get_database_backend();
        let index_name = format!("idx_{}_{}", self.table, EXPIRES);

        let mut table = Table::create();
        table
            .table(self.table())
            .if_not_exists()
            .col(
                ColumnDef::new(Alias::new(KEY))
                    .string_len(Self::MAX_KEY_LENGTH as u32)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Alias::new(VALUE)).text().not_null())
            .col(ColumnDef::new(Alias::new(EXPIRES)).big_integer().null())
            .col(ColumnDef::new(Alias::new(UPDATED)).big_integer().not_null());

        // MySQL has no CREATE INDEX IF NOT EXISTS; declare it inline there
        if backend == DbBackend::MySql {
            table.index(
                &mut Index::create()
                    .name(&index_name)
                    .col(Alias::new(EXPIRES))
                    .to_owned(),
            );
        }

        self.conn.execute(backend.build(&table)).await?;

        if backend != DbBackend::MySql {
            let index = Index::create()
                .if_not_exists()
                .name(&index_name)
                .table(self.table())
                .col(Alias::new(EXPIRES))
                .to_owned();
            self.conn.execute(backend.build(&index)).await?;
        }

        debug!("Cache table '{}' ready", self.table);
        Ok(())
    }

    fn table(&self) -> Alias {
        Alias::new(self.table.as_str())
    }

    fn backend_key(&self, key: &str) -> CacheResult<String> {
        let full = self.namespace.key(key);
        if full.chars().count() > Self::MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "key exceeds {} characters: {}",
                Self::MAX_KEY_LENGTH,
                full
            )));
        }
        Ok(full)
    }

    /// Backend keys starting with `namespace + prefix`. `LIKE` may be
    /// case-insensitive, so callers filter the result exactly.
    async fn keys_like(&self, prefix: &str, live_only: bool) -> CacheResult<Vec<String>> {
        let pattern = format!("{}%", escape_like(&self.namespace.key(prefix)));

        let mut select = Query::select();
        select
            .column(Alias::new(KEY))
            .from(self.table())
            .and_where(Expr::col(Alias::new(KEY)).like(LikeExpr::new(pattern).escape('\\')));
        if live_only {
            select.cond_where(live(now()));
        }

        let backend = self.conn.get_database_backend();
        let rows = self.conn.query_all(backend.build(&select)).await?;
        rows.iter()
            .map(|row| row.try_get::<String>("", KEY).map_err(CacheError::from))
            .collect()
    }
}

/// Rows that have not expired at `now`.
fn live(now: i64) -> Cond {
    Cond::any()
        .add(Expr::col(Alias::new(EXPIRES)).is_null())
        .add(Expr::col(Alias::new(EXPIRES)).gt(now))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Escape `LIKE` wildcards with `\`.
fn escape_like(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheStore for DatabaseCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let key = self.backend_key(key)?;

        let select = Query::select()
            .column(Alias::new(VALUE))
            .from(self.table())
            .and_where(Expr::col(Alias::new(KEY)).eq(key))
            .cond_where(live(now()))
            .to_owned();

        let backend = self.conn.get_database_backend();
        let Some(row) = self.conn.query_one(backend.build(&select)).await? else {
            return Ok(None);
        };

        let payload: String = row.try_get("", VALUE)?;
        codec::decode(&payload).map(Some)
    }

    async fn set(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        let key = self.backend_key(key)?;
        let payload = codec::encode(value)?;
        let now = now();
        let expires: Option<i64> = crate::ttl::expiry_seconds(ttl)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| now.checked_add(secs));

        let insert = Query::insert()
            .into_table(self.table())
            .columns([
                Alias::new(KEY),
                Alias::new(VALUE),
                Alias::new(EXPIRES),
                Alias::new(UPDATED),
            ])
            .values([
                SimpleExpr::from(key),
                payload.into(),
                expires.into(),
                now.into(),
            ])
            .map_err(|e| CacheError::Other(e.to_string()))?
            .on_conflict(
                OnConflict::column(Alias::new(KEY))
                    .update_columns([Alias::new(VALUE), Alias::new(EXPIRES), Alias::new(UPDATED)])
                    .to_owned(),
            )
            .to_owned();

        let backend = self.conn.get_database_backend();
        self.conn.execute(backend.build(&insert)).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let key = self.backend_key(key)?;

        let delete = Query::delete()
            .from_table(self.table())
            .and_where(Expr::col(Alias::new(KEY)).eq(key))
            .to_owned();

        let backend = self.conn.get_database_backend();
        self.conn.execute(backend.build(&delete)).await?;
        Ok(true)
    }

    async fn clear(&self, outdated_only: bool) -> CacheResult<bool> {
        let backend = self.conn.get_database_backend();

        if outdated_only {
            let delete = Query::delete()
                .from_table(self.table())
                .and_where(Expr::col(Alias::new(EXPIRES)).is_not_null())
                .and_where(Expr::col(Alias::new(EXPIRES)).lte(now()))
                .to_owned();

            let result = self.conn.execute(backend.build(&delete)).await?;
            debug!("Swept {} expired cache row(s)", result.rows_affected());
            return Ok(true);
        }

        let keys: Vec<String> = self
            .keys_like("", false)
            .await?
            .into_iter()
            .filter(|full| self.namespace.strip(full).is_some())
            .collect();

        for batch in keys.chunks(DELETE_BATCH) {
            let delete = Query::delete()
                .from_table(self.table())
                .and_where(Expr::col(Alias::new(KEY)).is_in(batch.iter().cloned()))
                .to_owned();
            self.conn.execute(backend.build(&delete)).await?;
        }

        Ok(true)
    }

    async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
        let keys = self.keys_like(prefix.unwrap_or(""), true).await?;
        Ok(self.namespace.filter_keys(keys, prefix))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use super::*;

    async fn cache() -> DatabaseCache {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let conn = sea_orm::Database::connect(options).await.unwrap();

        let cache = DatabaseCache::new(conn, DatabaseCacheConfig::default(), Namespace::default());
        cache.ensure_schema().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let cache = cache().await;
        cache.ensure_schema().await.unwrap();
        assert_eq!(cache.table_name(), "cache");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_value_and_expiry() {
        let cache = cache().await;
        cache
            .set("k", &CacheValue::Int(1), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        cache.set("k", &CacheValue::Int(2), None).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(CacheValue::Int(2)));

        let row = cache
            .connection()
            .query_one(sea_orm::Statement::from_string(
                DbBackend::Sqlite,
                "SELECT expires FROM cache WHERE k = 'localhost:k'",
            ))
            .await
            .unwrap()
            .unwrap();
        let expires: Option<i64> = row.try_get("", EXPIRES).unwrap();
        assert_eq!(expires, None);
    }

    #[tokio::test]
    async fn test_ttl_beyond_timestamp_range_never_expires() {
        let cache = cache().await;
        cache
            .set("k", &CacheValue::Int(7), Some(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(CacheValue::Int(7)));

        let row = cache
            .connection()
            .query_one(sea_orm::Statement::from_string(
                DbBackend::Sqlite,
                "SELECT expires FROM cache WHERE k = 'localhost:k'",
            ))
            .await
            .unwrap()
            .unwrap();
        let expires: Option<i64> = row.try_get("", EXPIRES).unwrap();
        assert_eq!(expires, None);
    }

    #[tokio::test]
    async fn test_expired_rows_are_hidden_and_swept() {
        let cache = cache().await;
        cache
            .connection()
            .execute_unprepared(
                "INSERT INTO cache (k, v, expires, updated) \
                 VALUES ('localhost:old', '{\"t\":\"null\"}', 1, 1)",
            )
            .await
            .unwrap();
        cache.set("fresh", &CacheValue::from("x"), None).await.unwrap();

        assert_eq!(cache.get("old").await.unwrap(), None);
        assert_eq!(cache.get_all_keys(None).await.unwrap(), vec!["fresh"]);

        assert!(cache.clear(true).await.unwrap());
        let rows = cache
            .connection()
            .query_all(sea_orm::Statement::from_string(
                DbBackend::Sqlite,
                "SELECT k FROM cache",
            ))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_prefix_is_matched_exactly() {
        let cache = cache().await;
        cache.set("Test_a", &CacheValue::Null, None).await.unwrap();
        cache.set("test_b", &CacheValue::Null, None).await.unwrap();
        cache.set("testXc", &CacheValue::Null, None).await.unwrap();

        assert_eq!(cache.get_all_keys(Some("test_")).await.unwrap(), vec!["test_b"]);
    }

    #[tokio::test]
    async fn test_clear_keeps_other_namespaces() {
        let cache = cache().await;
        let other = DatabaseCache::new(
            cache.connection().clone(),
            DatabaseCacheConfig::default(),
            Namespace::new("otherhost"),
        );

        cache.set("a", &CacheValue::Int(1), None).await.unwrap();
        other.set("a", &CacheValue::Int(2), None).await.unwrap();

        assert!(cache.clear(false).await.unwrap());
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(other.get("a").await.unwrap(), Some(CacheValue::Int(2)));
    }

    #[tokio::test]
    async fn test_long_key_is_rejected() {
        let cache = cache().await;
        let key = "x".repeat(300);
        let err = cache.set(&key, &CacheValue::Null, None).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c\\"), "a\\_b\\%c\\\\");
    }
}
