use sqlx::PgPool;
use time::OffsetDateTime;

use crate::Result;

/// One pending cache write. Keeping `fresh_until <= stale_until` is the
/// caller's responsibility; both are absolute timestamps.
#[derive(Clone, Debug)]
pub struct CacheWrite {
	pub cache_key: String,
	pub scope_key: String,
	pub payload: serde_json::Value,
	pub fresh_until: OffsetDateTime,
	pub stale_until: OffsetDateTime,
}

pub struct PgResponseCache {
	pool: PgPool,
}
impl PgResponseCache {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn read_fresh(
		&self,
		cache_key: &str,
		now: OffsetDateTime,
	) -> Result<Option<serde_json::Value>> {
		let payload: Option<serde_json::Value> = sqlx::query_scalar(
			"SELECT payload FROM search_cache WHERE cache_key = $1 AND fresh_until > $2",
		)
		.bind(cache_key)
		.bind(now)
		.fetch_optional(&self.pool)
		.await?;

		Ok(payload)
	}

	/// Fresh entries satisfy stale reads too; the orchestrator only reaches
	/// for this after the live path has failed.
	pub async fn read_stale(
		&self,
		cache_key: &str,
		now: OffsetDateTime,
	) -> Result<Option<serde_json::Value>> {
		let payload: Option<serde_json::Value> = sqlx::query_scalar(
			"SELECT payload FROM search_cache WHERE cache_key = $1 AND stale_until > $2",
		)
		.bind(cache_key)
		.bind(now)
		.fetch_optional(&self.pool)
		.await?;

		Ok(payload)
	}

	/// Writes pay for expired-row cleanup, so no background sweeper is
	/// needed.
	pub async fn write(&self, entry: &CacheWrite, now: OffsetDateTime) -> Result<()> {
		sqlx::query("DELETE FROM search_cache WHERE stale_until <= $1")
			.bind(now)
			.execute(&self.pool)
			.await?;
		sqlx::query(
			"\
INSERT INTO search_cache (cache_key, scope_key, payload, fresh_until, stale_until, created_at)
VALUES ($1,$2,$3,$4,$5,$6)
ON CONFLICT (cache_key) DO UPDATE SET
	scope_key = EXCLUDED.scope_key,
	payload = EXCLUDED.payload,
	fresh_until = EXCLUDED.fresh_until,
	stale_until = EXCLUDED.stale_until,
	created_at = EXCLUDED.created_at",
		)
		.bind(&entry.cache_key)
		.bind(&entry.scope_key)
		.bind(&entry.payload)
		.bind(entry.fresh_until)
		.bind(entry.stale_until)
		.bind(now)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	pub async fn invalidate_scope(&self, scope_key: &str) -> Result<u64> {
		let result = sqlx::query("DELETE FROM search_cache WHERE scope_key = $1")
			.bind(scope_key)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}
}
