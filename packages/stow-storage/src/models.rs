use time::OffsetDateTime;
use uuid::Uuid;

/// Candidate row as the scoring pipeline consumes it, `location_path`
/// rendered root-first by the fetch query.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ItemRow {
	pub item_id: Uuid,
	pub scope_key: String,
	pub name: String,
	pub description: String,
	pub keywords: Vec<String>,
	pub quantity: i32,
	pub image_ref: Option<String>,
	pub location_id: Option<Uuid>,
	pub location_path: String,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CacheRow {
	pub cache_key: String,
	pub scope_key: String,
	pub payload: serde_json::Value,
	pub fresh_until: OffsetDateTime,
	pub stale_until: OffsetDateTime,
}
