use sqlx::PgPool;
use uuid::Uuid;

use crate::{Result, models::ItemRow};

/// Which rows a candidate fetch hydrates: the whole scope for local scoring,
/// or the ids an external index returned.
#[derive(Clone, Debug)]
pub enum Selection {
	All,
	Ids(Vec<Uuid>),
}

pub struct PgCatalog {
	pool: PgPool,
}
impl PgCatalog {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Rows come back with `location_path` rendered root-first, segments
	/// joined by " / ". Items without a location get an empty path. The
	/// recursion is anchored at the scope's roots and depth-capped at 32, so
	/// a corrupt parent chain cannot loop.
	pub async fn fetch(&self, scope_key: &str, selection: &Selection) -> Result<Vec<ItemRow>> {
		match selection {
			Selection::All => {
				let rows = sqlx::query_as::<_, ItemRow>(
					"\
WITH RECURSIVE location_paths AS (
	SELECT location_id, name AS path, 1 AS depth
	FROM locations
	WHERE scope_key = $1 AND parent_id IS NULL
	UNION ALL
	SELECT l.location_id, lp.path || ' / ' || l.name, lp.depth + 1
	FROM locations l
	JOIN location_paths lp ON l.parent_id = lp.location_id
	WHERE l.scope_key = $1 AND lp.depth < 32
)
SELECT
	i.item_id,
	i.scope_key,
	i.name,
	i.description,
	i.keywords,
	i.quantity,
	i.image_ref,
	i.location_id,
	COALESCE(lp.path, '') AS location_path,
	i.updated_at
FROM items i
LEFT JOIN location_paths lp ON lp.location_id = i.location_id
WHERE i.scope_key = $1
ORDER BY i.item_id",
				)
				.bind(scope_key)
				.fetch_all(&self.pool)
				.await?;

				Ok(rows)
			},
			Selection::Ids(ids) if ids.is_empty() => Ok(Vec::new()),
			Selection::Ids(ids) => {
				let rows = sqlx::query_as::<_, ItemRow>(
					"\
WITH RECURSIVE location_paths AS (
	SELECT location_id, name AS path, 1 AS depth
	FROM locations
	WHERE scope_key = $1 AND parent_id IS NULL
	UNION ALL
	SELECT l.location_id, lp.path || ' / ' || l.name, lp.depth + 1
	FROM locations l
	JOIN location_paths lp ON l.parent_id = lp.location_id
	WHERE l.scope_key = $1 AND lp.depth < 32
)
SELECT
	i.item_id,
	i.scope_key,
	i.name,
	i.description,
	i.keywords,
	i.quantity,
	i.image_ref,
	i.location_id,
	COALESCE(lp.path, '') AS location_path,
	i.updated_at
FROM items i
LEFT JOIN location_paths lp ON lp.location_id = i.location_id
WHERE i.scope_key = $1 AND i.item_id = ANY($2)
ORDER BY i.item_id",
				)
				.bind(scope_key)
				.bind(ids.as_slice())
				.fetch_all(&self.pool)
				.await?;

				Ok(rows)
			},
		}
	}
}
