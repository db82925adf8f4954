/// Applied statement by statement inside one transaction; see
/// [`Db::ensure_schema`](crate::db::Db::ensure_schema). Statements must stay
/// free of embedded semicolons.
pub const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS locations (
	location_id uuid PRIMARY KEY,
	scope_key   text NOT NULL,
	parent_id   uuid REFERENCES locations (location_id) ON DELETE SET NULL,
	name        text NOT NULL,
	created_at  timestamptz NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_locations_scope ON locations (scope_key);

CREATE TABLE IF NOT EXISTS items (
	item_id     uuid PRIMARY KEY,
	scope_key   text NOT NULL,
	name        text NOT NULL,
	description text NOT NULL DEFAULT '',
	keywords    text[] NOT NULL DEFAULT '{}',
	quantity    integer NOT NULL DEFAULT 1,
	image_ref   text,
	location_id uuid REFERENCES locations (location_id) ON DELETE SET NULL,
	created_at  timestamptz NOT NULL DEFAULT now(),
	updated_at  timestamptz NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_items_scope ON items (scope_key);

CREATE TABLE IF NOT EXISTS search_cache (
	cache_key   text PRIMARY KEY,
	scope_key   text NOT NULL,
	payload     jsonb NOT NULL,
	fresh_until timestamptz NOT NULL,
	stale_until timestamptz NOT NULL,
	created_at  timestamptz NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_search_cache_scope ON search_cache (scope_key);

CREATE INDEX IF NOT EXISTS idx_search_cache_stale ON search_cache (stale_until);
";
