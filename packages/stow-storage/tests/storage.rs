use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use stow_storage::{
	cache::{CacheWrite, PgResponseCache},
	db::Db,
	items::{PgCatalog, Selection},
	models::ItemRow,
	qdrant::{IndexRecord, QdrantIndex},
};
use stow_testkit::{TestCollection, TestDatabase, scope_key};

async fn seed_location(
	pool: &sqlx::PgPool,
	scope_key: &str,
	parent_id: Option<Uuid>,
	name: &str,
) -> Uuid {
	let location_id = Uuid::new_v4();

	sqlx::query(
		"INSERT INTO locations (location_id, scope_key, parent_id, name) VALUES ($1,$2,$3,$4)",
	)
	.bind(location_id)
	.bind(scope_key)
	.bind(parent_id)
	.bind(name)
	.execute(pool)
	.await
	.expect("Failed to seed location.");

	location_id
}

async fn seed_item(
	pool: &sqlx::PgPool,
	scope_key: &str,
	name: &str,
	keywords: &[&str],
	location_id: Option<Uuid>,
) -> Uuid {
	let item_id = Uuid::new_v4();
	let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();

	sqlx::query(
		"\
INSERT INTO items (item_id, scope_key, name, description, keywords, quantity, location_id)
VALUES ($1,$2,$3,$4,$5,1,$6)",
	)
	.bind(item_id)
	.bind(scope_key)
	.bind(name)
	.bind(format!("{name} in storage"))
	.bind(&keywords)
	.bind(location_id)
	.execute(pool)
	.await
	.expect("Failed to seed item.");

	item_id
}

fn cache_entry(
	cache_key: &str,
	scope_key: &str,
	now: OffsetDateTime,
	fresh_offset: Duration,
	stale_offset: Duration,
) -> CacheWrite {
	CacheWrite {
		cache_key: cache_key.to_string(),
		scope_key: scope_key.to_string(),
		payload: serde_json::json!({ "total": 1, "results": [] }),
		fresh_until: now + fresh_offset,
		stale_until: now + stale_offset,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set STOW_PG_DSN to run."]
async fn schema_bootstrap_creates_search_tables() {
	let Some(base_dsn) = stow_testkit::env_dsn() else {
		eprintln!("Skipping storage tests; set STOW_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db =
		Db::connect(&test_db.postgres_config(1)).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");
	// Re-running the bootstrap must be a no-op.
	db.ensure_schema().await.expect("Failed to re-run schema bootstrap.");

	for table in ["locations", "items", "search_cache"] {
		let count: i64 = sqlx::query_scalar(
			"SELECT count(*) FROM information_schema.tables WHERE table_name = $1",
		)
		.bind(table)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to query schema tables.");

		assert_eq!(count, 1, "missing table {table}");
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set STOW_PG_DSN to run."]
async fn catalog_renders_location_paths_and_isolates_scopes() {
	let Some(base_dsn) = stow_testkit::env_dsn() else {
		eprintln!("Skipping storage tests; set STOW_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db =
		Db::connect(&test_db.postgres_config(1)).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let scope_a = scope_key("household");
	let scope_b = scope_key("owner");
	let garage = seed_location(&db.pool, &scope_a, None, "Garage").await;
	let shelf = seed_location(&db.pool, &scope_a, Some(garage), "Shelf B").await;
	let living_room = seed_location(&db.pool, &scope_b, None, "Living Room").await;
	let compressor = seed_item(
		&db.pool,
		&scope_a,
		"Pneumatic Tank Compressor",
		&["compressor", "air"],
		Some(shelf),
	)
	.await;
	let shovel = seed_item(&db.pool, &scope_a, "Snow Shovel", &["winter"], None).await;
	let couch = seed_item(&db.pool, &scope_b, "Couch", &["sofa"], Some(living_room)).await;

	let rows = PgCatalog::new(db.pool.clone())
		.fetch(&scope_a, &Selection::All)
		.await
		.expect("Failed to fetch scope candidates.");

	assert_eq!(rows.len(), 2);

	let by_id = |id: Uuid| -> &ItemRow {
		rows.iter().find(|row| row.item_id == id).expect("Expected seeded item.")
	};

	assert_eq!(by_id(compressor).location_path, "Garage / Shelf B");
	assert_eq!(by_id(shovel).location_path, "");
	assert_eq!(by_id(compressor).keywords, vec!["compressor".to_string(), "air".to_string()]);

	let hydrated = PgCatalog::new(db.pool.clone())
		.fetch(&scope_a, &Selection::Ids(vec![compressor]))
		.await
		.expect("Failed to hydrate ids.");

	assert_eq!(hydrated.len(), 1);
	assert_eq!(hydrated[0].item_id, compressor);

	// Ids from another scope never leak through the scope filter.
	let cross_scope = PgCatalog::new(db.pool.clone())
		.fetch(&scope_a, &Selection::Ids(vec![couch]))
		.await
		.expect("Failed to run cross-scope fetch.");

	assert!(cross_scope.is_empty());

	let empty = PgCatalog::new(db.pool.clone())
		.fetch(&scope_a, &Selection::Ids(Vec::new()))
		.await
		.expect("Failed to run empty-id fetch.");

	assert!(empty.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set STOW_PG_DSN to run."]
async fn cache_windows_sweep_and_scope_invalidation() {
	let Some(base_dsn) = stow_testkit::env_dsn() else {
		eprintln!("Skipping storage tests; set STOW_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db =
		Db::connect(&test_db.postgres_config(1)).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let cache = PgResponseCache::new(db.pool.clone());
	let now = OffsetDateTime::now_utc();
	let scope_a = scope_key("household");
	let scope_b = scope_key("owner");

	// Past its fresh window but inside its stale window.
	let degraded =
		cache_entry("key-degraded", &scope_a, now, Duration::seconds(-10), Duration::hours(1));
	// Past both windows; the next write pass must sweep it.
	let expired =
		cache_entry("key-expired", &scope_a, now, Duration::hours(-2), Duration::hours(-1));
	let fresh = cache_entry("key-fresh", &scope_b, now, Duration::minutes(5), Duration::hours(1));

	cache.write(&degraded, now).await.expect("Failed to write degraded entry.");
	cache.write(&expired, now).await.expect("Failed to write expired entry.");

	assert!(
		cache
			.read_fresh("key-degraded", now)
			.await
			.expect("Failed to read fresh.")
			.is_none()
	);
	assert_eq!(
		cache.read_stale("key-degraded", now).await.expect("Failed to read stale."),
		Some(serde_json::json!({ "total": 1, "results": [] }))
	);

	cache.write(&fresh, now).await.expect("Failed to write fresh entry.");

	assert!(cache.read_fresh("key-fresh", now).await.expect("Failed to read fresh.").is_some());

	let swept: i64 =
		sqlx::query_scalar("SELECT count(*) FROM search_cache WHERE cache_key = 'key-expired'")
			.fetch_one(&db.pool)
			.await
			.expect("Failed to count swept rows.");

	assert_eq!(swept, 0);

	let removed = cache.invalidate_scope(&scope_a).await.expect("Failed to invalidate scope.");

	assert_eq!(removed, 1);
	assert!(
		cache.read_stale("key-degraded", now).await.expect("Failed to read stale.").is_none()
	);
	assert!(cache.read_fresh("key-fresh", now).await.expect("Failed to read fresh.").is_some());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set STOW_QDRANT_URL to run."]
async fn qdrant_index_roundtrip_respects_scope_filters() {
	let Some(url) = stow_testkit::env_qdrant_url() else {
		eprintln!("Skipping Qdrant tests; set STOW_QDRANT_URL to run this test.");

		return;
	};
	let collection = TestCollection::new(&url, "roundtrip");
	let cfg = stow_config::Qdrant { url, collection: collection.name().to_string() };
	let index = QdrantIndex::new(&cfg).expect("Failed to build Qdrant client.");

	index.ensure_collection(8).await.expect("Failed to create collection.");
	// Idempotent when the collection already exists.
	index.ensure_collection(8).await.expect("Failed to re-check collection.");

	let scope_a = scope_key("household");
	let scope_b = scope_key("owner");
	let record_a = IndexRecord {
		item_id: Uuid::new_v4(),
		scope_key: scope_a.clone(),
		name: "Pneumatic Tank Compressor".to_string(),
		vector: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
	};
	let record_b = IndexRecord {
		item_id: Uuid::new_v4(),
		scope_key: scope_b.clone(),
		name: "Couch".to_string(),
		vector: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
	};

	index.upsert(&record_a).await.expect("Failed to upsert record.");
	index.upsert(&record_b).await.expect("Failed to upsert record.");

	let hits = index
		.query(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 10, &scope_a)
		.await
		.expect("Failed to query index.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].item_id, record_a.item_id);

	index.delete(record_a.item_id).await.expect("Failed to delete record.");

	let hits = index
		.query(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 10, &scope_a)
		.await
		.expect("Failed to query index after delete.");

	assert!(hits.is_empty());

	collection.cleanup().await.expect("Failed to delete test collection.");
}
