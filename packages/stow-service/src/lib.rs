pub mod admin;
pub mod hooks;
pub mod search;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

pub use admin::RebuildReport;
pub use hooks::ItemRecord;
pub use search::{SearchHit, SearchRequest, SearchResponse};
use stow_config::Config;
use stow_domain::query::ExpansionRules;
use stow_providers::{hash::HashEmbedder, remote::RemoteEmbedder};
use stow_storage::{
	cache::{CacheWrite, PgResponseCache},
	db::Db,
	items::{PgCatalog, Selection},
	models::ItemRow,
	qdrant::{IndexHit, IndexRecord, QdrantIndex},
};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;

	fn dimensions(&self) -> u32;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(&'a self, record: &'a IndexRecord) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn delete<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn query<'a>(
		&'a self,
		vector: Vec<f32>,
		top_k: u32,
		scope_key: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<IndexHit>>>;
}

pub trait ItemCatalog
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		scope_key: &'a str,
		selection: &'a Selection,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ItemRow>>>;
}

pub trait ResponseCache
where
	Self: Send + Sync,
{
	fn read_fresh<'a>(
		&'a self,
		cache_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<Option<Value>>>;

	fn read_stale<'a>(
		&'a self,
		cache_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<Option<Value>>>;

	fn write<'a>(
		&'a self,
		entry: &'a CacheWrite,
		now: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn invalidate_scope<'a>(
		&'a self,
		scope_key: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<u64>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	Provider { message: String },
	Storage { message: String },
	Index { message: String },
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub catalog: Arc<dyn ItemCatalog>,
	pub cache: Arc<dyn ResponseCache>,
	pub index: Option<Arc<dyn VectorIndex>>,
}

pub struct StowService {
	pub cfg: Config,
	pub providers: Providers,
	pub(crate) rules: ExpansionRules,
	pub(crate) local_embedder: HashEmbedder,
}

struct HashEmbedding {
	embedder: HashEmbedder,
}

struct RemoteEmbedding {
	embedder: RemoteEmbedder,
}

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
			Self::Index { message } => write!(f, "Vector index error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		let vector = self.embedder.embed(text);

		Box::pin(async move { Ok(vector) })
	}

	fn dimensions(&self) -> u32 {
		self.embedder.dimensions()
	}
}

impl EmbeddingProvider for RemoteEmbedding {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move {
			let texts = [text.to_string()];
			let mut vectors = self.embedder.embed(&texts).await?;

			vectors
				.pop()
				.ok_or_else(|| color_eyre::eyre::eyre!("Embedding response was empty."))
		})
	}

	fn dimensions(&self) -> u32 {
		self.embedder.dimensions()
	}
}

impl VectorIndex for QdrantIndex {
	fn upsert<'a>(&'a self, record: &'a IndexRecord) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move { Ok(QdrantIndex::upsert(self, record).await?) })
	}

	fn delete<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move { Ok(QdrantIndex::delete(self, item_id).await?) })
	}

	fn query<'a>(
		&'a self,
		vector: Vec<f32>,
		top_k: u32,
		scope_key: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<IndexHit>>> {
		Box::pin(async move { Ok(QdrantIndex::query(self, vector, top_k, scope_key).await?) })
	}
}

impl ItemCatalog for PgCatalog {
	fn fetch<'a>(
		&'a self,
		scope_key: &'a str,
		selection: &'a Selection,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ItemRow>>> {
		Box::pin(async move { Ok(PgCatalog::fetch(self, scope_key, selection).await?) })
	}
}

impl ResponseCache for PgResponseCache {
	fn read_fresh<'a>(
		&'a self,
		cache_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<Option<Value>>> {
		Box::pin(async move { Ok(PgResponseCache::read_fresh(self, cache_key, now).await?) })
	}

	fn read_stale<'a>(
		&'a self,
		cache_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<Option<Value>>> {
		Box::pin(async move { Ok(PgResponseCache::read_stale(self, cache_key, now).await?) })
	}

	fn write<'a>(
		&'a self,
		entry: &'a CacheWrite,
		now: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move { Ok(PgResponseCache::write(self, entry, now).await?) })
	}

	fn invalidate_scope<'a>(
		&'a self,
		scope_key: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<u64>> {
		Box::pin(async move { Ok(PgResponseCache::invalidate_scope(self, scope_key).await?) })
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		catalog: Arc<dyn ItemCatalog>,
		cache: Arc<dyn ResponseCache>,
		index: Option<Arc<dyn VectorIndex>>,
	) -> Self {
		Self { embedding, catalog, cache, index }
	}
}

impl StowService {
	/// Wires the default provider stack from the configuration. Provider
	/// selection happens here, once; misconfiguration is an error rather
	/// than a silent substitute.
	pub fn new(cfg: Config, db: Db, index: Option<QdrantIndex>) -> ServiceResult<Self> {
		let embedding: Arc<dyn EmbeddingProvider> =
			match cfg.providers.embedding.provider_id.as_str() {
				"hash" => {
					let rules = ExpansionRules::compile(&cfg.search.expansion);

					Arc::new(HashEmbedding { embedder: hash_embedder(&cfg, rules) })
				},
				"remote" => {
					let Some(remote_cfg) = cfg.providers.embedding.remote.as_ref() else {
						return Err(ServiceError::InvalidRequest {
							message:
								"Embedding provider \"remote\" requires the [providers.embedding.remote] table."
									.to_string(),
						});
					};
					let embedder =
						RemoteEmbedder::new(remote_cfg, cfg.providers.embedding.dimensions)
							.map_err(|err| ServiceError::InvalidRequest {
								message: err.to_string(),
							})?;

					Arc::new(RemoteEmbedding { embedder })
				},
				other => {
					return Err(ServiceError::InvalidRequest {
						message: format!("Unknown embedding provider {other:?}."),
					});
				},
			};

		if cfg.search.index.provider == "qdrant" && index.is_none() {
			return Err(ServiceError::InvalidRequest {
				message: "Index provider \"qdrant\" requires the [storage.qdrant] table."
					.to_string(),
			});
		}

		let providers = Providers::new(
			embedding,
			Arc::new(PgCatalog::new(db.pool.clone())),
			Arc::new(PgResponseCache::new(db.pool)),
			index.map(|index| Arc::new(index) as Arc<dyn VectorIndex>),
		);

		Ok(Self::with_providers(cfg, providers))
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		let rules = ExpansionRules::compile(&cfg.search.expansion);
		let local_embedder = hash_embedder(&cfg, rules.clone());

		Self { cfg, providers, rules, local_embedder }
	}
}

/// The deterministic in-process embedder. Also backs the degraded fallback
/// path regardless of which provider is active.
fn hash_embedder(cfg: &Config, rules: ExpansionRules) -> HashEmbedder {
	HashEmbedder::new(
		cfg.providers.embedding.dimensions,
		cfg.providers.embedding.hash.clone(),
		rules,
	)
}

pub(crate) fn item_embedding_text(name: &str, description: &str, keywords: &[String]) -> String {
	let mut text = String::with_capacity(name.len() + description.len() + 16);

	text.push_str(name);

	if !description.is_empty() {
		text.push(' ');
		text.push_str(description);
	}

	for keyword in keywords {
		text.push(' ');
		text.push_str(keyword);
	}

	text
}
