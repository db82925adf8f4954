use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{ServiceError, ServiceResult, StowService};
use stow_config::SearchIndex;
use stow_domain::{
	prune,
	query::{self, ExpandedQuery},
	scope::SearchScope,
	score::{self, ScoredCandidate, ScoringText, SearchMode, Signals},
};
use stow_providers::hash;
use stow_storage::{cache::CacheWrite, items::Selection, models::ItemRow};

/// Bumped whenever the cached response shape changes, so old rows decode as
/// misses instead of garbage.
pub(crate) const PAYLOAD_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	pub scope: String,
	pub query: String,
	#[serde(default)]
	pub mode: Option<String>,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub offset: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
	pub item_id: Uuid,
	pub name: String,
	pub image_ref: Option<String>,
	pub quantity: i32,
	pub location_path: String,
	pub lexical_score: f32,
	pub semantic_score: f32,
	pub fused_score: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
	/// Post-prune candidate count, not the page size.
	pub total: u32,
	pub results: Vec<SearchHit>,
}

/// A validated request. Everything downstream of [`StowService::search`]
/// works on this, never on raw caller input.
struct SearchPlan {
	scope_key: String,
	query: String,
	expanded: ExpandedQuery,
	mode: SearchMode,
	limit: u32,
	offset: u32,
}

#[derive(Clone, Copy)]
enum CacheWindow {
	Fresh,
	Stale,
}
impl CacheWindow {
	fn as_str(&self) -> &'static str {
		match self {
			Self::Fresh => "fresh",
			Self::Stale => "stale",
		}
	}
}

impl StowService {
	/// Ranked, paginated search over one scope.
	///
	/// With the external index selected the path is: fresh cache, live
	/// computation, stale cache, local fallback. The local provider skips
	/// the cache entirely. Only the fallback failing surfaces an error.
	pub async fn search(&self, req: SearchRequest) -> ServiceResult<SearchResponse> {
		let plan = self.plan(&req)?;

		if plan.query.is_empty() {
			return Ok(SearchResponse { total: 0, results: Vec::new() });
		}
		if self.cfg.search.index.provider == "local" {
			return self.compute_local(&plan).await;
		}

		let now = OffsetDateTime::now_utc();
		let cache_key = self.cache_key_for(&plan);

		if let Some(key) = cache_key.as_deref() {
			if let Some(response) = self.read_cached(key, now, CacheWindow::Fresh).await {
				return Ok(response);
			}
		}

		match self.compute_live(&plan).await {
			Ok(response) => {
				if let Some(key) = cache_key.as_deref() {
					self.store_response(key, &plan, &response, now).await;
				}

				Ok(response)
			},
			Err(err) => {
				warn!(error = %err, scope_key = %plan.scope_key, "Live search failed.");

				if let Some(key) = cache_key.as_deref() {
					if let Some(response) = self.read_cached(key, now, CacheWindow::Stale).await {
						return Ok(response);
					}
				}

				warn!(scope_key = %plan.scope_key, "Falling back to local scoring.");

				self.compute_local(&plan).await
			},
		}
	}

	fn plan(&self, req: &SearchRequest) -> ServiceResult<SearchPlan> {
		let scope = req
			.scope
			.parse::<SearchScope>()
			.map_err(|err| ServiceError::InvalidRequest { message: err.to_string() })?;
		let mode = SearchMode::parse(req.mode.as_deref())
			.map_err(|err| ServiceError::InvalidRequest { message: err.to_string() })?;
		let limits = &self.cfg.search.limits;
		let limit = req.limit.unwrap_or(limits.default_limit).clamp(1, limits.max_limit);
		let offset = req.offset.unwrap_or(0).min(limits.max_offset);
		let query = query::normalize_query(&req.query);
		let expanded = query::expand(&query, &self.rules);

		Ok(SearchPlan { scope_key: scope.key(), query, expanded, mode, limit, offset })
	}

	async fn compute_live(&self, plan: &SearchPlan) -> ServiceResult<SearchResponse> {
		let Some(index) = self.providers.index.as_ref() else {
			return Err(ServiceError::Index {
				message: "Vector index is not configured.".to_string(),
			});
		};
		let vector = self.providers.embedding.embed(&plan.query).await?;
		let expected = self.providers.embedding.dimensions() as usize;

		if vector.len() != expected {
			return Err(ServiceError::Provider {
				message: format!(
					"Embedding dimension mismatch: expected {expected}, got {}.",
					vector.len()
				),
			});
		}

		let top_k = index_top_k(plan.limit, plan.offset, &self.cfg.search.index);
		let timeout = Duration::from_millis(self.cfg.search.index.timeout_ms);
		let hits =
			match tokio::time::timeout(timeout, index.query(vector, top_k, &plan.scope_key)).await
			{
				Ok(Ok(hits)) => hits,
				Ok(Err(err)) => return Err(ServiceError::Index { message: err.to_string() }),
				Err(_) => {
					return Err(ServiceError::Index {
						message: format!(
							"Vector index query timed out after {}ms.",
							self.cfg.search.index.timeout_ms
						),
					});
				},
			};
		let scores = hits.iter().map(|hit| (hit.item_id, hit.score)).collect::<HashMap<_, _>>();
		let ids = hits.iter().map(|hit| hit.item_id).collect();
		let rows = self
			.providers
			.catalog
			.fetch(&plan.scope_key, &Selection::Ids(ids))
			.await
			.map_err(|err| ServiceError::Storage { message: err.to_string() })?;

		Ok(self.rank(plan, rows, |row| scores.get(&row.item_id).copied().unwrap_or_default()))
	}

	/// Full scope scan scored entirely in process. Both the query and the
	/// item side go through the deterministic embedder, so the semantic
	/// signal stays meaningful without any external call.
	async fn compute_local(&self, plan: &SearchPlan) -> ServiceResult<SearchResponse> {
		let rows = self
			.providers
			.catalog
			.fetch(&plan.scope_key, &Selection::All)
			.await
			.map_err(|err| ServiceError::Storage { message: err.to_string() })?;
		let query_vector = self.local_embedder.embed(&plan.query);

		Ok(self.rank(plan, rows, |row| {
			let item_vector = self.local_embedder.embed(&crate::item_embedding_text(
				&row.name,
				&row.description,
				&row.keywords,
			));

			hash::cosine(&query_vector, &item_vector)
		}))
	}

	fn rank<F>(&self, plan: &SearchPlan, rows: Vec<ItemRow>, semantic: F) -> SearchResponse
	where
		F: Fn(&ItemRow) -> f32,
	{
		let ranking = &self.cfg.ranking;
		let mut candidates = Vec::with_capacity(rows.len());

		for row in rows {
			let text = ScoringText::new(&row.name, &row.description, &row.keywords);
			let signals = Signals {
				lexical: score::lexical_score(&text, &plan.query, &ranking.lexical),
				semantic: semantic(&row),
				overlap: score::token_overlap(&text, &plan.expanded.expanded),
			};

			if !score::passes_inclusion(plan.mode, signals, ranking.semantic_floor) {
				continue;
			}

			candidates.push(ScoredCandidate {
				item_id: row.item_id,
				name: row.name,
				image_ref: row.image_ref,
				quantity: row.quantity,
				location_path: row.location_path,
				signals,
				fused_score: score::fuse(plan.mode, signals, &ranking.fusion),
			});
		}

		score::sort_candidates(&mut candidates);

		let candidates = prune::prune_semantic_tail(plan.mode, candidates, &ranking.prune);
		let total = candidates.len() as u32;
		let results = candidates
			.into_iter()
			.skip(plan.offset as usize)
			.take(plan.limit as usize)
			.map(|candidate| SearchHit {
				item_id: candidate.item_id,
				name: candidate.name,
				image_ref: candidate.image_ref,
				quantity: candidate.quantity,
				location_path: candidate.location_path,
				lexical_score: candidate.signals.lexical,
				semantic_score: candidate.signals.semantic,
				fused_score: candidate.fused_score,
			})
			.collect();

		SearchResponse { total, results }
	}

	fn cache_key_for(&self, plan: &SearchPlan) -> Option<String> {
		let cache = &self.cfg.search.cache;

		if !cache.enabled || plan.query.chars().count() > cache.max_query_chars {
			return None;
		}

		let payload = serde_json::json!({
			"schema_version": PAYLOAD_SCHEMA_VERSION,
			"scope_key": plan.scope_key,
			"query": plan.query,
			"mode": plan.mode.as_str(),
			"limit": plan.limit,
			"offset": plan.offset,
		});

		match hash_cache_key(&payload) {
			Ok(key) => Some(key),
			Err(err) => {
				warn!(error = %err, "Cache key build failed; skipping the cache.");

				None
			},
		}
	}

	async fn read_cached(
		&self,
		cache_key: &str,
		now: OffsetDateTime,
		window: CacheWindow,
	) -> Option<SearchResponse> {
		let read = match window {
			CacheWindow::Fresh => self.providers.cache.read_fresh(cache_key, now).await,
			CacheWindow::Stale => self.providers.cache.read_stale(cache_key, now).await,
		};
		let payload = match read {
			Ok(Some(payload)) => payload,
			Ok(None) => {
				tracing::info!(
					window = window.as_str(),
					cache_key_prefix = cache_key_prefix(cache_key),
					hit = false,
					"Cache miss."
				);

				return None;
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					window = window.as_str(),
					cache_key_prefix = cache_key_prefix(cache_key),
					"Cache read failed."
				);

				return None;
			},
		};

		tracing::info!(
			window = window.as_str(),
			cache_key_prefix = cache_key_prefix(cache_key),
			hit = true,
			payload_size = payload.to_string().len(),
			"Cache hit."
		);

		match serde_json::from_value::<SearchResponse>(payload) {
			Ok(response) => Some(response),
			Err(err) => {
				tracing::warn!(
					error = %err,
					window = window.as_str(),
					cache_key_prefix = cache_key_prefix(cache_key),
					"Cache payload decode failed."
				);

				None
			},
		}
	}

	async fn store_response(
		&self,
		cache_key: &str,
		plan: &SearchPlan,
		response: &SearchResponse,
		now: OffsetDateTime,
	) {
		let payload = match serde_json::to_value(response) {
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key_prefix = cache_key_prefix(cache_key),
					"Cache payload encode failed."
				);

				return;
			},
		};
		let payload_size = payload.to_string().len();
		let cache = &self.cfg.search.cache;
		let entry = CacheWrite {
			cache_key: cache_key.to_string(),
			scope_key: plan.scope_key.clone(),
			payload,
			fresh_until: now + time::Duration::seconds(cache.fresh_seconds),
			stale_until: now + time::Duration::seconds(cache.stale_seconds),
		};

		match self.providers.cache.write(&entry, now).await {
			Ok(()) => {
				tracing::info!(
					cache_key_prefix = cache_key_prefix(cache_key),
					payload_size,
					fresh_seconds = cache.fresh_seconds,
					stale_seconds = cache.stale_seconds,
					"Cache stored."
				);
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key_prefix = cache_key_prefix(cache_key),
					"Cache store failed."
				);
			},
		}
	}
}

/// Index page size: enough headroom above the requested page for the
/// inclusion filters and pruning to thin out, bounded on both ends.
fn index_top_k(limit: u32, offset: u32, cfg: &SearchIndex) -> u32 {
	limit
		.saturating_add(offset)
		.saturating_add(cfg.top_k_margin)
		.clamp(cfg.top_k_floor, cfg.top_k_cap)
}

fn hash_cache_key(payload: &serde_json::Value) -> ServiceResult<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| ServiceError::Storage {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn top_k_keeps_headroom_above_the_requested_page() {
		let cfg = SearchIndex::default();

		assert_eq!(index_top_k(10, 0, &cfg), 64);
		assert_eq!(index_top_k(100, 100, &cfg), 250);
		assert_eq!(index_top_k(100, 10_000, &cfg), 512);
	}

	#[test]
	fn cache_keys_are_stable_and_separate_distinct_requests() {
		let base = serde_json::json!({
			"schema_version": PAYLOAD_SCHEMA_VERSION,
			"scope_key": "household:3f0c",
			"query": "air pump",
			"mode": "hybrid",
			"limit": 20,
			"offset": 0,
		});
		let same = serde_json::json!({
			"schema_version": PAYLOAD_SCHEMA_VERSION,
			"scope_key": "household:3f0c",
			"query": "air pump",
			"mode": "hybrid",
			"limit": 20,
			"offset": 0,
		});
		let next_page = serde_json::json!({
			"schema_version": PAYLOAD_SCHEMA_VERSION,
			"scope_key": "household:3f0c",
			"query": "air pump",
			"mode": "hybrid",
			"limit": 20,
			"offset": 20,
		});

		let base = hash_cache_key(&base).expect("Expected cache key.");
		let same = hash_cache_key(&same).expect("Expected cache key.");
		let next_page = hash_cache_key(&next_page).expect("Expected cache key.");

		assert_eq!(base, same);
		assert_ne!(base, next_page);
	}

	#[test]
	fn cache_key_prefixes_never_slice_out_of_bounds() {
		assert_eq!(cache_key_prefix("abc"), "abc");
		assert_eq!(cache_key_prefix("0123456789abcdef"), "0123456789ab");
	}
}
