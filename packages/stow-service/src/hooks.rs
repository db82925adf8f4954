use tracing::warn;
use uuid::Uuid;

use crate::{ServiceError, ServiceResult, StowService, item_embedding_text};
use stow_domain::scope::SearchScope;
use stow_storage::qdrant::IndexRecord;

/// Item fields the write path carries into the vector index.
#[derive(Clone, Debug)]
pub struct ItemRecord {
	pub item_id: Uuid,
	pub name: String,
	pub description: String,
	pub keywords: Vec<String>,
}

impl StowService {
	/// Called after an item create or update commits. Drops every cached
	/// response for the scope, then re-embeds and upserts the item's
	/// vector. Neither step can fail the caller's write.
	pub async fn item_saved(&self, scope: SearchScope, item: &ItemRecord) {
		let scope_key = scope.key();

		self.invalidate_scope_cache(&scope_key).await;

		let Some(index) = self.providers.index.as_ref() else {
			return;
		};
		let text = item_embedding_text(&item.name, &item.description, &item.keywords);
		let vector = match self.providers.embedding.embed(&text).await {
			Ok(vector) => vector,
			Err(err) => {
				warn!(error = %err, item_id = %item.item_id, "Embedding failed; vector index not updated.");

				return;
			},
		};
		let record = IndexRecord {
			item_id: item.item_id,
			scope_key,
			name: item.name.clone(),
			vector,
		};

		if let Err(err) = index.upsert(&record).await {
			warn!(error = %err, item_id = %item.item_id, "Vector index upsert failed.");
		}
	}

	/// Called after an item delete commits.
	pub async fn item_deleted(&self, scope: SearchScope, item_id: Uuid) {
		self.invalidate_scope_cache(&scope.key()).await;

		let Some(index) = self.providers.index.as_ref() else {
			return;
		};

		if let Err(err) = index.delete(item_id).await {
			warn!(error = %err, item_id = %item_id, "Vector index delete failed.");
		}
	}

	/// Called after location moves, merges, and bulk imports commit. Item
	/// vectors are unaffected; only the cached responses go.
	pub async fn scope_changed(&self, scope: SearchScope) {
		self.invalidate_scope_cache(&scope.key()).await;
	}

	/// Admin-facing invalidation. Unlike the write hooks this propagates
	/// storage errors to the caller.
	pub async fn invalidate_scope(&self, scope: SearchScope) -> ServiceResult<u64> {
		self.providers
			.cache
			.invalidate_scope(&scope.key())
			.await
			.map_err(|err| ServiceError::Storage { message: err.to_string() })
	}

	pub(crate) async fn invalidate_scope_cache(&self, scope_key: &str) {
		match self.providers.cache.invalidate_scope(scope_key).await {
			Ok(removed) => {
				if removed > 0 {
					tracing::info!(scope_key, removed, "Scope cache invalidated.");
				}
			},
			Err(err) => {
				warn!(error = %err, scope_key, "Scope cache invalidation failed.");
			},
		}
	}
}
