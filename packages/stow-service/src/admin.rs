use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ServiceError, ServiceResult, StowService, item_embedding_text};
use stow_domain::scope::SearchScope;
use stow_storage::{items::Selection, qdrant::IndexRecord};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebuildReport {
	pub rebuilt_count: u64,
	pub error_count: u64,
}

impl StowService {
	/// Re-embeds every item in the scope with the active provider and
	/// upserts it into the vector index. Per-item failures are counted,
	/// never fatal; the scope cache is dropped once at the end so readers
	/// pick up the rebuilt index.
	pub async fn rebuild_index(&self, scope: SearchScope) -> ServiceResult<RebuildReport> {
		let Some(index) = self.providers.index.as_ref() else {
			return Err(ServiceError::InvalidRequest {
				message: "Vector index is not configured.".to_string(),
			});
		};
		let scope_key = scope.key();
		let rows = self
			.providers
			.catalog
			.fetch(&scope_key, &Selection::All)
			.await
			.map_err(|err| ServiceError::Storage { message: err.to_string() })?;
		let expected = self.providers.embedding.dimensions() as usize;
		let mut rebuilt_count = 0_u64;
		let mut error_count = 0_u64;

		for row in rows {
			let text = item_embedding_text(&row.name, &row.description, &row.keywords);
			let vector = match self.providers.embedding.embed(&text).await {
				Ok(vector) => vector,
				Err(err) => {
					warn!(error = %err, item_id = %row.item_id, "Embedding failed during rebuild.");

					error_count += 1;

					continue;
				},
			};

			if vector.len() != expected {
				warn!(item_id = %row.item_id, "Embedding dimension mismatch during rebuild.");

				error_count += 1;

				continue;
			}

			let record = IndexRecord {
				item_id: row.item_id,
				scope_key: scope_key.clone(),
				name: row.name,
				vector,
			};

			match index.upsert(&record).await {
				Ok(()) => rebuilt_count += 1,
				Err(err) => {
					warn!(error = %err, item_id = %record.item_id, "Index upsert failed during rebuild.");

					error_count += 1;
				},
			}
		}

		self.invalidate_scope_cache(&scope_key).await;

		tracing::info!(scope_key, rebuilt_count, error_count, "Index rebuild finished.");

		Ok(RebuildReport { rebuilt_count, error_count })
	}
}
