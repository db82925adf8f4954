use std::sync::Arc;

use color_eyre::eyre;

use stow_service::StowService;
use stow_storage::{db::Db, qdrant::QdrantIndex};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<StowService>,
}
impl AppState {
	pub async fn new(config: stow_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let index = if config.search.index.provider == "qdrant" {
			let qdrant_cfg = config.storage.qdrant.as_ref().ok_or_else(|| {
				eyre::eyre!("Index provider \"qdrant\" requires the [storage.qdrant] table.")
			})?;
			let index = QdrantIndex::new(qdrant_cfg)?;

			index.ensure_collection(config.providers.embedding.dimensions).await?;

			Some(index)
		} else {
			None
		};
		let service = StowService::new(config, db, index)?;

		Ok(Self { service: Arc::new(service) })
	}
}
