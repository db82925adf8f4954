use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
		Query, QueryPointsBuilder, UpsertPointsBuilder, Vector, VectorParamsBuilder,
		VectorsConfigBuilder, point_id::PointIdOptions,
	},
};
use uuid::Uuid;

use crate::Result;

pub const DENSE_VECTOR_NAME: &str = "dense";

/// Everything the external index stores per item. The point id is the item
/// id, so hydration is a straight primary-key lookup.
#[derive(Clone, Debug)]
pub struct IndexRecord {
	pub item_id: Uuid,
	pub scope_key: String,
	pub name: String,
	pub vector: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexHit {
	pub item_id: Uuid,
	pub score: f32,
}

pub struct QdrantIndex {
	pub client: Qdrant,
	pub collection: String,
}
impl QdrantIndex {
	pub fn new(cfg: &stow_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone() })
	}

	pub async fn ensure_collection(&self, dimensions: u32) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(u64::from(dimensions), Distance::Cosine),
		);
		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone())
					.vectors_config(vectors_config),
			)
			.await?;

		Ok(())
	}

	pub async fn upsert(&self, record: &IndexRecord) -> Result<()> {
		let mut payload = Payload::new();

		payload.insert("item_id", record.item_id.to_string());
		payload.insert("scope_key", record.scope_key.clone());
		payload.insert("name", record.name.clone());

		let mut vectors = HashMap::new();

		vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(record.vector.clone()));

		let point = PointStruct::new(record.item_id.to_string(), vectors, payload);

		self.client
			.upsert_points(
				UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true),
			)
			.await?;

		Ok(())
	}

	pub async fn delete(&self, item_id: Uuid) -> Result<()> {
		let filter = Filter::must([Condition::matches("item_id", item_id.to_string())]);
		let delete =
			DeletePointsBuilder::new(self.collection.clone()).points(filter).wait(true);

		self.client.delete_points(delete).await?;

		Ok(())
	}

	pub async fn query(
		&self,
		vector: Vec<f32>,
		top_k: u32,
		scope_key: &str,
	) -> Result<Vec<IndexHit>> {
		let filter = Filter::must([Condition::matches("scope_key", scope_key.to_string())]);
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.filter(filter)
			.limit(u64::from(top_k));
		let response = self.client.query(search).await?;
		let hits = response
			.result
			.iter()
			.filter_map(|point| {
				let item_id = point.id.as_ref().and_then(point_id_to_uuid)?;

				Some(IndexHit { item_id, score: point.score })
			})
			.collect();

		Ok(hits)
	}
}

fn point_id_to_uuid(point_id: &qdrant_client::qdrant::PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}
