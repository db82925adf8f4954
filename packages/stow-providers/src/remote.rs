use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

use stow_config::RemoteEmbeddingConfig;

/// Client for an OpenAI-compatible embeddings endpoint. Built once at
/// startup; the search path embeds one query per request, so the underlying
/// connection pool is shared across calls.
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
	client: Client,
	url: String,
	model: String,
	dimensions: u32,
}
impl RemoteEmbedder {
	/// The requested dimension is the deployment-wide embedding dimension,
	/// not something the remote table chooses on its own.
	pub fn new(cfg: &RemoteEmbeddingConfig, dimensions: u32) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.build()?;
		let url = format!("{}{}", cfg.api_base, cfg.path);

		Ok(Self { client, url, model: cfg.model.clone(), dimensions })
	}

	pub fn dimensions(&self) -> u32 {
		self.dimensions
	}

	/// Returns one vector per input text, in input order.
	pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let body = serde_json::json!({
			"model": self.model,
			"input": texts,
			"dimensions": self.dimensions,
		});
		let res = self.client.post(&self.url).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;
		let vectors = parse_embedding_response(json)?;
		let expected = self.dimensions as usize;

		for vector in &vectors {
			if vector.len() != expected {
				return Err(eyre::eyre!(
					"Embedding dimension mismatch: expected {expected}, got {}.",
					vector.len()
				));
			}
		}

		Ok(vectors)
	}
}

fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Providers are not obliged to echo inputs back in order, so entries are
/// reordered by their reported index before returning.
fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(Value::as_array)
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;
	let mut indexed = Vec::with_capacity(data.len());

	for (position, item) in data.iter().enumerate() {
		let index =
			item.get("index").and_then(Value::as_u64).map(|v| v as usize).unwrap_or(position);
		let values = item
			.get("embedding")
			.and_then(Value::as_array)
			.ok_or_else(|| eyre::eyre!("Embedding item missing embedding array."))?;
		let vector = values
			.iter()
			.map(|value| {
				value
					.as_f64()
					.map(|number| number as f32)
					.ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))
			})
			.collect::<Result<Vec<f32>>>()?;

		indexed.push((index, vector));
	}

	indexed.sort_unstable_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}
