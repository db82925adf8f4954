use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

pub const MIN_EMBEDDING_DIMENSIONS: u32 = 8;
pub const MAX_EMBEDDING_DIMENSIONS: u32 = 2_048;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub ranking: Ranking,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Option<Qdrant>,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	/// "hash" for the in-process deterministic embedder, "remote" for an
	/// OpenAI-compatible HTTP endpoint.
	pub provider_id: String,
	pub dimensions: u32,
	#[serde(default)]
	pub hash: HashEmbeddingConfig,
	pub remote: Option<RemoteEmbeddingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HashEmbeddingConfig {
	pub literal_weight: f32,
	pub expansion_weight: f32,
	pub bigram_weight: f32,
}
impl Default for HashEmbeddingConfig {
	fn default() -> Self {
		Self { literal_weight: 1.0, expansion_weight: 0.72, bigram_weight: 1.15 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEmbeddingConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Search {
	pub index: SearchIndex,
	pub cache: SearchCache,
	pub expansion: SearchExpansion,
	pub limits: SearchLimits,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchIndex {
	/// "qdrant" routes queries through the external index with the cache and
	/// fallback chain; "local" scores in process and bypasses both.
	pub provider: String,
	pub timeout_ms: u64,
	pub top_k_margin: u32,
	pub top_k_floor: u32,
	pub top_k_cap: u32,
}
impl Default for SearchIndex {
	fn default() -> Self {
		Self {
			provider: "local".to_string(),
			timeout_ms: 2_500,
			top_k_margin: 50,
			top_k_floor: 64,
			top_k_cap: 512,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchCache {
	pub enabled: bool,
	pub fresh_seconds: i64,
	pub stale_seconds: i64,
	pub max_query_chars: usize,
}
impl Default for SearchCache {
	fn default() -> Self {
		Self { enabled: true, fresh_seconds: 300, stale_seconds: 86_400, max_query_chars: 512 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchExpansion {
	pub synonyms: HashMap<String, Vec<String>>,
	pub phrases: Vec<PhraseRule>,
}
impl Default for SearchExpansion {
	fn default() -> Self {
		let mut synonyms = HashMap::new();

		for (token, expansions) in [
			("pump", &["compressor", "inflator"][..]),
			("compressor", &["pump"][..]),
			("inflator", &["pump"][..]),
			("couch", &["sofa"][..]),
			("sofa", &["couch"][..]),
			("fridge", &["refrigerator"][..]),
			("refrigerator", &["fridge"][..]),
			("tv", &["television"][..]),
			("television", &["tv"][..]),
			("bike", &["bicycle"][..]),
			("bicycle", &["bike"][..]),
		] {
			synonyms.insert(
				token.to_string(),
				expansions.iter().map(|value| value.to_string()).collect(),
			);
		}

		let phrases = vec![
			PhraseRule {
				phrase: "air pump".to_string(),
				expand: vec![
					"compressor".to_string(),
					"inflator".to_string(),
					"pneumatic".to_string(),
					"tire".to_string(),
				],
			},
			PhraseRule {
				phrase: "power strip".to_string(),
				expand: vec!["extension".to_string(), "outlet".to_string(), "surge".to_string()],
			},
			PhraseRule {
				phrase: "christmas lights".to_string(),
				expand: vec!["holiday".to_string(), "string".to_string(), "decoration".to_string()],
			},
		];

		Self { synonyms, phrases }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhraseRule {
	pub phrase: String,
	pub expand: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
	pub default_limit: u32,
	pub max_limit: u32,
	pub max_offset: u32,
}
impl Default for SearchLimits {
	fn default() -> Self {
		Self { default_limit: 20, max_limit: 100, max_offset: 10_000 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	/// Minimum semantic score that lets a candidate through the semantic-mode
	/// inclusion filter without any token overlap backing it up.
	pub semantic_floor: f32,
	pub lexical: RankingLexical,
	pub fusion: RankingFusion,
	pub prune: RankingPrune,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			semantic_floor: 0.85,
			lexical: RankingLexical::default(),
			fusion: RankingFusion::default(),
			prune: RankingPrune::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RankingLexical {
	pub name_weight: f32,
	pub description_weight: f32,
	pub keywords_weight: f32,
}
impl Default for RankingLexical {
	fn default() -> Self {
		Self { name_weight: 3.0, description_weight: 1.5, keywords_weight: 1.0 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RankingFusion {
	pub lexical_overlap: f32,
	pub semantic_overlap: f32,
	pub hybrid_lexical: f32,
	pub hybrid_semantic: f32,
	pub hybrid_overlap: f32,
}
impl Default for RankingFusion {
	fn default() -> Self {
		Self {
			lexical_overlap: 0.35,
			semantic_overlap: 0.12,
			hybrid_lexical: 0.6,
			hybrid_semantic: 0.3,
			hybrid_overlap: 0.1,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RankingPrune {
	pub min_fused: f32,
	pub relative_floor: f32,
}
impl Default for RankingPrune {
	fn default() -> Self {
		Self { min_fused: 0.35, relative_floor: 0.72 }
	}
}
