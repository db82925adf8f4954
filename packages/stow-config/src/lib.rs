mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, HashEmbeddingConfig, MAX_EMBEDDING_DIMENSIONS,
	MIN_EMBEDDING_DIMENSIONS, PhraseRule, Postgres, Providers, Qdrant, Ranking, RankingFusion,
	RankingLexical, RankingPrune, RemoteEmbeddingConfig, Search, SearchCache, SearchExpansion,
	SearchIndex, SearchLimits, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	match embedding.provider_id.as_str() {
		"hash" => {},
		"remote" => {
			let Some(remote) = embedding.remote.as_ref() else {
				return Err(Error::Validation {
					message: "providers.embedding.remote is required when provider_id is remote."
						.to_string(),
				});
			};

			for (label, value) in [
				("providers.embedding.remote.api_base", &remote.api_base),
				("providers.embedding.remote.api_key", &remote.api_key),
				("providers.embedding.remote.path", &remote.path),
				("providers.embedding.remote.model", &remote.model),
			] {
				if value.trim().is_empty() {
					return Err(Error::Validation {
						message: format!("{label} must be non-empty."),
					});
				}
			}
			if remote.timeout_ms == 0 {
				return Err(Error::Validation {
					message: "providers.embedding.remote.timeout_ms must be greater than zero."
						.to_string(),
				});
			}
		},
		_ => {
			return Err(Error::Validation {
				message: "providers.embedding.provider_id must be one of hash or remote."
					.to_string(),
			});
		},
	}

	for (label, weight) in [
		("providers.embedding.hash.literal_weight", embedding.hash.literal_weight),
		("providers.embedding.hash.expansion_weight", embedding.hash.expansion_weight),
		("providers.embedding.hash.bigram_weight", embedding.hash.bigram_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be zero or greater."),
			});
		}
	}

	let index = &cfg.search.index;

	match index.provider.as_str() {
		"local" => {},
		"qdrant" => {
			let Some(qdrant) = cfg.storage.qdrant.as_ref() else {
				return Err(Error::Validation {
					message: "storage.qdrant is required when search.index.provider is qdrant."
						.to_string(),
				});
			};

			if qdrant.url.trim().is_empty() {
				return Err(Error::Validation {
					message: "storage.qdrant.url must be non-empty.".to_string(),
				});
			}
			if qdrant.collection.trim().is_empty() {
				return Err(Error::Validation {
					message: "storage.qdrant.collection must be non-empty.".to_string(),
				});
			}
		},
		_ => {
			return Err(Error::Validation {
				message: "search.index.provider must be one of qdrant or local.".to_string(),
			});
		},
	}

	if index.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.index.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if index.top_k_floor == 0 {
		return Err(Error::Validation {
			message: "search.index.top_k_floor must be greater than zero.".to_string(),
		});
	}
	if index.top_k_cap < index.top_k_floor {
		return Err(Error::Validation {
			message: "search.index.top_k_cap must be at least search.index.top_k_floor."
				.to_string(),
		});
	}

	let cache = &cfg.search.cache;

	if cache.fresh_seconds <= 0 {
		return Err(Error::Validation {
			message: "search.cache.fresh_seconds must be greater than zero.".to_string(),
		});
	}
	if cache.stale_seconds < cache.fresh_seconds {
		return Err(Error::Validation {
			message: "search.cache.stale_seconds must be at least search.cache.fresh_seconds."
				.to_string(),
		});
	}
	if cache.max_query_chars == 0 {
		return Err(Error::Validation {
			message: "search.cache.max_query_chars must be greater than zero.".to_string(),
		});
	}

	let limits = &cfg.search.limits;

	if limits.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.limits.default_limit must be greater than zero.".to_string(),
		});
	}
	if limits.max_limit < limits.default_limit {
		return Err(Error::Validation {
			message: "search.limits.max_limit must be at least search.limits.default_limit."
				.to_string(),
		});
	}

	for (token, expansions) in &cfg.search.expansion.synonyms {
		if token.trim().is_empty() {
			return Err(Error::Validation {
				message: "search.expansion.synonyms keys cannot be blank.".to_string(),
			});
		}
		if expansions.iter().any(|value| value.trim().is_empty()) {
			return Err(Error::Validation {
				message: format!(
					"search.expansion.synonyms entry {token:?} contains a blank expansion."
				),
			});
		}
	}
	for rule in &cfg.search.expansion.phrases {
		if rule.phrase.trim().is_empty() {
			return Err(Error::Validation {
				message: "search.expansion.phrases entries must have a non-empty phrase."
					.to_string(),
			});
		}
		if rule.expand.is_empty() {
			return Err(Error::Validation {
				message: format!(
					"search.expansion.phrases entry {:?} must expand to at least one token.",
					rule.phrase
				),
			});
		}
	}

	let ranking = &cfg.ranking;

	for (label, weight) in [
		("ranking.semantic_floor", ranking.semantic_floor),
		("ranking.lexical.name_weight", ranking.lexical.name_weight),
		("ranking.lexical.description_weight", ranking.lexical.description_weight),
		("ranking.lexical.keywords_weight", ranking.lexical.keywords_weight),
		("ranking.fusion.lexical_overlap", ranking.fusion.lexical_overlap),
		("ranking.fusion.semantic_overlap", ranking.fusion.semantic_overlap),
		("ranking.fusion.hybrid_lexical", ranking.fusion.hybrid_lexical),
		("ranking.fusion.hybrid_semantic", ranking.fusion.hybrid_semantic),
		("ranking.fusion.hybrid_overlap", ranking.fusion.hybrid_overlap),
		("ranking.prune.min_fused", ranking.prune.min_fused),
		("ranking.prune.relative_floor", ranking.prune.relative_floor),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be zero or greater."),
			});
		}
	}
	if ranking.semantic_floor > 1.0 {
		return Err(Error::Validation {
			message: "ranking.semantic_floor must be 1.0 or less.".to_string(),
		});
	}
	if ranking.prune.relative_floor > 1.0 {
		return Err(Error::Validation {
			message: "ranking.prune.relative_floor must be 1.0 or less.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let dims = &mut cfg.providers.embedding.dimensions;

	// The embedding dimension is a deployment-wide constant; out-of-range
	// values are clamped rather than rejected.
	*dims = (*dims).clamp(types::MIN_EMBEDDING_DIMENSIONS, types::MAX_EMBEDDING_DIMENSIONS);

	cfg.providers.embedding.provider_id = cfg.providers.embedding.provider_id.trim().to_lowercase();
	cfg.search.index.provider = cfg.search.index.provider.trim().to_lowercase();
}
