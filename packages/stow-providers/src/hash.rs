use stow_config::{HashEmbeddingConfig, MAX_EMBEDDING_DIMENSIONS, MIN_EMBEDDING_DIMENSIONS};
use stow_domain::query::{self, ExpansionRules};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Model-free embedder. Hashes expanded tokens into a fixed number of
/// buckets, so the same text yields the same vector across restarts and
/// hosts with no network call.
pub struct HashEmbedder {
	dimensions: u32,
	weights: HashEmbeddingConfig,
	rules: ExpansionRules,
}
impl HashEmbedder {
	pub fn new(dimensions: u32, weights: HashEmbeddingConfig, rules: ExpansionRules) -> Self {
		let dimensions = dimensions.clamp(MIN_EMBEDDING_DIMENSIONS, MAX_EMBEDDING_DIMENSIONS);

		Self { dimensions, weights, rules }
	}

	pub fn dimensions(&self) -> u32 {
		self.dimensions
	}

	/// Literal tokens carry full weight, expansion-derived tokens less, and
	/// adjacent base-token bigrams slightly more so short phrases survive the
	/// bucketing. The result is L2-normalized; an all-zero accumulation is
	/// returned as-is.
	pub fn embed(&self, text: &str) -> Vec<f32> {
		let expanded = query::expand(&query::normalize_query(text), &self.rules);
		let mut vector = vec![0.0_f32; self.dimensions as usize];

		for token in &expanded.expanded {
			let weight = if expanded.base.contains(token) {
				self.weights.literal_weight
			} else {
				self.weights.expansion_weight
			};

			vector[self.bucket(token)] += weight;
		}
		for pair in expanded.base.windows(2) {
			let bigram = format!("{} {}", pair[0], pair[1]);

			vector[self.bucket(&bigram)] += self.weights.bigram_weight;
		}

		l2_normalize(&mut vector);

		vector
	}

	fn bucket(&self, token: &str) -> usize {
		(fnv1a(token.as_bytes()) % u64::from(self.dimensions)) as usize
	}
}

/// Dot product of two already-normalized vectors. Shorter input bounds the
/// sum when dimensions disagree.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn fnv1a(bytes: &[u8]) -> u64 {
	bytes.iter().fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}

fn l2_normalize(vector: &mut [f32]) {
	let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if magnitude > 0.0 {
		for value in vector.iter_mut() {
			*value /= magnitude;
		}
	}
}

#[cfg(test)]
mod tests {
	use stow_config::SearchExpansion;

	use super::*;

	fn embedder(dimensions: u32) -> HashEmbedder {
		HashEmbedder::new(
			dimensions,
			HashEmbeddingConfig::default(),
			ExpansionRules::compile(&SearchExpansion::default()),
		)
	}

	#[test]
	fn same_text_yields_the_same_vector() {
		let embedder = embedder(256);
		let query = "air pump for bike tires";

		assert_eq!(embedder.embed(query), embedder.embed(query));
	}

	#[test]
	fn normalization_variants_collapse_to_one_vector() {
		let embedder = embedder(256);

		assert_eq!(embedder.embed("  Air   PUMP "), embedder.embed("air pump"));
	}

	#[test]
	fn non_empty_text_yields_a_unit_vector() {
		let embedder = embedder(256);
		let vector = embedder.embed("pneumatic tank compressor");
		let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();

		assert!((magnitude - 1.0).abs() < 1e-5);
	}

	#[test]
	fn empty_text_yields_all_zeros() {
		let embedder = embedder(64);
		let vector = embedder.embed("   ");

		assert_eq!(vector.len(), 64);
		assert!(vector.iter().all(|v| *v == 0.0));
	}

	#[test]
	fn dimensions_are_clamped() {
		assert_eq!(embedder(1).dimensions(), MIN_EMBEDDING_DIMENSIONS);
		assert_eq!(embedder(1_000_000).dimensions(), MAX_EMBEDDING_DIMENSIONS);
		assert_eq!(embedder(256).dimensions(), 256);
	}

	#[test]
	fn synonyms_pull_related_texts_together() {
		// "pump" expands into "compressor" and vice versa, so the two
		// vectors share buckets and their dot product is positive.
		let embedder = embedder(512);
		let similarity = cosine(&embedder.embed("pump"), &embedder.embed("compressor"));

		assert!(similarity > 0.0);
	}

	#[test]
	fn cosine_of_a_vector_with_itself_is_one() {
		let embedder = embedder(256);
		let vector = embedder.embed("ladder");

		assert!((cosine(&vector, &vector) - 1.0).abs() < 1e-5);
	}
}
