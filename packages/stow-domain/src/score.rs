use std::cmp::Ordering;

use uuid::Uuid;

use stow_config::{RankingFusion, RankingLexical};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
	Hybrid,
	Semantic,
	Lexical,
}
impl SearchMode {
	/// Missing mode defaults to hybrid; anything unrecognized is a caller
	/// error and is rejected before any scoring work happens.
	pub fn parse(value: Option<&str>) -> Result<Self, Error> {
		match value.map(str::trim) {
			None | Some("") => Ok(Self::Hybrid),
			Some("hybrid") => Ok(Self::Hybrid),
			Some("semantic") => Ok(Self::Semantic),
			Some("lexical") => Ok(Self::Lexical),
			Some(other) => Err(Error::InvalidMode { value: other.to_string() }),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Hybrid => "hybrid",
			Self::Semantic => "semantic",
			Self::Lexical => "lexical",
		}
	}
}

/// The three independent relevance signals computed per candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
	pub lexical: f32,
	pub semantic: f32,
	pub overlap: f32,
}

/// Pre-lowercased item text, built once per candidate so the substring
/// scans do not re-allocate per signal.
#[derive(Debug, Clone)]
pub struct ScoringText {
	name: String,
	description: String,
	keywords: String,
	combined: String,
}
impl ScoringText {
	pub fn new(name: &str, description: &str, keywords: &[String]) -> Self {
		let name = name.to_lowercase();
		let description = description.to_lowercase();
		let keywords = keywords.join(" ").to_lowercase();
		let mut combined =
			String::with_capacity(name.len() + description.len() + keywords.len() + 2);

		combined.push_str(&name);
		combined.push(' ');
		combined.push_str(&description);
		combined.push(' ');
		combined.push_str(&keywords);

		Self { name, description, keywords, combined }
	}
}

/// Additive substring hits of the normalized query against each item field.
pub fn lexical_score(text: &ScoringText, normalized_query: &str, weights: &RankingLexical) -> f32 {
	if normalized_query.is_empty() {
		return 0.0;
	}

	let mut score = 0.0;

	if text.name.contains(normalized_query) {
		score += weights.name_weight;
	}
	if text.description.contains(normalized_query) {
		score += weights.description_weight;
	}
	if text.keywords.contains(normalized_query) {
		score += weights.keywords_weight;
	}

	score
}

/// Count of expanded query tokens that appear as substrings anywhere in the
/// item text. Uncapped.
pub fn token_overlap(text: &ScoringText, expanded_tokens: &[String]) -> f32 {
	expanded_tokens.iter().filter(|token| text.combined.contains(token.as_str())).count() as f32
}

pub fn fuse(mode: SearchMode, signals: Signals, weights: &RankingFusion) -> f32 {
	match mode {
		SearchMode::Lexical => signals.lexical + signals.overlap * weights.lexical_overlap,
		SearchMode::Semantic => signals.semantic + signals.overlap * weights.semantic_overlap,
		SearchMode::Hybrid =>
			signals.lexical * weights.hybrid_lexical
				+ signals.semantic * weights.hybrid_semantic
				+ signals.overlap * weights.hybrid_overlap,
	}
}

/// Whether a candidate may be returned at all. The semantic arm demands
/// textual corroboration unless the vector score alone clears the floor.
pub fn passes_inclusion(mode: SearchMode, signals: Signals, semantic_floor: f32) -> bool {
	match mode {
		SearchMode::Lexical => signals.lexical > 0.0 || signals.overlap > 0.0,
		SearchMode::Semantic =>
			signals.semantic > 0.0
				&& (signals.overlap > 0.0 || signals.semantic >= semantic_floor),
		SearchMode::Hybrid =>
			signals.lexical > 0.0 || signals.semantic > 0.0 || signals.overlap > 0.0,
	}
}

/// A fully scored candidate row, ready for ordering and pagination.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
	pub item_id: Uuid,
	pub name: String,
	pub image_ref: Option<String>,
	pub quantity: i32,
	pub location_path: String,
	pub signals: Signals,
	pub fused_score: f32,
}

/// Total order: fused desc, lexical desc, semantic desc, name asc
/// (case-sensitive), id asc. Pagination correctness depends on this being
/// stable and reproducible.
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
	candidates.sort_by(compare_candidates);
}

fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
	b.fused_score
		.total_cmp(&a.fused_score)
		.then_with(|| b.signals.lexical.total_cmp(&a.signals.lexical))
		.then_with(|| b.signals.semantic.total_cmp(&a.signals.semantic))
		.then_with(|| a.name.cmp(&b.name))
		.then_with(|| a.item_id.cmp(&b.item_id))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lexical_weights() -> RankingLexical {
		RankingLexical::default()
	}

	fn fusion_weights() -> RankingFusion {
		RankingFusion::default()
	}

	fn candidate(name: &str, fused: f32, signals: Signals) -> ScoredCandidate {
		ScoredCandidate {
			item_id: Uuid::new_v4(),
			name: name.to_string(),
			image_ref: None,
			quantity: 1,
			location_path: String::new(),
			signals,
			fused_score: fused,
		}
	}

	#[test]
	fn mode_parsing_defaults_to_hybrid() {
		assert_eq!(SearchMode::parse(None).expect("Expected mode."), SearchMode::Hybrid);
		assert_eq!(SearchMode::parse(Some("")).expect("Expected mode."), SearchMode::Hybrid);
		assert_eq!(
			SearchMode::parse(Some("semantic")).expect("Expected mode."),
			SearchMode::Semantic
		);
		assert!(SearchMode::parse(Some("fuzzy")).is_err());
	}

	#[test]
	fn lexical_score_sums_field_hits() {
		let text = ScoringText::new(
			"Pneumatic Tank Compressor",
			"Small compressor for the garage",
			&["pneumatic".to_string(), "tank".to_string(), "compressor".to_string()],
		);
		let score = lexical_score(&text, "compressor", &lexical_weights());

		assert_eq!(score, 3.0 + 1.5 + 1.0);

		let score = lexical_score(&text, "tank", &lexical_weights());

		assert_eq!(score, 3.0 + 1.0);
	}

	#[test]
	fn empty_queries_score_nothing() {
		let text = ScoringText::new("Shovel", "", &[]);

		assert_eq!(lexical_score(&text, "", &lexical_weights()), 0.0);
	}

	#[test]
	fn token_overlap_counts_substring_hits() {
		let text = ScoringText::new(
			"Portable Tire Inflator",
			"Cordless inflator",
			&["inflator".to_string(), "air".to_string(), "tire".to_string()],
		);
		let tokens =
			vec!["air".to_string(), "pump".to_string(), "inflator".to_string()];

		assert_eq!(token_overlap(&text, &tokens), 2.0);
	}

	#[test]
	fn fusion_applies_mode_weights() {
		let signals = Signals { lexical: 4.0, semantic: 0.5, overlap: 2.0 };
		let weights = fusion_weights();

		assert_eq!(fuse(SearchMode::Lexical, signals, &weights), 4.0 + 2.0 * 0.35);
		assert_eq!(fuse(SearchMode::Semantic, signals, &weights), 0.5 + 2.0 * 0.12);
		assert_eq!(
			fuse(SearchMode::Hybrid, signals, &weights),
			4.0 * 0.6 + 0.5 * 0.3 + 2.0 * 0.1
		);
	}

	#[test]
	fn semantic_inclusion_requires_corroboration_below_the_floor() {
		let floor = 0.85;
		let uncorroborated = Signals { lexical: 0.0, semantic: 0.4, overlap: 0.0 };
		let corroborated = Signals { lexical: 0.0, semantic: 0.4, overlap: 1.0 };
		let confident = Signals { lexical: 0.0, semantic: 0.9, overlap: 0.0 };
		let negative = Signals { lexical: 0.0, semantic: -0.2, overlap: 3.0 };

		assert!(!passes_inclusion(SearchMode::Semantic, uncorroborated, floor));
		assert!(passes_inclusion(SearchMode::Semantic, corroborated, floor));
		assert!(passes_inclusion(SearchMode::Semantic, confident, floor));
		assert!(!passes_inclusion(SearchMode::Semantic, negative, floor));
	}

	#[test]
	fn lexical_inclusion_ignores_semantic_signal() {
		let signals = Signals { lexical: 0.0, semantic: 0.99, overlap: 0.0 };

		assert!(!passes_inclusion(SearchMode::Lexical, signals, 0.85));
		assert!(passes_inclusion(SearchMode::Hybrid, signals, 0.85));
	}

	#[test]
	fn ordering_breaks_ties_deterministically() {
		let signals_high_lex = Signals { lexical: 3.0, semantic: 0.1, overlap: 1.0 };
		let signals_low_lex = Signals { lexical: 1.0, semantic: 0.9, overlap: 1.0 };
		let mut candidates = vec![
			candidate("zeta", 1.0, signals_low_lex),
			candidate("alpha", 1.0, signals_low_lex),
			candidate("mid", 1.0, signals_high_lex),
			candidate("top", 2.0, signals_low_lex),
		];

		sort_candidates(&mut candidates);

		let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();

		assert_eq!(names, vec!["top", "mid", "alpha", "zeta"]);
	}

	#[test]
	fn ordering_falls_back_to_ids_for_identical_rows() {
		let signals = Signals { lexical: 1.0, semantic: 0.0, overlap: 1.0 };
		let id_a = Uuid::from_u128(1);
		let id_b = Uuid::from_u128(2);
		let mut candidates = vec![
			ScoredCandidate { item_id: id_b, ..candidate("same", 1.0, signals) },
			ScoredCandidate { item_id: id_a, ..candidate("same", 1.0, signals) },
		];

		sort_candidates(&mut candidates);

		assert_eq!(candidates[0].item_id, id_a);
		assert_eq!(candidates[1].item_id, id_b);
	}
}
