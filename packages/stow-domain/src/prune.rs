use stow_config::RankingPrune;

use crate::score::{ScoredCandidate, SearchMode};

/// Semantic-only tail pruning. Vector similarity degrades gracefully instead
/// of cutting off, so pure semantic result lists grow a long tail of weak
/// matches; this drops everything below the absolute floor, then everything
/// far below the best match. Lexical and hybrid lists pass through untouched.
pub fn prune_semantic_tail(
	mode: SearchMode,
	candidates: Vec<ScoredCandidate>,
	thresholds: &RankingPrune,
) -> Vec<ScoredCandidate> {
	if mode != SearchMode::Semantic {
		return candidates;
	}

	let survivors: Vec<ScoredCandidate> =
		candidates.into_iter().filter(|c| c.fused_score >= thresholds.min_fused).collect();
	let Some(top) = survivors
		.iter()
		.map(|c| c.fused_score)
		.max_by(f32::total_cmp)
	else {
		return survivors;
	};
	let floor = (top * thresholds.relative_floor).max(thresholds.min_fused);

	survivors.into_iter().filter(|c| c.fused_score >= floor).collect()
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;
	use crate::score::Signals;

	fn candidate(fused: f32) -> ScoredCandidate {
		ScoredCandidate {
			item_id: Uuid::new_v4(),
			name: String::new(),
			image_ref: None,
			quantity: 1,
			location_path: String::new(),
			signals: Signals::default(),
			fused_score: fused,
		}
	}

	fn thresholds() -> RankingPrune {
		RankingPrune::default()
	}

	#[test]
	fn hybrid_and_lexical_lists_are_untouched() {
		let candidates = vec![candidate(0.01), candidate(0.002)];

		assert_eq!(
			prune_semantic_tail(SearchMode::Hybrid, candidates.clone(), &thresholds()).len(),
			2
		);
		assert_eq!(
			prune_semantic_tail(SearchMode::Lexical, candidates, &thresholds()).len(),
			2
		);
	}

	#[test]
	fn absolute_floor_drops_weak_matches() {
		let candidates = vec![candidate(0.9), candidate(0.34), candidate(0.1)];
		let pruned = prune_semantic_tail(SearchMode::Semantic, candidates, &thresholds());

		assert_eq!(pruned.len(), 1);
		assert_eq!(pruned[0].fused_score, 0.9);
	}

	#[test]
	fn relative_floor_tracks_the_best_match() {
		// Top 1.0 puts the relative floor at 0.72; 0.5 survives the absolute
		// floor but not the relative one.
		let candidates = vec![candidate(1.0), candidate(0.8), candidate(0.5)];
		let pruned = prune_semantic_tail(SearchMode::Semantic, candidates, &thresholds());
		let scores: Vec<f32> = pruned.iter().map(|c| c.fused_score).collect();

		assert_eq!(scores, vec![1.0, 0.8]);
	}

	#[test]
	fn relative_floor_never_undercuts_the_absolute_floor() {
		// Top 0.4 would put the relative floor at 0.288, below the absolute
		// minimum of 0.35, so 0.36 must still survive.
		let candidates = vec![candidate(0.4), candidate(0.36), candidate(0.3)];
		let pruned = prune_semantic_tail(SearchMode::Semantic, candidates, &thresholds());

		assert_eq!(pruned.len(), 2);
	}

	#[test]
	fn empty_lists_prune_to_empty() {
		assert!(prune_semantic_tail(SearchMode::Semantic, Vec::new(), &thresholds()).is_empty());
	}
}
