use std::collections::{HashMap, HashSet};

use unicode_normalization::UnicodeNormalization;

use stow_config::SearchExpansion;

/// Kept sorted so membership checks can binary search.
const STOP_WORDS: &[&str] = &[
	"a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "if", "in", "into",
	"is", "it", "my", "of", "on", "or", "our", "that", "the", "their", "this", "to", "was",
	"where", "with",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandedQuery {
	/// Literal query tokens that survived stop-word removal.
	pub base: Vec<String>,
	/// Base tokens plus synonym and phrase expansions, deduped in first-seen
	/// order.
	pub expanded: Vec<String>,
}

/// Expansion tables compiled into their normalized, tokenized form.
/// Multi-word synonym keys are folded into the phrase rules so they still
/// match even though per-token lookup would never see them.
#[derive(Debug, Clone, Default)]
pub struct ExpansionRules {
	synonyms: HashMap<String, Vec<String>>,
	phrases: Vec<(String, Vec<String>)>,
}
impl ExpansionRules {
	pub fn compile(cfg: &SearchExpansion) -> Self {
		let mut synonyms: HashMap<String, Vec<String>> = HashMap::new();
		let mut phrases = Vec::new();

		for (key, values) in &cfg.synonyms {
			let expansion: Vec<String> =
				values.iter().flat_map(|value| tokenize(value)).collect();

			if expansion.is_empty() {
				continue;
			}

			let key_tokens = tokenize(key);

			match key_tokens.as_slice() {
				[] => {},
				[token] => {
					synonyms.entry(token.clone()).or_default().extend(expansion);
				},
				_ => phrases.push((normalize_query(key), expansion)),
			}
		}
		for rule in &cfg.phrases {
			let phrase = normalize_query(&rule.phrase);
			let expansion: Vec<String> =
				rule.expand.iter().flat_map(|value| tokenize(value)).collect();

			if phrase.is_empty() || expansion.is_empty() {
				continue;
			}

			phrases.push((phrase, expansion));
		}

		Self { synonyms, phrases }
	}
}

/// Trim, lowercase, and collapse internal whitespace. This is the form used
/// for cache keys, substring scoring, and phrase matching.
pub fn normalize_query(query: &str) -> String {
	let composed: String = query.nfc().collect();
	let mut out = String::with_capacity(composed.len());

	for part in composed.split_whitespace() {
		if !out.is_empty() {
			out.push(' ');
		}
		for ch in part.chars() {
			out.extend(ch.to_lowercase());
		}
	}

	out
}

/// Split on non-alphanumeric runs, lowercase, drop empties, dedup in
/// first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
	let composed: String = text.nfc().collect();
	let mut out = Vec::new();
	let mut seen = HashSet::new();
	let mut token = String::new();

	for ch in composed.chars() {
		if ch.is_alphanumeric() {
			token.extend(ch.to_lowercase());
		} else if !token.is_empty() {
			push_token(&mut out, &mut seen, std::mem::take(&mut token));
		}
	}
	if !token.is_empty() {
		push_token(&mut out, &mut seen, token);
	}

	out
}

pub fn expand(query: &str, rules: &ExpansionRules) -> ExpandedQuery {
	let normalized = normalize_query(query);
	let raw = tokenize(&normalized);
	let mut base: Vec<String> =
		raw.iter().filter(|token| !is_stop_word(token)).cloned().collect();

	// Stop-word-only queries still have to match something.
	if base.is_empty() {
		base = raw.into_iter().filter(|token| token.chars().count() > 1).collect();
	}

	let mut expanded = Vec::new();
	let mut seen = HashSet::new();

	for token in &base {
		push_token(&mut expanded, &mut seen, token.clone());
	}
	for token in &base {
		if let Some(extra) = rules.synonyms.get(token) {
			for value in extra {
				push_token(&mut expanded, &mut seen, value.clone());
			}
		}
	}
	for (phrase, extra) in &rules.phrases {
		if normalized.contains(phrase.as_str()) {
			for value in extra {
				push_token(&mut expanded, &mut seen, value.clone());
			}
		}
	}

	ExpandedQuery { base, expanded }
}

fn is_stop_word(token: &str) -> bool {
	STOP_WORDS.binary_search(&token).is_ok()
}

fn push_token(out: &mut Vec<String>, seen: &mut HashSet<String>, token: String) {
	if seen.insert(token.clone()) {
		out.push(token);
	}
}
