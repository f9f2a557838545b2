//! Section-aware passage stitching.
//!
//! Ranked chunks that share a `(document_id, section_id)` are merged with their neighbors in
//! `chunk_index` order while the joined text stays within a token budget. Token counts are
//! estimated as `ceil(chars / 4)`.

use std::collections::HashMap;

use crate::{citation, query::{Candidate, Passage}};

const MIN_HARD_LIMIT: u32 = 256;
const SEPARATOR: &str = "\n\n";
const SEPARATOR_CHARS: usize = 2;
const ID_SEPARATOR: &str = "+";

/// Effective budget: `token_limit - margin`, never below 256 tokens.
pub fn hard_limit(token_limit: u32, margin: u32) -> usize {
	token_limit.saturating_sub(margin).max(MIN_HARD_LIMIT) as usize
}

pub fn estimate_tokens(text: &str) -> usize {
	tokens_for_chars(text.chars().count())
}

/// Merges adjacent same-section chunks into passages.
///
/// Every sectioned candidate lands in exactly one passage. Passages follow the rank of the chunk
/// that seeded them; unsectioned candidates pass through unchanged at their own rank.
pub fn stitch_passages(candidates: Vec<Candidate>, token_limit: u32, margin: u32) -> Vec<Passage> {
	let limit = hard_limit(token_limit, margin);
	let total = candidates.len();
	let char_lens: Vec<usize> =
		candidates.iter().map(|candidate| candidate.hit.text.chars().count()).collect();
	let keys: Vec<Option<(String, String)>> = candidates
		.iter()
		.map(|candidate| {
			candidate.section_key().map(|(doc, section)| (doc.to_string(), section.to_string()))
		})
		.collect();
	let mut sections: HashMap<&(String, String), Vec<usize>> = HashMap::new();

	for (pos, key) in keys.iter().enumerate() {
		if let Some(key) = key {
			sections.entry(key).or_default().push(pos);
		}
	}
	for members in sections.values_mut() {
		members.sort_by_key(|&pos| candidates[pos].hit.chunk_index);
	}

	let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
	let mut consumed = vec![false; total];
	let mut passages = Vec::with_capacity(total);

	for pos in 0..total {
		if consumed[pos] {
			continue;
		}

		consumed[pos] = true;

		let Some(members) = keys[pos].as_ref().and_then(|key| sections.get(key)) else {
			if let Some(candidate) = slots[pos].take() {
				passages.push(Passage::from_candidate(candidate));
			}

			continue;
		};
		let Some(seed_at) = members.iter().position(|&member| member == pos) else {
			continue;
		};
		let Some(seed) = slots[pos].take() else { continue };
		let mut chars = char_lens[pos];
		let (mut lo, mut hi) = (seed_at, seed_at);

		if tokens_for_chars(chars) > limit {
			tracing::debug!(
				chunk_id = %seed.hit.chunk_id,
				tokens = tokens_for_chars(chars),
				limit,
				"Chunk exceeds the stitching budget. Emitting it alone."
			);
		}

		while let Some(&next) = members.get(hi + 1) {
			let grown = chars + SEPARATOR_CHARS + char_lens[next];

			if consumed[next] || tokens_for_chars(grown) > limit {
				break;
			}

			consumed[next] = true;
			chars = grown;
			hi += 1;
		}
		while lo > 0 {
			let prev = members[lo - 1];
			let grown = chars + SEPARATOR_CHARS + char_lens[prev];

			if consumed[prev] || tokens_for_chars(grown) > limit {
				break;
			}

			consumed[prev] = true;
			chars = grown;
			lo -= 1;
		}

		let mut texts = Vec::with_capacity(hi - lo + 1);
		let mut ids = Vec::with_capacity(hi - lo + 1);

		for &member in &members[lo..=hi] {
			if member == pos {
				texts.push(seed.hit.text.clone());
				ids.push(seed.hit.chunk_id.clone());
			} else if let Some(sibling) = slots[member].take() {
				texts.push(sibling.hit.text);
				ids.push(sibling.hit.chunk_id);
			}
		}

		passages.push(merge(seed, texts, ids));
	}

	tracing::debug!(
		candidates = total,
		passages = passages.len(),
		limit,
		"Stitching finished."
	);

	passages
}

fn merge(seed: Candidate, texts: Vec<String>, ids: Vec<String>) -> Passage {
	let paragraphs = ids.len();
	let mut passage = Passage::from_candidate(seed);

	passage.citation = citation::with_paragraph_count(&passage.citation, paragraphs);
	passage.text = texts.join(SEPARATOR);
	passage.id = ids.join(ID_SEPARATOR);
	passage.source_chunk_ids = ids;

	passage
}

fn tokens_for_chars(chars: usize) -> usize {
	chars.div_ceil(4)
}
