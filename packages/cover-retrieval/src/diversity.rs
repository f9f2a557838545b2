//! Maximal Marginal Relevance selection.
//!
//! Each round scores every remaining candidate as
//! `lambda * relevance - (1 - lambda) * max_similarity_to_selected` and moves the best one into the
//! selection. Redundancy is measured between the candidates' own chunk embeddings; the query
//! vector plays no part in it. `lambda = 1` is plain top-k by relevance.

use crate::{query::Candidate, similarity};

#[derive(Clone, Copy)]
struct DiversityPick {
	remaining_pos: usize,
	input_pos: usize,
	mmr_score: f32,
}
impl DiversityPick {
	fn better_than(self, other: &Self) -> bool {
		self.mmr_score > other.mmr_score
			|| (self.mmr_score == other.mmr_score && self.input_pos < other.input_pos)
	}
}

/// Picks up to `k` candidates in selection order. Ties go to the earlier candidate.
pub fn select_diverse(candidates: Vec<Candidate>, k: usize, lambda: f32) -> Vec<Candidate> {
	if candidates.is_empty() || k == 0 {
		return Vec::new();
	}

	let relevance: Vec<f32> = candidates.iter().map(|candidate| relevance(candidate)).collect();
	let mut remaining: Vec<usize> = (0..candidates.len()).collect();
	let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

	while selected.len() < k && !remaining.is_empty() {
		let mut best: Option<DiversityPick> = None;

		for (remaining_pos, input_pos) in remaining.iter().copied().enumerate() {
			let redundancy = max_similarity_to_selected(input_pos, &candidates, &selected);
			let pick = DiversityPick {
				remaining_pos,
				input_pos,
				mmr_score: lambda * relevance[input_pos] - (1.0 - lambda) * redundancy,
			};

			if best.as_ref().map(|current| pick.better_than(current)).unwrap_or(true) {
				best = Some(pick);
			}
		}

		let Some(best) = best else { break };

		selected.push(remaining.remove(best.remaining_pos));
	}

	tracing::debug!(
		candidates = candidates.len(),
		selected = selected.len(),
		lambda,
		"Diversity selection finished."
	);

	let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();

	selected.into_iter().filter_map(|idx| slots[idx].take()).collect()
}

/// Highest similarity between `candidate_idx` and any selected candidate, 0 when nothing is
/// selected. Pairs without comparable embeddings count as 0.
pub fn max_similarity_to_selected(
	candidate_idx: usize,
	candidates: &[Candidate],
	selected: &[usize],
) -> f32 {
	if selected.is_empty() {
		return 0.0;
	}

	let candidate_vec = candidates[candidate_idx].hit.embedding.as_deref();

	selected
		.iter()
		.map(|&selected_idx| {
			let selected_vec = candidates[selected_idx].hit.embedding.as_deref();

			match (candidate_vec, selected_vec) {
				(Some(lhs), Some(rhs)) if !lhs.is_empty() && lhs.len() == rhs.len() =>
					similarity::cosine_similarity(lhs, rhs),
				_ => 0.0,
			}
		})
		.fold(f32::NEG_INFINITY, f32::max)
}

fn relevance(candidate: &Candidate) -> f32 {
	let similarity = candidate.hit.similarity;

	if similarity.is_finite() { similarity } else { 0.0 }
}

#[cfg(test)]
mod tests {
	use cover_storage::models::ChunkHit;

	use super::*;

	fn candidate(id: &str, relevance: f32, embedding: Option<Vec<f32>>) -> Candidate {
		Candidate::new(ChunkHit {
			chunk_id: id.to_string(),
			document_id: "doc".to_string(),
			similarity: relevance,
			embedding,
			..Default::default()
		})
	}

	fn ids(selected: &[Candidate]) -> Vec<&str> {
		selected.iter().map(|candidate| candidate.hit.chunk_id.as_str()).collect()
	}

	#[test]
	fn returns_all_when_fewer_than_k() {
		let selected = select_diverse(
			vec![candidate("a", 0.9, Some(vec![1.0, 0.0])), candidate("b", 0.5, None)],
			10,
			0.7,
		);

		assert_eq!(ids(&selected), vec!["a", "b"]);
	}

	#[test]
	fn empty_input_or_zero_k() {
		assert!(select_diverse(Vec::new(), 3, 0.7).is_empty());
		assert!(select_diverse(vec![candidate("a", 0.9, None)], 0, 0.7).is_empty());
	}

	#[test]
	fn lambda_one_is_relevance_order_with_stable_ties() {
		let selected = select_diverse(
			vec![
				candidate("low", 0.2, Some(vec![1.0, 0.0])),
				candidate("tie_first", 0.8, Some(vec![1.0, 0.0])),
				candidate("top", 0.9, Some(vec![1.0, 0.0])),
				candidate("tie_second", 0.8, Some(vec![0.0, 1.0])),
			],
			4,
			1.0,
		);

		assert_eq!(ids(&selected), vec!["top", "tie_first", "tie_second", "low"]);
	}

	#[test]
	fn identical_embeddings_take_full_redundancy_penalty() {
		// B duplicates A; C is less relevant but orthogonal. Reusing one shared vector for every
		// candidate would make all penalties equal and pick B second.
		let selected = select_diverse(
			vec![
				candidate("a", 0.9, Some(vec![1.0, 0.0, 0.0])),
				candidate("b", 0.85, Some(vec![1.0, 0.0, 0.0])),
				candidate("c", 0.6, Some(vec![0.0, 1.0, 0.0])),
			],
			2,
			0.7,
		);

		assert_eq!(ids(&selected), vec!["a", "c"]);
	}

	#[test]
	fn missing_embeddings_never_penalize() {
		let selected = select_diverse(
			vec![
				candidate("a", 0.9, Some(vec![1.0, 0.0])),
				candidate("b", 0.8, None),
				candidate("c", 0.7, Some(vec![1.0, 0.0])),
			],
			3,
			0.5,
		);

		assert_eq!(ids(&selected), vec!["a", "b", "c"]);
	}

	#[test]
	fn max_similarity_is_zero_without_selection() {
		let candidates = vec![candidate("a", 0.9, Some(vec![1.0, 0.0]))];

		assert_eq!(max_similarity_to_selected(0, &candidates, &[]), 0.0);
	}

	#[test]
	fn selection_is_a_subset_without_duplicates() {
		let candidates: Vec<Candidate> = (0..20)
			.map(|i| {
				let angle = i as f32 * 0.3;

				candidate(&format!("c{i}"), 1.0 - i as f32 * 0.03, Some(vec![angle.cos(), angle.sin()]))
			})
			.collect();

		for k in [0, 1, 5, 20, 25] {
			for lambda in [0.0, 0.3, 0.7, 1.0] {
				let selected = select_diverse(candidates.clone(), k, lambda);
				let mut seen = std::collections::HashSet::new();

				assert_eq!(selected.len(), k.min(candidates.len()));

				for picked in &selected {
					assert!(picked.hit.chunk_id.starts_with('c'));
					assert!(seen.insert(picked.hit.chunk_id.clone()), "duplicate {}", picked.hit.chunk_id);
				}
			}
		}
	}
}
