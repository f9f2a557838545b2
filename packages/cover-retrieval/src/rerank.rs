use std::cmp::Ordering;

use cover_config::{ProviderConfig, RetrievalRerank};
use cover_providers::rerank::NEUTRAL_SCORE;

use crate::{RerankProvider, query::Candidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RerankSettings {
	pub batch_size: usize,
	pub max_chars: usize,
}
impl Default for RerankSettings {
	fn default() -> Self {
		Self::from(&RetrievalRerank::default())
	}
}
impl From<&RetrievalRerank> for RerankSettings {
	fn from(cfg: &RetrievalRerank) -> Self {
		Self { batch_size: cfg.batch_size as usize, max_chars: cfg.max_chars as usize }
	}
}

/// Scores candidates with the cross-encoder and returns the best `top_k`, highest score first.
///
/// `provider` is `None` when no rerank credential is configured; the network is skipped and the
/// incoming order is kept. A batch that fails keeps its incoming order too, through
/// [`fallback_score`]. Batches run one after another.
pub async fn rerank_candidates(
	provider: Option<&dyn RerankProvider>,
	cfg: &ProviderConfig,
	settings: &RerankSettings,
	query: &str,
	candidates: Vec<Candidate>,
	top_k: usize,
) -> Vec<Candidate> {
	let total = candidates.len();

	if total == 0 || top_k == 0 {
		return Vec::new();
	}

	let scores = match provider {
		None => {
			tracing::debug!(candidates = total, "No rerank credential. Keeping diversity order.");

			(0..total).map(|idx| fallback_score(idx, total)).collect()
		},
		Some(provider) => score_in_batches(provider, cfg, settings, query, &candidates).await,
	};
	let mut scored: Vec<Candidate> = candidates
		.into_iter()
		.zip(scores)
		.map(|(mut candidate, score)| {
			candidate.rerank_score = Some(score);

			candidate
		})
		.collect();

	scored.sort_by(|a, b| {
		cmp_f32_desc(a.rerank_score.unwrap_or(f32::NAN), b.rerank_score.unwrap_or(f32::NAN))
	});
	scored.truncate(top_k);

	scored
}

/// Synthetic score for position `idx` of `total`: strictly decreasing, in `(0, 1]`.
pub fn fallback_score(idx: usize, total: usize) -> f32 {
	if total == 0 {
		return 0.0;
	}

	1.0 - idx as f32 / total as f32
}

/// Cuts `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((byte_idx, _)) => &text[..byte_idx],
		None => text,
	}
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

async fn score_in_batches(
	provider: &dyn RerankProvider,
	cfg: &ProviderConfig,
	settings: &RerankSettings,
	query: &str,
	candidates: &[Candidate],
) -> Vec<f32> {
	let total = candidates.len();
	let batch_size = settings.batch_size.max(1);
	let mut scores = Vec::with_capacity(total);

	for (batch_idx, batch) in candidates.chunks(batch_size).enumerate() {
		let offset = batch_idx * batch_size;
		let texts: Vec<String> = batch
			.iter()
			.map(|candidate| truncate_chars(&candidate.hit.text, settings.max_chars).to_string())
			.collect();

		match provider.rerank(cfg, query, &texts).await {
			Ok(batch_scores) if batch_scores.len() == texts.len() => scores.extend(batch_scores),
			Ok(batch_scores) => {
				tracing::warn!(
					batch = batch_idx,
					expected = texts.len(),
					received = batch_scores.len(),
					"Rerank score count mismatch. Using neutral scores."
				);

				scores.extend(std::iter::repeat_n(NEUTRAL_SCORE, texts.len()));
			},
			Err(err) => {
				tracing::warn!(
					batch = batch_idx,
					error = %err,
					"Rerank batch failed. Keeping incoming order for this batch."
				);

				scores.extend((offset..offset + batch.len()).map(|idx| fallback_score(idx, total)));
			},
		}
	}

	scores
}
