use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use cover_config::Retrieval;
use cover_storage::models::{ChunkHit, ChunkSearch, CitationFields, SearchFilters};

use crate::{Error, Result, RetrievalService, citation, diversity, rerank, stitch};

const MAX_TOP_N: u32 = 1_000;

/// Caller-facing query. Every tuning field falls back to the `[retrieval]` config when absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default)]
	pub filters: SearchFilters,
	#[serde(alias = "top_n")]
	pub top_n: Option<u32>,
	#[serde(alias = "mmr_k")]
	pub mmr_k: Option<u32>,
	#[serde(alias = "mmr_lambda")]
	pub lambda: Option<f32>,
	#[serde(alias = "top_k")]
	pub top_k: Option<u32>,
	#[serde(alias = "token_limit")]
	pub token_limit: Option<u32>,
	#[serde(alias = "use_stitching")]
	pub use_stitching: Option<bool>,
	#[serde(alias = "use_reranking")]
	pub use_reranking: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResponse {
	pub results: Vec<Passage>,
	pub pipeline_stats: PipelineStats,
}

/// Item counts after each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
	pub initial_search: usize,
	pub mmr_results: usize,
	pub reranked_results: usize,
	pub final_results: usize,
}

/// A search hit carried through one request.
#[derive(Debug, Clone)]
pub struct Candidate {
	pub hit: ChunkHit,
	pub citation: String,
	pub rerank_score: Option<f32>,
}
impl Candidate {
	pub fn new(hit: ChunkHit) -> Self {
		let citation = citation::label(&hit.citation, hit.page);

		Self { hit, citation, rerank_score: None }
	}

	/// `(document_id, section_id)` for chunks that belong to a section.
	pub fn section_key(&self) -> Option<(&str, &str)> {
		let section_id = self.hit.section_id.as_deref()?;

		Some((self.hit.document_id.as_str(), section_id))
	}
}

/// Output unit: one chunk, or several adjacent chunks of one section joined together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
	/// Source chunk ids joined with `+`.
	pub id: String,
	pub document_id: String,
	pub section_id: Option<String>,
	pub chunk_index: i32,
	pub text: String,
	pub page: Option<i32>,
	pub similarity: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rerank_score: Option<f32>,
	pub citation: String,
	pub citation_fields: CitationFields,
	pub metadata: Map<String, Value>,
	pub source_chunk_ids: Vec<String>,
}
impl Passage {
	/// Wraps a single candidate without changing its text or label.
	pub fn from_candidate(candidate: Candidate) -> Self {
		let Candidate { hit, citation, rerank_score } = candidate;

		Self {
			id: hit.chunk_id.clone(),
			document_id: hit.document_id,
			section_id: hit.section_id,
			chunk_index: hit.chunk_index,
			text: hit.text,
			page: hit.page,
			similarity: hit.similarity,
			rerank_score,
			citation,
			citation_fields: hit.citation,
			metadata: hit.metadata,
			source_chunk_ids: vec![hit.chunk_id],
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedParams {
	top_n: u32,
	mmr_k: usize,
	lambda: f32,
	top_k: usize,
	token_limit: u32,
	use_stitching: bool,
	use_reranking: bool,
}

impl RetrievalService {
	/// Embed, search, diversify, rerank and stitch.
	///
	/// Embedding and store failures abort the request. Rerank failures only degrade ordering.
	pub async fn retrieve(&self, req: RetrievalRequest) -> Result<RetrievalResponse> {
		let params = resolve_params(&self.cfg.retrieval, &req)?;
		let query = req.query.trim();
		let started = Instant::now();
		let query_vector = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, query)
			.await
			.map_err(|err| Error::Provider { message: format!("Embedding failed: {err}") })?;
		let expected_dim = self.cfg.providers.embedding.dimensions as usize;

		if query_vector.len() != expected_dim {
			return Err(Error::Provider {
				message: format!(
					"Embedding vector dimension mismatch: expected {expected_dim}, got {}.",
					query_vector.len()
				),
			});
		}

		tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Query embedded.");

		let search = ChunkSearch {
			query_vector,
			similarity_threshold: self.cfg.retrieval.similarity_threshold,
			max_results: params.top_n,
			filters: req.filters,
		};
		let hits = self.store.search_chunks(&search).await?;
		let mut stats = PipelineStats { initial_search: hits.len(), ..Default::default() };

		if hits.is_empty() {
			tracing::info!(
				elapsed_ms = started.elapsed().as_millis() as u64,
				"Vector search returned no chunks."
			);

			return Ok(RetrievalResponse { results: Vec::new(), pipeline_stats: stats });
		}

		let candidates: Vec<Candidate> = hits.into_iter().map(Candidate::new).collect();
		let diverse = diversity::select_diverse(candidates, params.mmr_k, params.lambda);

		stats.mmr_results = diverse.len();

		let ranked = if params.use_reranking {
			let credential = self.cfg.providers.rerank.api_key.as_ref();
			let provider = credential.map(|_| self.providers.rerank.as_ref());
			let settings = rerank::RerankSettings::from(&self.cfg.retrieval.rerank);

			rerank::rerank_candidates(
				provider,
				&self.cfg.providers.rerank,
				&settings,
				query,
				diverse,
				params.top_k,
			)
			.await
		} else {
			let mut diverse = diverse;

			diverse.truncate(params.top_k);

			diverse
		};

		stats.reranked_results = ranked.len();

		let results = if params.use_stitching {
			stitch::stitch_passages(
				ranked,
				params.token_limit,
				self.cfg.retrieval.stitching.margin,
			)
		} else {
			ranked.into_iter().map(Passage::from_candidate).collect()
		};

		stats.final_results = results.len();

		tracing::info!(
			initial_search = stats.initial_search,
			mmr_results = stats.mmr_results,
			reranked_results = stats.reranked_results,
			final_results = stats.final_results,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Retrieval completed."
		);

		Ok(RetrievalResponse { results, pipeline_stats: stats })
	}
}

fn resolve_params(defaults: &Retrieval, req: &RetrievalRequest) -> Result<ResolvedParams> {
	if req.query.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
	}

	let top_n = req.top_n.unwrap_or(defaults.top_n);
	let mmr_k = req.mmr_k.unwrap_or(defaults.mmr_k);
	let top_k = req.top_k.unwrap_or(defaults.top_k);
	let token_limit = req.token_limit.unwrap_or(defaults.stitching.token_limit);
	let lambda = req.lambda.unwrap_or(defaults.mmr_lambda);

	for (label, value) in
		[("topN", top_n), ("mmrK", mmr_k), ("topK", top_k), ("tokenLimit", token_limit)]
	{
		if value == 0 {
			return Err(Error::InvalidRequest {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if top_n > MAX_TOP_N {
		return Err(Error::InvalidRequest {
			message: format!("topN must be at most {MAX_TOP_N}."),
		});
	}
	if !lambda.is_finite() || !(0.0..=1.0).contains(&lambda) {
		return Err(Error::InvalidRequest {
			message: "lambda must be in the range 0.0-1.0.".to_string(),
		});
	}

	Ok(ResolvedParams {
		top_n,
		mmr_k: mmr_k as usize,
		lambda,
		top_k: top_k as usize,
		token_limit,
		use_stitching: req.use_stitching.unwrap_or(defaults.use_stitching),
		use_reranking: req.use_reranking.unwrap_or(defaults.use_reranking),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request(query: &str) -> RetrievalRequest {
		RetrievalRequest { query: query.to_string(), ..Default::default() }
	}

	#[test]
	fn defaults_come_from_config() {
		let params = resolve_params(&Retrieval::default(), &request("flood")).expect("resolve");

		assert_eq!(
			params,
			ResolvedParams {
				top_n: 100,
				mmr_k: 24,
				lambda: 0.7,
				top_k: 8,
				token_limit: 2_200,
				use_stitching: true,
				use_reranking: true,
			}
		);
	}

	#[test]
	fn overrides_are_independent() {
		let req = RetrievalRequest {
			top_k: Some(3),
			use_stitching: Some(false),
			..request("flood")
		};
		let params = resolve_params(&Retrieval::default(), &req).expect("resolve");

		assert_eq!(params.top_k, 3);
		assert!(!params.use_stitching);
		assert_eq!(params.mmr_k, 24);
		assert!(params.use_reranking);
	}

	#[test]
	fn rejects_blank_query_and_bad_parameters() {
		let defaults = Retrieval::default();

		assert!(matches!(
			resolve_params(&defaults, &request("   ")),
			Err(Error::InvalidRequest { .. })
		));

		for req in [
			RetrievalRequest { mmr_k: Some(0), ..request("q") },
			RetrievalRequest { top_n: Some(MAX_TOP_N + 1), ..request("q") },
			RetrievalRequest { lambda: Some(1.2), ..request("q") },
			RetrievalRequest { lambda: Some(f32::NAN), ..request("q") },
			RetrievalRequest { token_limit: Some(0), ..request("q") },
		] {
			assert!(
				matches!(resolve_params(&defaults, &req), Err(Error::InvalidRequest { .. })),
				"{req:?}"
			);
		}
	}

	#[test]
	fn request_accepts_camel_and_snake_case() {
		let camel: RetrievalRequest = serde_json::from_value(serde_json::json!({
			"query": "hail",
			"topN": 50,
			"mmrK": 10,
			"lambda": 0.9,
			"topK": 4,
			"tokenLimit": 1000,
			"useStitching": false,
			"useReranking": false,
			"filters": { "insurer": "Northwind Mutual", "lineOfBusiness": "property" }
		}))
		.expect("parse camelCase");
		let snake: RetrievalRequest = serde_json::from_value(serde_json::json!({
			"query": "hail",
			"top_n": 50,
			"mmr_k": 10,
			"mmr_lambda": 0.9,
			"top_k": 4,
			"token_limit": 1000,
			"use_stitching": false,
			"use_reranking": false,
			"filters": { "insurer": "Northwind Mutual", "line_of_business": "property" }
		}))
		.expect("parse snake_case");

		for req in [camel, snake] {
			assert_eq!(req.top_n, Some(50));
			assert_eq!(req.mmr_k, Some(10));
			assert_eq!(req.lambda, Some(0.9));
			assert_eq!(req.top_k, Some(4));
			assert_eq!(req.token_limit, Some(1_000));
			assert_eq!(req.use_stitching, Some(false));
			assert_eq!(req.use_reranking, Some(false));
			assert_eq!(req.filters.insurer.as_deref(), Some("Northwind Mutual"));
			assert_eq!(req.filters.line_of_business.as_deref(), Some("property"));
		}
	}

	#[test]
	fn request_rejects_unknown_filter_keys() {
		let parsed: std::result::Result<RetrievalRequest, _> =
			serde_json::from_value(serde_json::json!({
				"query": "hail",
				"filters": { "carrier": "Northwind Mutual" }
			}));

		assert!(parsed.is_err());
	}

	#[test]
	fn candidate_section_key_requires_section() {
		let mut hit = ChunkHit {
			chunk_id: "c1".to_string(),
			document_id: "d1".to_string(),
			..Default::default()
		};

		assert!(Candidate::new(hit.clone()).section_key().is_none());

		hit.section_id = Some("s1".to_string());

		assert_eq!(Candidate::new(hit).section_key(), Some(("d1", "s1")));
	}
}
