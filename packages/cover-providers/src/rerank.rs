use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Score assigned to every text when the service answers with an unrecognized shape.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Scores `texts` against `query`. Transport and status failures are errors; a successful
/// response that cannot be interpreted degrades to [`NEUTRAL_SCORE`] for the whole batch.
pub async fn rerank(
	cfg: &cover_config::ProviderConfig,
	query: &str,
	texts: &[String],
) -> Result<Vec<f32>> {
	let Some(api_key) = cfg.api_key.as_deref() else {
		return Err(eyre::eyre!("Rerank provider {} has no api_key.", cfg.provider_id));
	};
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "texts": texts });
	let res = client
		.post(url)
		.headers(crate::auth_headers(Some(api_key), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	match parse_rerank_response(&json, texts.len()) {
		Some(scores) => Ok(scores),
		None => {
			tracing::warn!(
				provider_id = %cfg.provider_id,
				texts = texts.len(),
				"Rerank response has an unexpected shape. Using neutral scores."
			);

			Ok(vec![NEUTRAL_SCORE; texts.len()])
		},
	}
}

/// Accepted shapes: `[0.1, ...]`, `[{ "score": 0.1 }, ...]`, `{ "scores": [...] }`, and
/// `{ "results": [{ "index": 0, "relevance_score": 0.1 }] }`.
pub fn parse_rerank_response(json: &Value, text_count: usize) -> Option<Vec<f32>> {
	let scores = match json {
		Value::Array(items) => parse_score_items(items)?,
		Value::Object(object) =>
			if let Some(scores) = object.get("scores").and_then(|v| v.as_array()) {
				parse_score_items(scores)?
			} else {
				let results = object
					.get("results")
					.or_else(|| object.get("data"))
					.and_then(|v| v.as_array())?;

				parse_indexed_results(results, text_count)?
			},
		_ => return None,
	};

	(scores.len() == text_count).then_some(scores)
}

fn parse_score_items(items: &[Value]) -> Option<Vec<f32>> {
	items
		.iter()
		.map(|item| match item {
			Value::Number(number) => number.as_f64(),
			Value::Object(object) =>
				object.get("score").or_else(|| object.get("relevance_score"))?.as_f64(),
			_ => None,
		})
		.map(|score| score.map(|value| value as f32))
		.collect()
}

fn parse_indexed_results(results: &[Value], text_count: usize) -> Option<Vec<f32>> {
	let mut scores = vec![None; text_count];

	for item in results {
		let index = item.get("index")?.as_u64()? as usize;
		let score = item.get("relevance_score").or_else(|| item.get("score"))?.as_f64()? as f32;

		*scores.get_mut(index)? = Some(score);
	}

	scores.into_iter().collect()
}
