use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

pub async fn embed(cfg: &cover_config::EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": text,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(Some(cfg.api_key.as_str()), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(&json)
}

/// Accepts `{ "vector": [...] }`, `{ "embedding": [...] }` and the OpenAI
/// `{ "data": [{ "embedding": [...] }] }` shape.
fn parse_embedding_response(json: &Value) -> Result<Vec<f32>> {
	let values = json
		.get("vector")
		.or_else(|| json.get("embedding"))
		.or_else(|| {
			json.get("data")
				.and_then(|v| v.as_array())
				.and_then(|data| data.first())
				.and_then(|item| item.get("embedding"))
		})
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing a vector."))?;
	let mut vec = Vec::with_capacity(values.len());

	for value in values {
		let number =
			value.as_f64().ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))?;

		vec.push(number as f32);
	}

	if vec.is_empty() {
		return Err(eyre::eyre!("Embedding response vector is empty."));
	}

	Ok(vec)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_bare_vector() {
		let json = serde_json::json!({ "vector": [0.5, 1.5] });
		let parsed = parse_embedding_response(&json).expect("parse failed");

		assert_eq!(parsed, vec![0.5, 1.5]);
	}

	#[test]
	fn parses_openai_data_shape() {
		let json = serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [2.0, 3.0] }
			]
		});
		let parsed = parse_embedding_response(&json).expect("parse failed");

		assert_eq!(parsed, vec![2.0, 3.0]);
	}

	#[test]
	fn rejects_missing_or_non_numeric_vectors() {
		assert!(parse_embedding_response(&serde_json::json!({ "data": [] })).is_err());
		assert!(parse_embedding_response(&serde_json::json!({ "vector": [] })).is_err());
		assert!(parse_embedding_response(&serde_json::json!({ "vector": ["a"] })).is_err());
	}
}
