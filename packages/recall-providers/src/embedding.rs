use color_eyre::{Result, eyre};
use serde::Deserialize;

use crate::{http_client, request_headers};

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
	#[serde(default)]
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// One batch embedding call against an OpenAI-style endpoint. Output vectors
/// come back aligned with the input texts regardless of response order.
pub async fn embed(
	cfg: &recall_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let response = client
		.post(url)
		.headers(request_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?
		.json::<EmbeddingResponse>()
		.await?;

	order_embeddings(response, texts.len())
}

fn order_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected {
		return Err(eyre::eyre!(
			"Embedding response returned {} vectors for {expected} inputs.",
			response.data.len()
		));
	}

	let mut rows: Vec<(usize, Vec<f32>)> = response
		.data
		.into_iter()
		.enumerate()
		.map(|(position, row)| (row.index.unwrap_or(position), row.embedding))
		.collect();

	rows.sort_by_key(|(index, _)| *index);

	Ok(rows.into_iter().map(|(_, embedding)| embedding).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(payload: serde_json::Value) -> EmbeddingResponse {
		serde_json::from_value(payload).expect("parse failed")
	}

	#[test]
	fn vectors_are_reordered_by_their_index() {
		let parsed = order_embeddings(
			response(serde_json::json!({
				"data": [
					{ "index": 1, "embedding": [2.0, 3.0] },
					{ "index": 0, "embedding": [0.5, 1.5] }
				]
			})),
			2,
		)
		.expect("ordering failed");

		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn response_position_stands_in_for_a_missing_index() {
		let parsed = order_embeddings(
			response(serde_json::json!({
				"data": [
					{ "embedding": [0.5] },
					{ "embedding": [1.5] }
				]
			})),
			2,
		)
		.expect("ordering failed");

		assert_eq!(parsed, vec![vec![0.5], vec![1.5]]);
	}

	#[test]
	fn vector_count_must_match_the_input_count() {
		let short = response(serde_json::json!({
			"data": [{ "index": 0, "embedding": [0.5] }]
		}));

		assert!(order_embeddings(short, 2).is_err());
	}

	#[test]
	fn payloads_without_data_fail_to_parse() {
		let payload = serde_json::json!({ "error": "rate limited" });

		assert!(serde_json::from_value::<EmbeddingResponse>(payload).is_err());
	}
}
