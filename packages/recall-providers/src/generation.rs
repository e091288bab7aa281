use color_eyre::{Result, eyre};
use serde_json::Value;

use crate::{http_client, request_headers};

/// One chat completion against an OpenAI-style endpoint. Returns the raw
/// completion text; interpreting sentinels and citations is the caller's job.
pub async fn generate(
	cfg: &recall_config::GenerationProviderConfig,
	system: &str,
	prompt: &str,
) -> Result<String> {
	let client = http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": system },
			{ "role": "user", "content": prompt },
		],
	});
	let res = client
		.post(url)
		.headers(request_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion_text(json)
}

fn parse_completion_text(json: Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| eyre::eyre!("Completion response is missing message content."))?;

	Ok(content.to_string())
}
