pub mod embedding;
pub mod generation;

use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};

pub(crate) fn http_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

/// Bearer auth plus any per-provider extras from the config. Extra header
/// values must be strings; anything else in the config map is rejected.
pub(crate) fn request_headers(api_key: &str, extra: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::with_capacity(extra.len() + 1);

	headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {api_key}"))?);

	for (name, value) in extra {
		let text = value
			.as_str()
			.ok_or_else(|| eyre::eyre!("Header {name} must be a string value."))?;

		headers.insert(HeaderName::from_bytes(name.as_bytes())?, text.parse()?);
	}

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bearer_token_and_extras_land_in_the_header_map() {
		let mut extra = Map::new();

		extra.insert("X-Title".to_string(), Value::String("recall".to_string()));

		let headers = request_headers("k", &extra).expect("header build failed");

		assert_eq!(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()), Some("Bearer k"));
		assert_eq!(headers.get("X-Title").and_then(|v| v.to_str().ok()), Some("recall"));
	}

	#[test]
	fn non_string_extra_values_are_rejected() {
		let mut extra = Map::new();

		extra.insert("X-Retry".to_string(), Value::Bool(true));

		assert!(request_headers("k", &extra).is_err());
	}
}
