use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub profile: Profile,
	#[serde(default)]
	pub gate: Gate,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generation_primary: GenerationProviderConfig,
	/// Optional. Tried when the primary provider fails or times out.
	pub generation_fallback: Option<GenerationProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct GenerationProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
	pub max_top_k: u32,
	pub candidate_multiplier: u32,
	pub max_candidate_multiplier: u32,
	pub channel_timeout_ms: u64,
	pub keyword: KeywordScoring,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k: 10,
			max_top_k: 50,
			candidate_multiplier: 5,
			max_candidate_multiplier: 20,
			channel_timeout_ms: 2_000,
			keyword: KeywordScoring::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KeywordScoring {
	pub k1: f32,
	pub b: f32,
}
impl Default for KeywordScoring {
	fn default() -> Self {
		Self { k1: 1.2, b: 0.75 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub vector_weight: f32,
	pub keyword_weight: f32,
	pub temporal_weight: f32,
	pub profile_weight: f32,
	pub importance_weight: f32,
	/// Additive bonus for pinned records, outside the normalized weight budget.
	pub pin_bonus: f32,
	pub min_score: f32,
	pub recency_lambda: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			vector_weight: 0.45,
			keyword_weight: 0.20,
			temporal_weight: 0.15,
			profile_weight: 0.10,
			importance_weight: 0.10,
			pin_bonus: 0.15,
			min_score: 0.10,
			recency_lambda: 0.01,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Profile {
	pub preference_content_boost: f32,
	pub preference_tag_boost: f32,
	pub expertise_boost: f32,
	pub max_boost: f32,
}
impl Default for Profile {
	fn default() -> Self {
		Self {
			preference_content_boost: 0.3,
			preference_tag_boost: 0.2,
			expertise_boost: 0.15,
			max_boost: 1.0,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Gate {
	pub min_composite_score: f32,
	pub min_support_count: u32,
	pub min_support_score: f32,
	pub max_evidence_snippets: u32,
}
impl Default for Gate {
	fn default() -> Self {
		Self {
			min_composite_score: 0.40,
			min_support_count: 2,
			min_support_score: 0.15,
			max_evidence_snippets: 5,
		}
	}
}
