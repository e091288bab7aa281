mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Gate, GenerationProviderConfig, KeywordScoring, Postgres,
	Profile, Providers, Qdrant, Ranking, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

/// Ranking weights must sum to 1.0 within this slack. The pin bonus sits
/// outside the budget and is not part of the sum.
const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.max_top_k < cfg.retrieval.top_k {
		return Err(Error::Validation {
			message: "retrieval.max_top_k must be at least retrieval.top_k.".to_string(),
		});
	}
	if cfg.retrieval.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.max_candidate_multiplier < cfg.retrieval.candidate_multiplier {
		return Err(Error::Validation {
			message: "retrieval.max_candidate_multiplier must be at least \
				retrieval.candidate_multiplier."
				.to_string(),
		});
	}
	if cfg.retrieval.channel_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "retrieval.channel_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.keyword.k1 <= 0.0 || !cfg.retrieval.keyword.k1.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.keyword.k1 must be a positive finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.keyword.b) {
		return Err(Error::Validation {
			message: "retrieval.keyword.b must be in the range 0.0-1.0.".to_string(),
		});
	}

	let weights = [
		("ranking.vector_weight", cfg.ranking.vector_weight),
		("ranking.keyword_weight", cfg.ranking.keyword_weight),
		("ranking.temporal_weight", cfg.ranking.temporal_weight),
		("ranking.profile_weight", cfg.ranking.profile_weight),
		("ranking.importance_weight", cfg.ranking.importance_weight),
	];

	for (label, weight) in weights {
		if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number in the range 0.0-1.0."),
			});
		}
	}

	let weight_sum: f32 = weights.iter().map(|(_, weight)| weight).sum();

	if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::Validation {
			message: "ranking weights must sum to 1.0.".to_string(),
		});
	}
	if !cfg.ranking.pin_bonus.is_finite() || cfg.ranking.pin_bonus < 0.0 {
		return Err(Error::Validation {
			message: "ranking.pin_bonus must be zero or greater.".to_string(),
		});
	}
	if !cfg.ranking.min_score.is_finite() || cfg.ranking.min_score < 0.0 {
		return Err(Error::Validation {
			message: "ranking.min_score must be zero or greater.".to_string(),
		});
	}
	if !cfg.ranking.recency_lambda.is_finite() || cfg.ranking.recency_lambda <= 0.0 {
		return Err(Error::Validation {
			message: "ranking.recency_lambda must be a positive finite number.".to_string(),
		});
	}

	for (label, boost) in [
		("profile.preference_content_boost", cfg.profile.preference_content_boost),
		("profile.preference_tag_boost", cfg.profile.preference_tag_boost),
		("profile.expertise_boost", cfg.profile.expertise_boost),
		("profile.max_boost", cfg.profile.max_boost),
	] {
		if !boost.is_finite() || boost < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be zero or greater."),
			});
		}
	}

	if !(0.0..=1.0).contains(&cfg.gate.min_composite_score) {
		return Err(Error::Validation {
			message: "gate.min_composite_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.gate.min_support_count == 0 {
		return Err(Error::Validation {
			message: "gate.min_support_count must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.gate.min_support_score) {
		return Err(Error::Validation {
			message: "gate.min_support_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	// The support floor stays below the composite threshold so corroboration can
	// refuse a single confident result.
	if cfg.gate.min_support_score > cfg.gate.min_composite_score {
		return Err(Error::Validation {
			message: "gate.min_support_score must not exceed gate.min_composite_score.".to_string(),
		});
	}
	if cfg.gate.max_evidence_snippets == 0 {
		return Err(Error::Validation {
			message: "gate.max_evidence_snippets must be greater than zero.".to_string(),
		});
	}

	let mut generation = vec![("generation_primary", &cfg.providers.generation_primary)];

	if let Some(fallback) = cfg.providers.generation_fallback.as_ref() {
		generation.push(("generation_fallback", fallback));
	}
	for (label, provider) in generation {
		if provider.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
		if provider.timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("Provider {label} timeout_ms must be greater than zero."),
			});
		}
		if !provider.temperature.is_finite() || provider.temperature < 0.0 {
			return Err(Error::Validation {
				message: format!("Provider {label} temperature must be zero or greater."),
			});
		}
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "Provider embedding timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if let Some(fallback) = cfg.providers.generation_fallback.as_ref()
		&& fallback.api_base.trim().is_empty()
	{
		cfg.providers.generation_fallback = None;
	}
}
