use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn section_mut<'a>(root: &'a mut Value, name: &str) -> &'a mut toml::Table {
	root.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(name)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Template config must include [{name}]."))
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("recall_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_mutated(mutate: impl FnOnce(&mut Value)) -> recall_config::Result<recall_config::Config> {
	let mut value = sample_value();

	mutate(&mut value);

	let payload = toml::to_string(&value).expect("Failed to render template config.");
	let path = write_temp_config(payload);
	let result = recall_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

#[test]
fn template_config_is_valid() {
	let cfg = load_mutated(|_| {}).expect("Template config must validate.");

	assert_eq!(cfg.retrieval.top_k, 10);
	assert_eq!(cfg.gate.min_support_count, 2);
}

#[test]
fn defaults_apply_when_tuning_sections_are_absent() {
	let cfg = load_mutated(|root| {
		let table = root.as_table_mut().expect("Template config must be a table.");

		table.remove("retrieval");
		table.remove("ranking");
		table.remove("profile");
		table.remove("gate");
	})
	.expect("Config without tuning sections must validate.");

	assert_eq!(cfg.ranking.vector_weight, 0.45);
	assert_eq!(cfg.ranking.pin_bonus, 0.15);
	assert_eq!(cfg.gate.min_composite_score, 0.40);
	assert_eq!(cfg.gate.max_evidence_snippets, 5);
	assert_eq!(cfg.profile.expertise_boost, 0.15);
}

#[test]
fn ranking_weights_must_sum_to_one() {
	let err = load_mutated(|root| {
		let ranking = section_mut(root, "ranking");

		ranking.insert("vector_weight".to_string(), Value::Float(0.9));
	})
	.expect_err("Expected weight sum validation error.");

	assert!(
		err.to_string().contains("ranking weights must sum to 1.0."),
		"Unexpected error: {err}"
	);
}

#[test]
fn support_floor_must_not_exceed_composite_threshold() {
	let err = load_mutated(|root| {
		let gate = section_mut(root, "gate");

		gate.insert("min_support_score".to_string(), Value::Float(0.6));
	})
	.expect_err("Expected support floor validation error.");

	assert!(
		err.to_string()
			.contains("gate.min_support_score must not exceed gate.min_composite_score."),
		"Unexpected error: {err}"
	);
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let err = load_mutated(|root| {
		let storage = section_mut(root, "storage");
		let qdrant = storage
			.get_mut("qdrant")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [storage.qdrant].");

		qdrant.insert("vector_dim".to_string(), Value::Integer(768));
	})
	.expect_err("Expected vector dim validation error.");

	assert!(
		err.to_string()
			.contains("providers.embedding.dimensions must match storage.qdrant.vector_dim."),
		"Unexpected error: {err}"
	);
}

#[test]
fn generation_fallback_is_optional() {
	let cfg = load_mutated(|root| {
		let providers = section_mut(root, "providers");

		providers.remove("generation_fallback");
	})
	.expect("Config without a generation fallback must validate.");

	assert!(cfg.providers.generation_fallback.is_none());
}

#[test]
fn empty_fallback_api_base_is_normalized_away() {
	let cfg = load_mutated(|root| {
		let providers = section_mut(root, "providers");
		let fallback = providers
			.get_mut("generation_fallback")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [providers.generation_fallback].");

		fallback.insert("api_base".to_string(), Value::String("  ".to_string()));
	})
	.expect("Blank fallback must be dropped by normalization.");

	assert!(cfg.providers.generation_fallback.is_none());
}

#[test]
fn multiplier_ceiling_must_cover_the_default_multiplier() {
	let err = load_mutated(|root| {
		let retrieval = section_mut(root, "retrieval");

		retrieval.insert("max_candidate_multiplier".to_string(), Value::Integer(2));
	})
	.expect_err("Expected multiplier ceiling validation error.");

	assert!(
		err.to_string().contains(
			"retrieval.max_candidate_multiplier must be at least retrieval.candidate_multiplier."
		),
		"Unexpected error: {err}"
	);
}

#[test]
fn channel_timeout_must_be_positive() {
	let err = load_mutated(|root| {
		let retrieval = section_mut(root, "retrieval");

		retrieval.insert("channel_timeout_ms".to_string(), Value::Integer(0));
	})
	.expect_err("Expected channel timeout validation error.");

	assert!(
		err.to_string().contains("retrieval.channel_timeout_ms must be greater than zero."),
		"Unexpected error: {err}"
	);
}
