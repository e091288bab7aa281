use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::metadata::Metadata;

/// A memory record under consideration for one query. Built per request from
/// the merged retrieval channels plus enrichment; never persisted.
#[derive(Debug, Clone)]
pub struct SearchCandidate {
	pub id: Uuid,
	pub content: String,
	/// Raw vector-channel score, 0.0 when the candidate came from keyword only.
	pub vector_score: f32,
	/// Raw keyword-channel score, 0.0 when the candidate came from vector only.
	pub keyword_score: f32,
	pub event_dates: Vec<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub layer: String,
	pub importance: f32,
	pub pinned: bool,
	pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileFact {
	pub key: String,
	pub value: String,
	pub confidence: f32,
	pub category: String,
}

/// Temporal scoring mode, chosen by caller intent rather than inferred from
/// the data: an explicit time window scores event-date containment, no window
/// scores recency decay from an injected `now`.
#[derive(Debug, Clone, Copy)]
pub enum TemporalMode {
	Window { start: Option<OffsetDateTime>, end: Option<OffsetDateTime> },
	Recency { now: OffsetDateTime },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
	pub vector: f32,
	pub keyword: f32,
	pub temporal: f32,
	pub profile: f32,
	pub importance: f32,
	pub pin: f32,
}

impl ScoreBreakdown {
	pub fn total(&self) -> f32 {
		self.vector + self.keyword + self.temporal + self.profile + self.importance + self.pin
	}

	pub fn rounded(&self) -> Self {
		Self {
			vector: round3(self.vector),
			keyword: round3(self.keyword),
			temporal: round3(self.temporal),
			profile: round3(self.profile),
			importance: round3(self.importance),
			pin: round3(self.pin),
		}
	}
}

#[derive(Debug, Clone)]
pub struct RankedResult {
	pub id: Uuid,
	pub content: String,
	pub score: f32,
	pub breakdown: ScoreBreakdown,
	pub event_dates: Vec<OffsetDateTime>,
	pub layer: String,
	pub metadata: Metadata,
}

pub fn round3(value: f32) -> f32 {
	(value * 1_000.0).round() / 1_000.0
}

/// Min/max rescale of one channel's raw scores into [0, 1] over the current
/// batch. A degenerate batch where every raw score ties maps to exactly 0.5.
pub fn normalize_channel(raw: &[f32]) -> Vec<f32> {
	let Some(first) = raw.first().copied() else {
		return Vec::new();
	};
	let (min, max) = raw.iter().fold((first, first), |(min, max), &value| {
		(min.min(value), max.max(value))
	});
	let span = max - min;

	if span <= f32::EPSILON {
		return vec![0.5; raw.len()];
	}

	raw.iter().map(|&value| (value - min) / span).collect()
}

pub fn temporal_score(
	event_dates: &[OffsetDateTime],
	created_at: OffsetDateTime,
	mode: &TemporalMode,
	recency_lambda: f32,
) -> f32 {
	match mode {
		TemporalMode::Window { start, end } => {
			if event_dates.is_empty() {
				return 0.3;
			}

			let inside = event_dates.iter().any(|date| {
				start.map(|bound| *date >= bound).unwrap_or(true)
					&& end.map(|bound| *date <= bound).unwrap_or(true)
			});

			if inside { 1.0 } else { 0.1 }
		},
		TemporalMode::Recency { now } => {
			let age_days = ((*now - created_at).as_seconds_f32() / 86_400.0).max(0.0);

			(-recency_lambda * age_days).exp()
		},
	}
}

/// Confidence-weighted affinity between a candidate and the tenant's profile
/// facts. Preference values are matched against content first, then tags;
/// expertise areas match either. Capped at `cfg.max_boost`.
pub fn profile_boost(
	content: &str,
	tags: &[String],
	facts: &[ProfileFact],
	cfg: &recall_config::Profile,
) -> f32 {
	if facts.is_empty() {
		return 0.0;
	}

	let content = content.to_lowercase();
	let tags: Vec<String> = tags.iter().map(|tag| tag.to_lowercase()).collect();
	let mut boost = 0.0_f32;

	for fact in facts {
		let value = fact.value.trim().to_lowercase();

		if value.is_empty() {
			continue;
		}

		let confidence = fact.confidence.clamp(0.0, 1.0);

		match fact.category.as_str() {
			"preference" => {
				if content.contains(&value) {
					boost += cfg.preference_content_boost * confidence;
				} else if tags.iter().any(|tag| tag.contains(&value)) {
					boost += cfg.preference_tag_boost * confidence;
				}
			},
			"context:expertise_areas" => {
				if content.contains(&value) || tags.iter().any(|tag| tag.contains(&value)) {
					boost += cfg.expertise_boost * confidence;
				}
			},
			_ => {},
		}
	}

	boost.min(cfg.max_boost)
}

/// Normalizes both channels over the batch, applies temporal, profile,
/// importance, and pin contributions, then drops below-floor candidates and
/// truncates to `top_k`. Ordering is deterministic: score descending with the
/// record id as tie-breaker.
pub fn rank(
	candidates: Vec<SearchCandidate>,
	facts: &[ProfileFact],
	temporal: &TemporalMode,
	ranking: &recall_config::Ranking,
	profile: &recall_config::Profile,
	top_k: usize,
) -> Vec<RankedResult> {
	if candidates.is_empty() {
		return Vec::new();
	}

	let vector_raw: Vec<f32> = candidates.iter().map(|candidate| candidate.vector_score).collect();
	let keyword_raw: Vec<f32> =
		candidates.iter().map(|candidate| candidate.keyword_score).collect();
	let vector_norm = normalize_channel(&vector_raw);
	let keyword_norm = normalize_channel(&keyword_raw);

	let mut results: Vec<RankedResult> = Vec::with_capacity(candidates.len());

	for (index, candidate) in candidates.into_iter().enumerate() {
		let temporal_value = temporal_score(
			&candidate.event_dates,
			candidate.created_at,
			temporal,
			ranking.recency_lambda,
		);
		let profile_value =
			profile_boost(&candidate.content, candidate.metadata.tags(), facts, profile);
		let breakdown = ScoreBreakdown {
			vector: ranking.vector_weight * vector_norm[index],
			keyword: ranking.keyword_weight * keyword_norm[index],
			temporal: ranking.temporal_weight * temporal_value,
			profile: ranking.profile_weight * profile_value,
			importance: ranking.importance_weight * candidate.importance.clamp(0.0, 1.0),
			pin: if candidate.pinned { ranking.pin_bonus } else { 0.0 },
		};
		let score = breakdown.total();

		if score < ranking.min_score {
			continue;
		}

		results.push(RankedResult {
			id: candidate.id,
			content: candidate.content,
			score,
			breakdown,
			event_dates: candidate.event_dates,
			layer: candidate.layer,
			metadata: candidate.metadata,
		});
	}

	results.sort_by(|a, b| {
		b.score
			.partial_cmp(&a.score)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| a.id.cmp(&b.id))
	});
	results.truncate(top_k);

	results
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	fn candidate(id: u128, vector: f32, keyword: f32) -> SearchCandidate {
		SearchCandidate {
			id: Uuid::from_u128(id),
			content: format!("memory {id}"),
			vector_score: vector,
			keyword_score: keyword,
			event_dates: Vec::new(),
			created_at: datetime!(2026-01-01 00:00 UTC),
			layer: "episodic".to_string(),
			importance: 0.5,
			pinned: false,
			metadata: Metadata::default(),
		}
	}

	fn ranking_cfg() -> recall_config::Ranking {
		recall_config::Ranking::default()
	}

	fn profile_cfg() -> recall_config::Profile {
		recall_config::Profile::default()
	}

	#[test]
	fn normalized_scores_stay_in_unit_interval() {
		let normalized = normalize_channel(&[0.9, 0.1, 0.4, 0.7]);

		assert_eq!(normalized.len(), 4);
		for value in &normalized {
			assert!((0.0..=1.0).contains(value), "out of range: {value}");
		}
		assert_eq!(normalized[0], 1.0);
		assert_eq!(normalized[1], 0.0);
	}

	#[test]
	fn equal_raw_scores_normalize_to_exactly_half() {
		assert_eq!(normalize_channel(&[0.42, 0.42, 0.42]), vec![0.5, 0.5, 0.5]);
	}

	#[test]
	fn empty_channel_normalizes_to_empty() {
		assert!(normalize_channel(&[]).is_empty());
	}

	#[test]
	fn window_mode_scores_containment() {
		let mode = TemporalMode::Window {
			start: Some(datetime!(2026-03-01 00:00 UTC)),
			end: Some(datetime!(2026-03-31 23:59 UTC)),
		};
		let created = datetime!(2026-01-01 00:00 UTC);

		let inside = temporal_score(&[datetime!(2026-03-15 12:00 UTC)], created, &mode, 0.01);
		let outside = temporal_score(&[datetime!(2026-05-01 12:00 UTC)], created, &mode, 0.01);
		let undated = temporal_score(&[], created, &mode, 0.01);

		assert_eq!(inside, 1.0);
		assert_eq!(outside, 0.1);
		assert_eq!(undated, 0.3);
	}

	#[test]
	fn recency_mode_decays_with_age() {
		let now = datetime!(2026-03-12 00:00 UTC);
		let fresh = temporal_score(&[], datetime!(2026-03-11 00:00 UTC), &TemporalMode::Recency { now }, 0.01);
		let seventy_days =
			temporal_score(&[], datetime!(2026-01-01 00:00 UTC), &TemporalMode::Recency { now }, 0.01);

		assert!(fresh > 0.98);
		// About one half-life at lambda 0.01.
		assert!((seventy_days - 0.5).abs() < 0.02, "got {seventy_days}");
	}

	#[test]
	fn profile_boost_is_capped() {
		let facts: Vec<ProfileFact> = (0..10)
			.map(|index| ProfileFact {
				key: format!("pref_{index}"),
				value: "coffee".to_string(),
				confidence: 1.0,
				category: "preference".to_string(),
			})
			.collect();
		let boost = profile_boost("I always order coffee.", &[], &facts, &profile_cfg());

		assert_eq!(boost, 1.0);
	}

	#[test]
	fn expertise_facts_match_tags() {
		let facts = vec![ProfileFact {
			key: "expertise".to_string(),
			value: "databases".to_string(),
			confidence: 0.8,
			category: "context:expertise_areas".to_string(),
		}];
		let tags = vec!["databases".to_string()];
		let boost = profile_boost("unrelated text", &tags, &facts, &profile_cfg());

		assert!((boost - 0.12).abs() < 1e-6, "got {boost}");
	}

	#[test]
	fn breakdown_components_sum_to_score() {
		let now = datetime!(2026-03-12 00:00 UTC);
		let mut candidates = vec![candidate(1, 0.9, 0.2), candidate(2, 0.3, 0.8)];

		candidates[0].pinned = true;

		let results = rank(
			candidates,
			&[],
			&TemporalMode::Recency { now },
			&ranking_cfg(),
			&profile_cfg(),
			10,
		);

		assert!(!results.is_empty());
		for result in &results {
			assert!(
				(result.breakdown.total() - result.score).abs() < 1e-6,
				"breakdown does not sum to score"
			);
		}
	}

	#[test]
	fn pin_bonus_is_additive_outside_the_weight_budget() {
		let now = datetime!(2026-03-12 00:00 UTC);
		let unpinned = rank(
			vec![candidate(1, 0.5, 0.5), candidate(2, 0.1, 0.1)],
			&[],
			&TemporalMode::Recency { now },
			&ranking_cfg(),
			&profile_cfg(),
			10,
		);
		let mut pinned_input = vec![candidate(1, 0.5, 0.5), candidate(2, 0.1, 0.1)];

		pinned_input[0].pinned = true;

		let pinned = rank(
			pinned_input,
			&[],
			&TemporalMode::Recency { now },
			&ranking_cfg(),
			&profile_cfg(),
			10,
		);
		let base = unpinned.iter().find(|result| result.id == Uuid::from_u128(1)).unwrap();
		let boosted = pinned.iter().find(|result| result.id == Uuid::from_u128(1)).unwrap();

		assert!((boosted.score - base.score - 0.15).abs() < 1e-6);
		assert_eq!(boosted.breakdown.pin, 0.15);
	}

	#[test]
	fn results_below_floor_are_dropped_and_rest_truncated() {
		let now = datetime!(2026-03-12 00:00 UTC);
		let mut cfg = ranking_cfg();

		cfg.min_score = 0.5;

		let results = rank(
			vec![candidate(1, 0.9, 0.9), candidate(2, 0.5, 0.5), candidate(3, 0.0, 0.0)],
			&[],
			&TemporalMode::Recency { now },
			&cfg,
			&profile_cfg(),
			1,
		);

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].id, Uuid::from_u128(1));
		assert!(results[0].score >= 0.5);
	}

	#[test]
	fn ranking_is_deterministic_across_runs() {
		let now = datetime!(2026-03-12 00:00 UTC);
		let input = || {
			vec![
				candidate(3, 0.4, 0.4),
				candidate(1, 0.4, 0.4),
				candidate(2, 0.9, 0.1),
			]
		};
		let first = rank(
			input(),
			&[],
			&TemporalMode::Recency { now },
			&ranking_cfg(),
			&profile_cfg(),
			10,
		);
		let second = rank(
			input(),
			&[],
			&TemporalMode::Recency { now },
			&ranking_cfg(),
			&profile_cfg(),
			10,
		);
		let first_ids: Vec<Uuid> = first.iter().map(|result| result.id).collect();
		let second_ids: Vec<Uuid> = second.iter().map(|result| result.id).collect();

		assert_eq!(first_ids, second_ids);
		// Tied scores order by id.
		assert!(first_ids.contains(&Uuid::from_u128(1)));
	}
}
