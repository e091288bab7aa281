use std::time::Instant;

use recall_domain::{
	grounding::{self, MAX_SNIPPET_CHARS},
	metadata::Metadata,
	scoring::{self, RankedResult, ScoreBreakdown, TemporalMode},
};
use recall_storage::queries::TenantFilter;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, RecallService, Result, retrieve::ChannelArgs};

/// Half-open or closed window over event dates. Both bounds absent means no
/// window was requested and ranking falls back to recency decay.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub start: Option<OffsetDateTime>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub end: Option<OffsetDateTime>,
}

impl TimeRange {
	pub fn is_bounded(&self) -> bool {
		self.start.is_some() || self.end.is_some()
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub user_id: String,
	pub container_id: String,
	pub query: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub candidate_multiplier: Option<u32>,
	#[serde(default)]
	pub layer: Option<String>,
	#[serde(default)]
	pub time_range: Option<TimeRange>,
	#[serde(default)]
	pub include_relationships: Option<bool>,
	#[serde(default)]
	pub use_profiles: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchItem {
	pub id: Uuid,
	pub snippet: String,
	pub layer: String,
	pub score: f32,
	pub breakdown: ScoreBreakdown,
	#[serde(with = "crate::time_serde::vec")]
	pub event_dates: Vec<OffsetDateTime>,
	pub metadata: Metadata,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub related_entities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Timings {
	pub vector_ms: u64,
	pub keyword_ms: u64,
	pub ranking_ms: u64,
	pub total_ms: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub items: Vec<SearchItem>,
	pub total_candidates: u32,
	pub applied_profile_count: u32,
	pub timings: Timings,
}

/// Ranked evidence plus the bookkeeping both public operations report.
pub(crate) struct RankedOutcome {
	pub(crate) results: Vec<RankedResult>,
	pub(crate) total_candidates: u32,
	pub(crate) applied_profile_count: u32,
	pub(crate) vector_ms: u64,
	pub(crate) keyword_ms: u64,
	pub(crate) ranking_ms: u64,
}

impl RecallService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let started = Instant::now();
		let include_relationships = req.include_relationships.unwrap_or(false);
		let outcome = self.ranked_results(&req).await?;
		let items = outcome
			.results
			.into_iter()
			.map(|result| SearchItem {
				id: result.id,
				snippet: grounding::excerpt(&result.content, MAX_SNIPPET_CHARS),
				layer: result.layer,
				score: scoring::round3(result.score),
				breakdown: result.breakdown.rounded(),
				event_dates: result.event_dates,
				related_entities: include_relationships
					.then(|| result.metadata.entities().to_vec()),
				metadata: result.metadata,
			})
			.collect();

		Ok(SearchResponse {
			items,
			total_candidates: outcome.total_candidates,
			applied_profile_count: outcome.applied_profile_count,
			timings: Timings {
				vector_ms: outcome.vector_ms,
				keyword_ms: outcome.keyword_ms,
				ranking_ms: outcome.ranking_ms,
				total_ms: started.elapsed().as_millis() as u64,
			},
		})
	}

	/// Shared retrieval and ranking pipeline behind both `search` and `answer`.
	pub(crate) async fn ranked_results(&self, req: &SearchRequest) -> Result<RankedOutcome> {
		let user_id = req.user_id.trim();
		let container_id = req.container_id.trim();
		let query = req.query.trim();

		if user_id.is_empty() || container_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "user_id and container_id are required.".to_string(),
			});
		}
		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let (top_k, candidate_limit) = plan_retrieval(req, &self.cfg.retrieval);
		let range = req.time_range.unwrap_or_default();
		let temporal = if range.is_bounded() {
			TemporalMode::Window { start: range.start, end: range.end }
		} else {
			TemporalMode::Recency { now: OffsetDateTime::now_utc() }
		};
		let retrieved = self
			.gather_candidates(&ChannelArgs {
				query,
				tenant: TenantFilter { user_id, container_id },
				layer: req.layer.as_deref(),
				start: range.start,
				end: range.end,
				candidate_limit,
				use_profiles: req.use_profiles.unwrap_or(true),
			})
			.await?;
		let total_candidates = retrieved.candidates.len() as u32;
		let applied_profile_count = retrieved.facts.len() as u32;
		let ranking_started = Instant::now();
		let results = scoring::rank(
			retrieved.candidates,
			&retrieved.facts,
			&temporal,
			&self.cfg.ranking,
			&self.cfg.profile,
			top_k as usize,
		);

		Ok(RankedOutcome {
			results,
			total_candidates,
			applied_profile_count,
			vector_ms: retrieved.vector_ms,
			keyword_ms: retrieved.keyword_ms,
			ranking_ms: ranking_started.elapsed().as_millis() as u64,
		})
	}
}

/// Effective `(top_k, candidate_limit)` for a request. Both caller overrides
/// are clamped to their configured ceilings, so an arbitrarily large
/// multiplier cannot overflow the limit arithmetic.
fn plan_retrieval(req: &SearchRequest, cfg: &recall_config::Retrieval) -> (u32, u32) {
	let top_k = req.top_k.unwrap_or(cfg.top_k).clamp(1, cfg.max_top_k);
	let multiplier = req
		.candidate_multiplier
		.unwrap_or(cfg.candidate_multiplier)
		.clamp(1, cfg.max_candidate_multiplier);

	(top_k, top_k.saturating_mul(multiplier))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn time_range_bounds() {
		let unbounded = TimeRange::default();
		let half: TimeRange =
			serde_json::from_str(r#"{ "start": "2026-03-01T00:00:00Z" }"#).expect("parse failed");

		assert!(!unbounded.is_bounded());
		assert!(half.is_bounded());
		assert!(half.end.is_none());
	}

	#[test]
	fn search_request_accepts_minimal_payload() {
		let req: SearchRequest = serde_json::from_str(
			r#"{ "user_id": "u1", "container_id": "c1", "query": "where did I park" }"#,
		)
		.expect("parse failed");

		assert_eq!(req.query, "where did I park");
		assert!(req.top_k.is_none());
	}

	fn request_with(top_k: Option<u32>, candidate_multiplier: Option<u32>) -> SearchRequest {
		SearchRequest {
			user_id: "u1".to_string(),
			container_id: "c1".to_string(),
			query: "where did I park".to_string(),
			top_k,
			candidate_multiplier,
			layer: None,
			time_range: None,
			include_relationships: None,
			use_profiles: None,
		}
	}

	#[test]
	fn retrieval_plan_uses_config_defaults() {
		let cfg = recall_config::Retrieval::default();

		assert_eq!(plan_retrieval(&request_with(None, None), &cfg), (10, 50));
	}

	#[test]
	fn hostile_multiplier_is_clamped_without_overflow() {
		let cfg = recall_config::Retrieval::default();
		let (top_k, limit) = plan_retrieval(&request_with(Some(50), Some(u32::MAX)), &cfg);

		assert_eq!(top_k, 50);
		assert_eq!(limit, 50 * cfg.max_candidate_multiplier);
	}
}
