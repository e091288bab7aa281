use std::time::Instant;

use recall_domain::{
	gate::{self, GateDecision, GateReason, GateStatus, MissingSignal, SuggestedAction},
	grounding::{self, EvidenceSnippet, GroundedResponse, GroundingStatus},
	scoring::{self, RankedResult},
};

use crate::{
	RecallService, Result,
	search::{SearchRequest, Timings},
	synthesize,
};

const INSUFFICIENT_MESSAGE: &str =
	"The stored memories don't contain enough evidence to answer this.";
const CONFLICT_MESSAGE: &str = "The stored memories conflict on this question.";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnswerRequest {
	#[serde(flatten)]
	pub search: SearchRequest,
	/// Skip the generation call and return gated evidence only when `false`.
	#[serde(default)]
	pub generate_answer: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GatedAnswer {
	pub status: GateStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<GateReason>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub composite_score: Option<f32>,
	pub support_count: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub answer: Option<String>,
	pub citations: Vec<String>,
	pub evidence: Vec<EvidenceSnippet>,
	pub missing_signals: Vec<MissingSignal>,
	pub suggested_actions: Vec<SuggestedAction>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	pub timings: Timings,
}

impl RecallService {
	/// Evidence-gated question answering: retrieval and ranking feed the gate,
	/// and only a grounded result set ever reaches the generation provider.
	pub async fn guarded_answer(&self, req: AnswerRequest) -> Result<GatedAnswer> {
		let started = Instant::now();
		let outcome = self.ranked_results(&req.search).await?;
		let decision =
			gate::evaluate(&outcome.results, req.search.query.trim(), &self.cfg.gate);
		let timings = Timings {
			vector_ms: outcome.vector_ms,
			keyword_ms: outcome.keyword_ms,
			ranking_ms: outcome.ranking_ms,
			total_ms: started.elapsed().as_millis() as u64,
		};

		let evidence =
			rounded_evidence(&outcome.results, self.cfg.gate.max_evidence_snippets as usize);

		if decision.status != GateStatus::Grounded {
			return Ok(gated_refusal(decision, evidence, timings));
		}

		let mut response = GatedAnswer {
			status: GateStatus::Grounded,
			reason: None,
			composite_score: decision.composite_score.map(scoring::round3),
			support_count: decision.support_count,
			answer: None,
			citations: Vec::new(),
			evidence,
			missing_signals: Vec::new(),
			suggested_actions: Vec::new(),
			message: None,
			timings,
		};

		if !req.generate_answer.unwrap_or(true) {
			return Ok(response);
		}

		let grounded = synthesize::synthesize(
			&self.providers,
			&self.cfg.providers,
			req.search.query.trim(),
			&response.evidence,
		)
		.await;

		apply_synthesis(&mut response, grounded);

		response.timings.total_ms = started.elapsed().as_millis() as u64;

		Ok(response)
	}
}

/// Numbered evidence snippets with display-rounded scores. Refusals carry
/// these too, so a caller can see what the gate weighed.
fn rounded_evidence(results: &[RankedResult], max_snippets: usize) -> Vec<EvidenceSnippet> {
	grounding::build_evidence(results, max_snippets)
		.into_iter()
		.map(|snippet| EvidenceSnippet {
			score: scoring::round3(snippet.score),
			breakdown: snippet.breakdown.rounded(),
			..snippet
		})
		.collect()
}

fn gated_refusal(
	decision: GateDecision,
	evidence: Vec<EvidenceSnippet>,
	timings: Timings,
) -> GatedAnswer {
	GatedAnswer {
		status: decision.status,
		reason: decision.reason,
		composite_score: decision.composite_score.map(scoring::round3),
		support_count: decision.support_count,
		answer: None,
		citations: Vec::new(),
		evidence,
		missing_signals: decision.missing_signals,
		suggested_actions: decision.suggested_actions,
		message: decision.message,
		timings,
	}
}

/// Folds the synthesizer outcome into the gated response. A refusal after the
/// gate passed stays a refusal; the gate's grounding never overrides it.
fn apply_synthesis(response: &mut GatedAnswer, grounded: GroundedResponse) {
	match grounded.status {
		GroundingStatus::Grounded => {
			response.answer = grounded.answer;
			response.citations = grounded.citations;
		},
		GroundingStatus::InsufficientEvidence => {
			response.status = GateStatus::ActionableUncertainty;
			response.message = Some(INSUFFICIENT_MESSAGE.to_string());
		},
		GroundingStatus::ConflictingEvidence => {
			response.status = GateStatus::ConflictingEvidence;
			response.citations = grounded.citations;
			response.message = Some(CONFLICT_MESSAGE.to_string());
		},
	}
}

#[cfg(test)]
mod tests {
	use recall_domain::{metadata::Metadata, scoring::ScoreBreakdown};
	use time::macros::datetime;
	use uuid::Uuid;

	use super::*;

	fn ranked(content: &str, score: f32) -> RankedResult {
		RankedResult {
			id: Uuid::new_v4(),
			content: content.to_string(),
			score,
			breakdown: ScoreBreakdown { vector: score, ..Default::default() },
			event_dates: vec![datetime!(2026-03-01 09:00 UTC)],
			layer: "events".to_string(),
			metadata: Metadata::default(),
		}
	}

	#[test]
	fn single_source_refusal_carries_its_evidence() {
		let cfg = recall_config::Gate::default();
		let results = vec![ranked("Parked on Elm Street.", 0.52), ranked("Bought groceries.", 0.14)];
		let decision = gate::evaluate(&results, "where did I park", &cfg);
		let evidence = rounded_evidence(&results, cfg.max_evidence_snippets as usize);
		let timings = Timings { vector_ms: 1, keyword_ms: 1, ranking_ms: 0, total_ms: 2 };
		let refusal = gated_refusal(decision, evidence, timings);

		assert_eq!(refusal.reason, Some(GateReason::SingleSource));
		assert!(refusal.answer.is_none());
		assert_eq!(refusal.evidence.len(), 2);
		assert_eq!(refusal.evidence[0].marker, "[1]");
	}

	fn grounded_base() -> GatedAnswer {
		GatedAnswer {
			status: GateStatus::Grounded,
			reason: None,
			composite_score: Some(0.6),
			support_count: 3,
			answer: None,
			citations: Vec::new(),
			evidence: Vec::new(),
			missing_signals: Vec::new(),
			suggested_actions: Vec::new(),
			message: None,
			timings: Timings { vector_ms: 1, keyword_ms: 1, ranking_ms: 0, total_ms: 2 },
		}
	}

	#[test]
	fn request_flattens_search_fields() {
		let req: AnswerRequest = serde_json::from_str(
			r#"{ "user_id": "u1", "container_id": "c1", "query": "where did I park",
			     "generate_answer": false }"#,
		)
		.expect("parse failed");

		assert_eq!(req.search.user_id, "u1");
		assert_eq!(req.generate_answer, Some(false));
	}

	#[test]
	fn grounded_synthesis_fills_answer_and_citations() {
		let mut response = grounded_base();

		apply_synthesis(&mut response, GroundedResponse {
			status: GroundingStatus::Grounded,
			answer: Some("On Elm Street [1].".to_string()),
			citations: vec!["[1]".to_string()],
		});

		assert_eq!(response.status, GateStatus::Grounded);
		assert_eq!(response.answer.as_deref(), Some("On Elm Street [1]."));
		assert_eq!(response.citations, vec!["[1]".to_string()]);
	}

	#[test]
	fn model_refusal_demotes_a_gated_pass() {
		let mut response = grounded_base();

		apply_synthesis(&mut response, GroundedResponse {
			status: GroundingStatus::InsufficientEvidence,
			answer: None,
			citations: Vec::new(),
		});

		assert_eq!(response.status, GateStatus::ActionableUncertainty);
		assert!(response.answer.is_none());
		assert_eq!(response.message.as_deref(), Some(INSUFFICIENT_MESSAGE));
	}

	#[test]
	fn conflicting_synthesis_reports_the_markers() {
		let mut response = grounded_base();

		apply_synthesis(&mut response, GroundedResponse {
			status: GroundingStatus::ConflictingEvidence,
			answer: None,
			citations: vec!["[1]".to_string(), "[2]".to_string()],
		});

		assert_eq!(response.status, GateStatus::ConflictingEvidence);
		assert_eq!(response.citations.len(), 2);
		assert_eq!(response.message.as_deref(), Some(CONFLICT_MESSAGE));
	}
}
