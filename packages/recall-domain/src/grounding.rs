use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::scoring::{RankedResult, ScoreBreakdown};

/// Literal sentinel the model must emit when no claim is supportable.
pub const INSUFFICIENT_EVIDENCE: &str = "INSUFFICIENT_EVIDENCE";
/// Literal sentinel the model must emit when snippets disagree.
pub const CONFLICTING_EVIDENCE: &str = "CONFLICTING_EVIDENCE";

pub const MAX_SNIPPET_CHARS: usize = 400;

/// Bounded excerpt of a ranked result exposed to the generation step, keyed by
/// a stable citation marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnippet {
	pub marker: String,
	pub id: Uuid,
	pub excerpt: String,
	#[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
	pub event_date: Option<OffsetDateTime>,
	pub score: f32,
	pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroundingStatus {
	Grounded,
	InsufficientEvidence,
	ConflictingEvidence,
}

#[derive(Debug, Clone)]
pub struct GroundedResponse {
	pub status: GroundingStatus,
	pub answer: Option<String>,
	pub citations: Vec<String>,
}

/// Derives evidence snippets 1:1 from the leading ranked results. Markers are
/// one-based so they read naturally in a cited answer.
pub fn build_evidence(results: &[RankedResult], max_snippets: usize) -> Vec<EvidenceSnippet> {
	results
		.iter()
		.take(max_snippets)
		.enumerate()
		.map(|(index, result)| EvidenceSnippet {
			marker: format!("[{}]", index + 1),
			id: result.id,
			excerpt: excerpt(&result.content, MAX_SNIPPET_CHARS),
			event_date: result.event_dates.first().copied(),
			score: result.score,
			breakdown: result.breakdown,
		})
		.collect()
}

/// Character-bounded excerpt of record content, safe for prompt embedding.
pub fn excerpt(content: &str, max_chars: usize) -> String {
	if content.chars().count() <= max_chars {
		return content.to_string();
	}

	content.chars().take(max_chars).collect()
}

/// Normalizes a raw completion into a typed outcome. Malformed or empty output
/// becomes `InsufficientEvidence`; this function never fails.
pub fn parse_grounded_response(raw: &str) -> GroundedResponse {
	let text = raw.trim();

	if text.is_empty() || text.starts_with(INSUFFICIENT_EVIDENCE) {
		return GroundedResponse {
			status: GroundingStatus::InsufficientEvidence,
			answer: None,
			citations: Vec::new(),
		};
	}
	if text.contains(CONFLICTING_EVIDENCE) {
		return GroundedResponse {
			status: GroundingStatus::ConflictingEvidence,
			answer: None,
			citations: extract_markers(text),
		};
	}

	GroundedResponse {
		status: GroundingStatus::Grounded,
		answer: Some(text.to_string()),
		citations: extract_markers(text),
	}
}

/// All bracketed markers in first-appearance order, deduplicated.
fn extract_markers(text: &str) -> Vec<String> {
	let Ok(pattern) = Regex::new(r"\[\d+\]") else {
		return Vec::new();
	};
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for found in pattern.find_iter(text) {
		let marker = found.as_str().to_string();

		if seen.insert(marker.clone()) {
			out.push(marker);
		}
	}

	out
}
