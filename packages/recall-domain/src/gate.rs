use serde::{Deserialize, Serialize};

use crate::scoring::RankedResult;

/// Contribution thresholds used when diagnosing a refused answer.
const WEAK_VECTOR_CONTRIBUTION: f32 = 0.3;
const WEAK_KEYWORD_CONTRIBUTION: f32 = 0.1;
const WEAK_IMPORTANCE_CONTRIBUTION: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
	Grounded,
	ActionableUncertainty,
	ConflictingEvidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateReason {
	NoCandidates,
	LowConfidence,
	SingleSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Critical,
	Moderate,
	Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	High,
	Medium,
	Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingSignal {
	pub signal: String,
	pub description: String,
	pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedAction {
	pub action: String,
	pub description: String,
	pub priority: Priority,
}

/// Outcome of the evidence gate for one ranked result set. Generated fresh per
/// evaluation; nothing here is stored.
#[derive(Debug, Clone)]
pub struct GateDecision {
	pub status: GateStatus,
	pub reason: Option<GateReason>,
	pub composite_score: Option<f32>,
	pub support_count: u32,
	pub missing_signals: Vec<MissingSignal>,
	pub suggested_actions: Vec<SuggestedAction>,
	pub message: Option<String>,
}

/// Deterministic pass/fail decision over ranked evidence, made before any
/// generation call. Pure: no I/O, no clock.
pub fn evaluate(results: &[RankedResult], query: &str, cfg: &recall_config::Gate) -> GateDecision {
	let top_score = results.first().map(|result| result.score);
	let support_count =
		results.iter().filter(|result| result.score >= cfg.min_support_score).count() as u32;

	let reason = if results.is_empty() {
		Some(GateReason::NoCandidates)
	} else if top_score.unwrap_or(0.0) < cfg.min_composite_score {
		Some(GateReason::LowConfidence)
	} else if support_count < cfg.min_support_count {
		Some(GateReason::SingleSource)
	} else {
		None
	};

	let Some(reason) = reason else {
		return GateDecision {
			status: GateStatus::Grounded,
			reason: None,
			composite_score: top_score,
			support_count,
			missing_signals: Vec::new(),
			suggested_actions: Vec::new(),
			message: None,
		};
	};

	let missing_signals = diagnose(results, reason);
	let suggested_actions = suggest(&missing_signals, query);
	let message = Some(select_message(&missing_signals));

	GateDecision {
		status: GateStatus::ActionableUncertainty,
		reason: Some(reason),
		composite_score: top_score,
		support_count,
		missing_signals,
		suggested_actions,
		message,
	}
}

fn diagnose(results: &[RankedResult], reason: GateReason) -> Vec<MissingSignal> {
	let mut signals = Vec::new();

	if reason == GateReason::NoCandidates {
		signals.push(MissingSignal {
			signal: "no_memories".to_string(),
			description: "No stored memories matched the query.".to_string(),
			severity: Severity::Critical,
		});

		return signals;
	}
	if reason == GateReason::SingleSource {
		signals.push(MissingSignal {
			signal: "single_source".to_string(),
			description: "Only one memory clears the support floor.".to_string(),
			severity: Severity::Moderate,
		});
	}

	let top = &results[0];

	if top.breakdown.vector < WEAK_VECTOR_CONTRIBUTION {
		signals.push(MissingSignal {
			signal: "weak_semantic_match".to_string(),
			description: "The best match is only weakly related to the query.".to_string(),
			severity: Severity::Moderate,
		});
	}
	if top.breakdown.keyword < WEAK_KEYWORD_CONTRIBUTION {
		signals.push(MissingSignal {
			signal: "no_keyword_match".to_string(),
			description: "No memory shares the query's terms.".to_string(),
			severity: Severity::Minor,
		});
	}
	if results.iter().all(|result| result.event_dates.is_empty()) {
		signals.push(MissingSignal {
			signal: "no_temporal_grounding".to_string(),
			description: "No candidate memory carries an event date.".to_string(),
			severity: Severity::Minor,
		});
	}
	if top.breakdown.importance < WEAK_IMPORTANCE_CONTRIBUTION {
		signals.push(MissingSignal {
			signal: "low_importance".to_string(),
			description: "The matched memories are all low-importance.".to_string(),
			severity: Severity::Minor,
		});
	}

	signals
}

fn suggest(signals: &[MissingSignal], query: &str) -> Vec<SuggestedAction> {
	let mut actions: Vec<SuggestedAction> = Vec::new();
	let mut push = |action: &str, description: String, priority: Priority| {
		if actions.iter().all(|existing| existing.action != action) {
			actions.push(SuggestedAction { action: action.to_string(), description, priority });
		}
	};
	let has = |name: &str| signals.iter().any(|signal| signal.signal == name);

	if has("no_memories") || has("weak_semantic_match") {
		push("add_memory", format!("Add a memory about \"{query}\"."), Priority::High);
	}
	if has("single_source") {
		push(
			"add_corroborating_memory",
			format!("Add a second memory corroborating \"{query}\"."),
			Priority::High,
		);
	}
	if has("no_temporal_grounding") {
		push(
			"add_dated_memories",
			"Add memories with explicit event dates.".to_string(),
			Priority::Medium,
		);
	}
	if signals.iter().any(|signal| signal.severity == Severity::Critical) {
		push(
			"upload_document",
			"Upload a document covering this topic.".to_string(),
			Priority::Medium,
		);
	}

	actions
}

fn select_message(signals: &[MissingSignal]) -> String {
	let has = |name: &str| signals.iter().any(|signal| signal.signal == name);

	if has("no_memories") {
		"I don't have any memories about this yet.".to_string()
	} else if has("single_source") {
		"I found one related memory, but not enough corroboration to answer confidently."
			.to_string()
	} else if has("weak_semantic_match") {
		"The memories I found are only loosely related to this question.".to_string()
	} else {
		"I'm not confident enough in the stored memories to answer this.".to_string()
	}
}
