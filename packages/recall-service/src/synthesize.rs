use std::collections::HashSet;

use recall_domain::grounding::{
	self, EvidenceSnippet, GroundedResponse, GroundingStatus,
};
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::Providers;

/// The contract the generation model is held to. Claims must carry a snippet
/// marker, and the two sentinel strings are the only permitted refusals.
const SYSTEM_INSTRUCTION: &str = "\
You answer questions strictly from the numbered memory snippets provided.\n\
Every factual claim must cite its snippet marker, e.g. [1] or [3].\n\
If the snippets do not contain enough evidence to answer, reply with exactly \
INSUFFICIENT_EVIDENCE.\n\
If the snippets contradict each other on the answer, reply with exactly \
CONFLICTING_EVIDENCE followed by the markers involved.\n\
Never use knowledge outside the snippets.";

/// Grounded answer over the evidence snippets, trying the primary generation
/// provider and then the fallback. Provider failure is not an error at this
/// layer: the caller gets an evidence-insufficient outcome instead.
pub(crate) async fn synthesize(
	providers: &Providers,
	cfg: &recall_config::Providers,
	query: &str,
	evidence: &[EvidenceSnippet],
) -> GroundedResponse {
	let prompt = build_prompt(query, evidence);
	let mut attempts = vec![("generation_primary", &cfg.generation_primary)];

	if let Some(fallback) = cfg.generation_fallback.as_ref() {
		attempts.push(("generation_fallback", fallback));
	}

	for (label, provider_cfg) in attempts {
		match providers.generation.generate(provider_cfg, SYSTEM_INSTRUCTION, &prompt).await {
			Ok(raw) => return enforce_citations(grounding::parse_grounded_response(&raw), evidence),
			Err(err) => {
				warn!(provider = label, error = %err, "Generation call failed.");
			},
		}
	}

	insufficient()
}

fn build_prompt(query: &str, evidence: &[EvidenceSnippet]) -> String {
	let mut prompt = String::from("Memory snippets:\n");

	for snippet in evidence {
		prompt.push_str(&snippet.marker);

		if let Some(date) = snippet.event_date
			&& let Ok(formatted) = date.format(&Rfc3339)
		{
			prompt.push_str(&format!(" ({formatted})"));
		}

		prompt.push(' ');
		prompt.push_str(&snippet.excerpt);
		prompt.push('\n');
	}

	prompt.push_str("\nQuestion: ");
	prompt.push_str(query);

	prompt
}

/// Drops citations that point at no provided snippet; an answer or conflict
/// report left with no valid citation is demoted to evidence-insufficient.
fn enforce_citations(
	mut response: GroundedResponse,
	evidence: &[EvidenceSnippet],
) -> GroundedResponse {
	let known: HashSet<&str> =
		evidence.iter().map(|snippet| snippet.marker.as_str()).collect();

	response.citations.retain(|marker| known.contains(marker.as_str()));

	if response.status != GroundingStatus::InsufficientEvidence && response.citations.is_empty() {
		return insufficient();
	}

	response
}

fn insufficient() -> GroundedResponse {
	GroundedResponse {
		status: GroundingStatus::InsufficientEvidence,
		answer: None,
		citations: Vec::new(),
	}
}
