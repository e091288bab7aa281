use std::{
	collections::{HashMap, HashSet},
	time::{Duration, Instant},
};

use qdrant_client::qdrant::{
	Condition, Filter, Query, QueryPointsBuilder, point_id::PointIdOptions,
};
use recall_config::KeywordScoring;
use recall_domain::{
	metadata::Metadata,
	scoring::{ProfileFact, SearchCandidate},
};
use recall_storage::{
	models::{MemoryRecord, ProfileFactRow},
	qdrant::DENSE_VECTOR_NAME,
	queries::{self, KeywordQuery, TenantFilter},
};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{Error, RecallService, Result};

const MAX_QUERY_TERMS: usize = 16;

pub(crate) struct ChannelArgs<'a> {
	pub(crate) query: &'a str,
	pub(crate) tenant: TenantFilter<'a>,
	pub(crate) layer: Option<&'a str>,
	pub(crate) start: Option<OffsetDateTime>,
	pub(crate) end: Option<OffsetDateTime>,
	pub(crate) candidate_limit: u32,
	pub(crate) use_profiles: bool,
}

/// Merged output of the concurrent retrieval channels. A failed or timed-out
/// channel contributes nothing instead of failing the request.
pub(crate) struct RetrievalOutcome {
	pub(crate) candidates: Vec<SearchCandidate>,
	pub(crate) facts: Vec<ProfileFact>,
	pub(crate) vector_ms: u64,
	pub(crate) keyword_ms: u64,
}

impl RecallService {
	pub(crate) async fn gather_candidates(
		&self,
		args: &ChannelArgs<'_>,
	) -> Result<RetrievalOutcome> {
		let timeout = Duration::from_millis(self.cfg.retrieval.channel_timeout_ms);
		let vector_task = async {
			let started = Instant::now();
			let hits = self.vector_channel(args).await?;

			Ok::<_, Error>((hits, started.elapsed().as_millis() as u64))
		};
		let keyword_task = async {
			let started = Instant::now();
			let hits = self.keyword_channel(args).await?;

			Ok::<_, Error>((hits, started.elapsed().as_millis() as u64))
		};
		let profile_task = async {
			if !args.use_profiles {
				return Ok::<_, Error>(Vec::new());
			}

			let rows = queries::fetch_profile_facts(&self.db.pool, args.tenant).await?;

			Ok(rows)
		};

		let (vector_outcome, keyword_outcome, profile_outcome) = tokio::join!(
			tokio::time::timeout(timeout, vector_task),
			tokio::time::timeout(timeout, keyword_task),
			tokio::time::timeout(timeout, profile_task),
		);

		let (vector_hits, vector_ms) = degrade(vector_outcome, "vector").unwrap_or((Vec::new(), 0));
		let (keyword_hits, keyword_ms) =
			degrade(keyword_outcome, "keyword").unwrap_or((Vec::new(), 0));
		let facts = degrade(profile_outcome, "profile").unwrap_or_default();
		let candidates = self.merge_channels(args.tenant, vector_hits, keyword_hits).await?;
		let facts = facts
			.into_iter()
			.map(|row: ProfileFactRow| ProfileFact {
				key: row.key,
				value: row.value,
				confidence: row.confidence,
				category: row.category,
			})
			.collect();

		Ok(RetrievalOutcome { candidates, facts, vector_ms, keyword_ms })
	}

	async fn vector_channel(&self, args: &ChannelArgs<'_>) -> Result<Vec<(Uuid, f32)>> {
		let embeddings = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, std::slice::from_ref(&args.query.to_string()))
			.await?;
		let Some(vector) = embeddings.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let mut must = vec![
			Condition::matches("user_id", args.tenant.user_id.to_string()),
			Condition::matches("container_id", args.tenant.container_id.to_string()),
			Condition::matches("status", "active".to_string()),
		];

		if let Some(layer) = args.layer {
			must.push(Condition::matches("layer", layer.to_string()));
		}

		let search = QueryPointsBuilder::new(self.qdrant.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.filter(Filter::must(must))
			.limit(args.candidate_limit as u64);
		let response = self
			.qdrant
			.client
			.query(search)
			.await
			.map_err(|err| Error::Qdrant { message: err.to_string() })?;
		let hits = response
			.result
			.iter()
			.filter_map(|point| {
				let id = point.id.as_ref().and_then(point_id_to_uuid)?;

				Some((id, point.score))
			})
			.collect();

		Ok(hits)
	}

	async fn keyword_channel(&self, args: &ChannelArgs<'_>) -> Result<Vec<(MemoryRecord, f32)>> {
		let terms = tokenize_query(args.query);

		if terms.is_empty() {
			return Ok(Vec::new());
		}

		let rows = queries::keyword_candidates(
			&self.db.pool,
			&KeywordQuery {
				tenant: args.tenant,
				terms: &terms,
				layer: args.layer,
				start: args.start,
				end: args.end,
				limit: args.candidate_limit as i64,
			},
		)
		.await?;
		let scores = bm25_scores(&terms, &rows, &self.cfg.retrieval.keyword);

		Ok(rows.into_iter().zip(scores).filter(|(_, score)| *score > 0.0).collect())
	}

	/// Union of both channels keyed by record id. Vector-only hits are hydrated
	/// from Postgres; ids the store no longer knows are dropped.
	async fn merge_channels(
		&self,
		tenant: TenantFilter<'_>,
		vector_hits: Vec<(Uuid, f32)>,
		keyword_hits: Vec<(MemoryRecord, f32)>,
	) -> Result<Vec<SearchCandidate>> {
		let vector_scores: HashMap<Uuid, f32> = vector_hits.iter().copied().collect();
		let keyword_ids: HashSet<Uuid> =
			keyword_hits.iter().map(|(record, _)| record.record_id).collect();
		let missing: Vec<Uuid> = vector_hits
			.iter()
			.map(|(id, _)| *id)
			.filter(|id| !keyword_ids.contains(id))
			.collect();
		let hydrated = queries::fetch_records_by_ids(&self.db.pool, tenant, &missing).await?;

		let mut candidates = Vec::with_capacity(keyword_hits.len() + hydrated.len());

		for (record, keyword_score) in keyword_hits {
			let vector_score = vector_scores.get(&record.record_id).copied().unwrap_or(0.0);

			candidates.push(to_candidate(record, vector_score, keyword_score));
		}
		for record in hydrated {
			let vector_score = vector_scores.get(&record.record_id).copied().unwrap_or(0.0);

			candidates.push(to_candidate(record, vector_score, 0.0));
		}

		Ok(candidates)
	}
}

fn degrade<T>(
	outcome: Result<Result<T>, tokio::time::error::Elapsed>,
	channel: &str,
) -> Option<T> {
	match outcome {
		Ok(Ok(value)) => Some(value),
		Ok(Err(err)) => {
			warn!(channel, error = %err, "Retrieval channel failed; degrading to empty.");

			None
		},
		Err(_) => {
			warn!(channel, "Retrieval channel timed out; degrading to empty.");

			None
		},
	}
}

fn to_candidate(record: MemoryRecord, vector_score: f32, keyword_score: f32) -> SearchCandidate {
	let metadata: Metadata = match serde_json::from_value(record.metadata) {
		Ok(metadata) => metadata,
		Err(err) => {
			warn!(record_id = %record.record_id, error = %err, "Record metadata failed to decode; treating as empty.");

			Metadata::default()
		},
	};

	SearchCandidate {
		id: record.record_id,
		content: record.content,
		vector_score,
		keyword_score,
		event_dates: record.event_dates,
		created_at: record.created_at,
		layer: record.layer,
		importance: record.importance,
		pinned: record.pinned,
		metadata,
	}
}

/// Lowercased alphanumeric terms, deduplicated in first-appearance order and
/// capped so a pathological query cannot blow up the SQL pattern list.
pub(crate) fn tokenize_query(query: &str) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut terms = Vec::new();

	for raw in query.split(|c: char| !c.is_alphanumeric()) {
		let term = raw.to_lowercase();

		// Character count, not byte length, so multi-byte single letters stay noise.
		if term.chars().nth(1).is_none() || !seen.insert(term.clone()) {
			continue;
		}

		terms.push(term);

		if terms.len() == MAX_QUERY_TERMS {
			break;
		}
	}

	terms
}

/// BM25-style lexical score per fetched row, without the idf term: candidate
/// fetch already requires at least one term match, and the downstream ranking
/// normalizes per batch so only relative order matters.
pub(crate) fn bm25_scores(
	terms: &[String],
	rows: &[MemoryRecord],
	cfg: &KeywordScoring,
) -> Vec<f32> {
	if rows.is_empty() {
		return Vec::new();
	}

	let docs: Vec<Vec<String>> = rows.iter().map(|row| tokenize_document(&row.content)).collect();
	let avg_len = docs.iter().map(|doc| doc.len() as f32).sum::<f32>() / docs.len() as f32;
	let avg_len = avg_len.max(1.0);

	docs.iter()
		.map(|doc| {
			let doc_len = doc.len() as f32;
			let mut counts: HashMap<&str, f32> = HashMap::new();

			for token in doc {
				*counts.entry(token.as_str()).or_insert(0.0) += 1.0;
			}

			terms
				.iter()
				.map(|term| {
					let tf = counts.get(term.as_str()).copied().unwrap_or(0.0);

					if tf == 0.0 {
						return 0.0;
					}

					tf * (cfg.k1 + 1.0)
						/ (tf + cfg.k1 * (1.0 - cfg.b + cfg.b * doc_len / avg_len))
				})
				.sum()
		})
		.collect()
}

fn tokenize_document(content: &str) -> Vec<String> {
	content
		.split(|c: char| !c.is_alphanumeric())
		.filter(|raw| raw.chars().nth(1).is_some())
		.map(|raw| raw.to_lowercase())
		.collect()
}

fn point_id_to_uuid(point_id: &qdrant_client::qdrant::PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}
