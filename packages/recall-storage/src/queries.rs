use sqlx::{PgPool, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{MemoryRecord, ProfileFactRow},
};

const RECORD_COLUMNS: &str = "record_id, user_id, container_id, layer, content, importance, \
	pinned, event_dates, metadata, status, created_at, updated_at";

#[derive(Debug, Clone, Copy)]
pub struct TenantFilter<'a> {
	pub user_id: &'a str,
	pub container_id: &'a str,
}

#[derive(Debug)]
pub struct KeywordQuery<'a> {
	pub tenant: TenantFilter<'a>,
	pub terms: &'a [String],
	pub layer: Option<&'a str>,
	pub start: Option<OffsetDateTime>,
	pub end: Option<OffsetDateTime>,
	pub limit: i64,
}

/// Batched hydration of candidate ids. Ids unknown to the store (or outside
/// the tenant, or not active) are simply absent from the result.
pub async fn fetch_records_by_ids(
	pool: &PgPool,
	tenant: TenantFilter<'_>,
	ids: &[Uuid],
) -> Result<Vec<MemoryRecord>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as(&format!(
		"SELECT {RECORD_COLUMNS} FROM memory_records \
		 WHERE record_id = ANY($1) AND user_id = $2 AND container_id = $3 AND status = 'active'",
	))
	.bind(ids)
	.bind(tenant.user_id)
	.bind(tenant.container_id)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

/// Lexical candidate fetch: tenant-, layer-, and time-filtered rows whose
/// content contains at least one query term. Scoring happens in the caller
/// over the returned content.
pub async fn keyword_candidates(
	pool: &PgPool,
	query: &KeywordQuery<'_>,
) -> Result<Vec<MemoryRecord>> {
	if query.terms.is_empty() {
		return Ok(Vec::new());
	}

	let patterns: Vec<String> =
		query.terms.iter().map(|term| format!("%{}%", escape_like(term))).collect();
	let mut builder = QueryBuilder::new(format!(
		"SELECT {RECORD_COLUMNS} FROM memory_records WHERE status = 'active' AND user_id = ",
	));

	builder.push_bind(query.tenant.user_id);
	builder.push(" AND container_id = ");
	builder.push_bind(query.tenant.container_id);
	builder.push(" AND content ILIKE ANY(");
	builder.push_bind(patterns);
	builder.push(")");

	if let Some(layer) = query.layer {
		builder.push(" AND layer = ");
		builder.push_bind(layer);
	}
	// A row qualifies for a time window when its creation time or one of its
	// event dates falls inside it.
	match (query.start, query.end) {
		(Some(start), Some(end)) => {
			builder.push(" AND (created_at BETWEEN ");
			builder.push_bind(start);
			builder.push(" AND ");
			builder.push_bind(end);
			builder.push(" OR EXISTS (SELECT 1 FROM unnest(event_dates) AS d WHERE d BETWEEN ");
			builder.push_bind(start);
			builder.push(" AND ");
			builder.push_bind(end);
			builder.push("))");
		},
		(Some(start), None) => {
			builder.push(" AND (created_at >= ");
			builder.push_bind(start);
			builder.push(" OR EXISTS (SELECT 1 FROM unnest(event_dates) AS d WHERE d >= ");
			builder.push_bind(start);
			builder.push("))");
		},
		(None, Some(end)) => {
			builder.push(" AND (created_at <= ");
			builder.push_bind(end);
			builder.push(" OR EXISTS (SELECT 1 FROM unnest(event_dates) AS d WHERE d <= ");
			builder.push_bind(end);
			builder.push("))");
		},
		(None, None) => {},
	}

	builder.push(" ORDER BY updated_at DESC LIMIT ");
	builder.push_bind(query.limit);

	let rows = builder.build_query_as().fetch_all(pool).await?;

	Ok(rows)
}

pub async fn fetch_profile_facts(
	pool: &PgPool,
	tenant: TenantFilter<'_>,
) -> Result<Vec<ProfileFactRow>> {
	let rows = sqlx::query_as(
		"SELECT key, value, confidence, category FROM profile_facts \
		 WHERE user_id = $1 AND container_id = $2",
	)
	.bind(tenant.user_id)
	.bind(tenant.container_id)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

fn escape_like(term: &str) -> String {
	term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn like_wildcards_are_escaped() {
		assert_eq!(escape_like("100%_done"), "100\\%\\_done");
		assert_eq!(escape_like("plain"), "plain");
		assert_eq!(escape_like("back\\slash"), "back\\\\slash");
	}
}
