use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// One durable memory record as stored. The write path lives outside this
/// core; only reads happen here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemoryRecord {
	pub record_id: Uuid,
	pub user_id: String,
	pub container_id: String,
	pub layer: String,
	pub content: String,
	pub importance: f32,
	pub pinned: bool,
	pub event_dates: Vec<OffsetDateTime>,
	pub metadata: Value,
	pub status: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileFactRow {
	pub key: String,
	pub value: String,
	pub confidence: f32,
	pub category: String,
}
