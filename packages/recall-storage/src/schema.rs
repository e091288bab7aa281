/// Read-side schema for the memory record and profile-fact stores. The
/// ingestion pipeline owns writes; this core only ever selects.
pub fn render_schema() -> String {
	"\
CREATE TABLE IF NOT EXISTS memory_records (
	record_id UUID PRIMARY KEY,
	user_id TEXT NOT NULL,
	container_id TEXT NOT NULL,
	layer TEXT NOT NULL,
	content TEXT NOT NULL,
	importance REAL NOT NULL DEFAULT 0.5,
	pinned BOOLEAN NOT NULL DEFAULT FALSE,
	event_dates TIMESTAMPTZ[] NOT NULL DEFAULT '{}',
	metadata JSONB NOT NULL DEFAULT '{}',
	status TEXT NOT NULL DEFAULT 'active',
	created_at TIMESTAMPTZ NOT NULL,
	updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_records_tenant
	ON memory_records (user_id, container_id, status);
CREATE INDEX IF NOT EXISTS idx_memory_records_layer
	ON memory_records (user_id, container_id, layer);
CREATE TABLE IF NOT EXISTS profile_facts (
	fact_id UUID PRIMARY KEY,
	user_id TEXT NOT NULL,
	container_id TEXT NOT NULL,
	key TEXT NOT NULL,
	value TEXT NOT NULL,
	confidence REAL NOT NULL DEFAULT 1.0,
	category TEXT NOT NULL,
	updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_profile_facts_tenant
	ON profile_facts (user_id, container_id)"
		.to_string()
}
