pub const SCHEMA: &str = r#"
-- items table: one row per story per day partition
CREATE TABLE IF NOT EXISTS items (
    day TEXT NOT NULL,
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    title_translated TEXT,
    url TEXT NOT NULL,
    source_url TEXT NOT NULL,
    score INTEGER NOT NULL DEFAULT 0,
    comments INTEGER NOT NULL DEFAULT 0,
    summary TEXT,
    summary_translated TEXT,
    discovered_at TEXT NOT NULL,
    sent_at TEXT,
    is_sent INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_items_day ON items(day);
CREATE INDEX IF NOT EXISTS idx_items_unsent ON items(day, is_sent);
"#;

// Created after the reconciliation pass in Store::open so that legacy
// duplicate rows can be collapsed before uniqueness is enforced.
pub const UNIQUE_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_items_day_id ON items(day, id)";
