pub const CREATE_KV_STORE: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

pub const SELECT_VALUE: &str = r#"
SELECT value FROM kv_store WHERE key = $1;
"#;

pub const UPSERT_VALUE: &str = r#"
INSERT INTO kv_store (key, value, updated_at)
VALUES ($1, $2, CURRENT_TIMESTAMP)
ON CONFLICT (key) DO UPDATE
SET value = excluded.value,
    updated_at = CURRENT_TIMESTAMP;
"#;

pub const DELETE_VALUE: &str = r#"
DELETE FROM kv_store WHERE key = $1;
"#;
