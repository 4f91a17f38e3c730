//! v001 -- Initial schema: the `messages` table.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,  -- append order
    id          TEXT NOT NULL UNIQUE,               -- UUID v4
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL,                      -- RFC-3339
    reply_to    TEXT,                               -- nullable message id
    read        INTEGER NOT NULL DEFAULT 0          -- boolean 0/1
);

CREATE INDEX IF NOT EXISTS idx_messages_pair
    ON messages(sender_id, receiver_id, seq);

CREATE INDEX IF NOT EXISTS idx_messages_unread
    ON messages(receiver_id, sender_id) WHERE read = 0;
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
