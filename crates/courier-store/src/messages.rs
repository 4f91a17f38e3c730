use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::params;

use courier_shared::{MessageId, MessageRecord, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::NewMessage;

const SELECT_COLUMNS: &str =
    "SELECT id, sender_id, receiver_id, text, created_at, reply_to, read FROM messages";

impl Database {
    /// Persist a message, assigning its id and timestamp.
    ///
    /// Text is trimmed and must not be blank.
    pub fn append_message(&self, message: &NewMessage) -> Result<MessageRecord> {
        let text = message.text.trim();
        if text.is_empty() {
            return Err(StoreError::Invalid("message text is empty".into()));
        }
        if message.sender_id.is_empty() || message.receiver_id.is_empty() {
            return Err(StoreError::Invalid("sender and receiver are required".into()));
        }

        let record = MessageRecord {
            id: MessageId::new(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            text: text.to_string(),
            // Stored at microsecond precision; keep the pushed copy identical.
            created_at: Utc::now().trunc_subsecs(6),
            reply_to: message.reply_to,
            read: false,
        };

        self.conn().execute(
            "INSERT INTO messages (id, sender_id, receiver_id, text, created_at, reply_to, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                record.id.to_string(),
                record.sender_id.as_str(),
                record.receiver_id.as_str(),
                record.text,
                record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                record.reply_to.map(|id| id.to_string()),
            ],
        )?;

        tracing::debug!(
            id = %record.id,
            sender = %record.sender_id.short(),
            receiver = %record.receiver_id.short(),
            "message stored"
        );

        Ok(record)
    }

    /// Every message exchanged between two users, in both directions,
    /// oldest first.
    pub fn read_history(&self, user_a: &UserId, user_b: &UserId) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY seq ASC"
        ))?;

        let rows = stmt.query_map(params![user_a.as_str(), user_b.as_str()], row_to_record)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Mark everything `sender` has sent to `receiver` as read. Returns the
    /// number of messages that changed.
    pub fn mark_read(&self, receiver: &UserId, sender: &UserId) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET read = 1
             WHERE receiver_id = ?1 AND sender_id = ?2 AND read = 0",
            params![receiver.as_str(), sender.as_str()],
        )?;
        Ok(affected)
    }

    pub fn get_message_by_id(&self, id: MessageId) -> Result<MessageRecord> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                row_to_record,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let id_str: String = row.get(0)?;
    let sender_id: String = row.get(1)?;
    let receiver_id: String = row.get(2)?;
    let text: String = row.get(3)?;
    let ts_str: String = row.get(4)?;
    let reply_to_str: Option<String> = row.get(5)?;
    let read: bool = row.get(6)?;

    let id = MessageId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let reply_to = reply_to_str
        .map(|s| MessageId::parse(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(MessageRecord {
        id,
        sender_id: UserId(sender_id),
        receiver_id: UserId(receiver_id),
        text,
        created_at,
        reply_to,
        read,
    })
}
