use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use super::id::opt_id;

/// `message` event payload. Relayed to the whole room and appended to the
/// session's chat history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "opt_id")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub content: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Client clocks send RFC 3339 strings or epoch milliseconds, as a number or
/// a string. Anything else is dropped so the relay assigns its own time
/// instead of rejecting the message.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    let parsed = match &raw {
        Some(Value::String(s)) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis))
        }
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    if parsed.is_none() {
        if let Some(value) = raw.filter(|v| !v.is_null()) {
            debug!("Ignoring unreadable chat timestamp {}", value);
        }
    }
    Ok(parsed)
}

impl ChatMessage {
    /// Assign the relay's clock when the sender did not provide one
    pub fn stamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        *self.timestamp.get_or_insert(now)
    }
}

/// Body sent to the app service to append a message to a session
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageRequest {
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}
