use serde::{Deserialize, Serialize};
use trainmap_shared::models::{TrainId, TrainSnapshot};

/// One push notification from the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A train element appeared; `payload` is its `data-train` JSON.
    Added { payload: String },
    /// A train element's `data-train` attribute changed.
    Updated { payload: String },
    /// A train element went away.
    Removed { id: TrainId },
    /// The page pushed the whole train list as a JSON array.
    Refresh { payload: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The notification itself could not be decoded.
    #[error("could not decode notification: {0}")]
    NotificationParse(String),
    /// The payload decoded but does not describe a usable train.
    #[error("malformed train entity: {0}")]
    MalformedEntity(String),
}

/// Where change notifications come from.
///
/// The source pushes [`ChangeEvent`]s into whatever it was handed at
/// construction; this trait only covers the seed listing and the
/// subscription lifetime.
pub trait ChangeSource {
    /// `data-train` payloads of every train currently on the page.
    fn list_current_entities(&self) -> Vec<String>;
    fn subscribe(&mut self);
    fn unsubscribe(&mut self);
}

/// Decode one `data-train` payload.
pub fn decode_snapshot(payload: &str) -> Result<TrainSnapshot, FeedError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| FeedError::NotificationParse(e.to_string()))?;
    snapshot_from_value(value)
}

fn snapshot_from_value(value: serde_json::Value) -> Result<TrainSnapshot, FeedError> {
    serde_json::from_value(value).map_err(|e| FeedError::MalformedEntity(e.to_string()))
}

/// Result of decoding a full train list.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedBatch {
    pub trains: Vec<TrainSnapshot>,
    /// Ids of elements that were dropped as malformed but still named a
    /// train; they stay part of the live set.
    pub retained: Vec<TrainId>,
}

/// Decode a JSON array of trains. Elements that are not valid trains are
/// logged and dropped; only an undecodable array is an error.
pub fn decode_batch(payload: &str) -> Result<DecodedBatch, FeedError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(payload)
        .map_err(|e| FeedError::NotificationParse(e.to_string()))?;
    let mut batch = DecodedBatch::default();
    for value in values {
        let id = value.get("id").and_then(serde_json::Value::as_u64);
        match snapshot_from_value(value) {
            Ok(train) => batch.trains.push(train),
            Err(e) => {
                tracing::warn!(id, error = %e, "Dropping train from batch");
                if let Some(id) = id {
                    batch.retained.push(id);
                }
            }
        }
    }
    Ok(batch)
}

/// Decode a list of individual payloads (the seed listing), dropping bad ones.
pub fn decode_all(payloads: &[String]) -> Vec<TrainSnapshot> {
    payloads
        .iter()
        .filter_map(|p| match decode_snapshot(p) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping train from listing");
                None
            }
        })
        .collect()
}

/// Extract the train id from an element id such as `trains-42`.
pub fn parse_element_id(element_id: &str, prefix: &str) -> Result<TrainId, FeedError> {
    element_id
        .strip_prefix(prefix)
        .and_then(|rest| rest.parse::<TrainId>().ok())
        .ok_or_else(|| {
            FeedError::NotificationParse(format!("not a train element id: {element_id:?}"))
        })
}

/// Pull one field out of a page event's `detail` JSON (e.g. `train` or
/// `trains`) and return it re-encoded as a payload string.
pub fn detail_field(detail: &str, key: &str) -> Result<String, FeedError> {
    let value: serde_json::Value = serde_json::from_str(detail)
        .map_err(|e| FeedError::NotificationParse(e.to_string()))?;
    value
        .get(key)
        .map(|field| field.to_string())
        .ok_or_else(|| FeedError::NotificationParse(format!("event detail has no {key:?} field")))
}
