use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier of a tracked train.
pub type TrainId = u64;

/// Per-axis distance (degrees) below which a reported move is treated as noise.
pub const MOVE_TOLERANCE: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when `other` is at least `tolerance` away on either axis.
    ///
    /// The axes are compared independently; this is not a geodesic distance.
    pub fn moved_beyond(&self, other: LatLon, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() >= tolerance || (self.lon - other.lon).abs() >= tolerance
    }
}

/// Full known state of one train, as carried in a `data-train` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSnapshot {
    pub id: TrainId,
    #[serde(default, deserialize_with = "strict_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "strict_coordinate")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub train_number: String,
    #[serde(default, deserialize_with = "loose_number")]
    pub bearing: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    pub speed_kmh: Option<f64>,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub delay_seconds: Option<i64>,
    #[serde(default)]
    pub operator: Option<String>,
}

impl TrainSnapshot {
    /// Minimal snapshot with a position and display code; the optional fields are empty.
    pub fn at(id: TrainId, lat: f64, lon: f64, train_number: &str) -> Self {
        Self {
            id,
            latitude: Some(lat),
            longitude: Some(lon),
            train_number: train_number.to_string(),
            bearing: None,
            speed_kmh: None,
            route_short_name: None,
            delay_seconds: None,
            operator: None,
        }
    }

    /// Position of the train, if both coordinates are present and finite.
    pub fn position(&self) -> Option<LatLon> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(LatLon::new(lat, lon))
            }
            _ => None,
        }
    }
}

fn number_from_value(value: Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("number {n} is not representable")),
        // Decimal columns are often serialized as strings.
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("non-numeric value {s:?}")),
        other => Err(format!("non-numeric value {other}")),
    }
}

/// Coordinates: absent or null is "no position"; anything non-numeric rejects the entity.
fn strict_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    number_from_value(value).map_err(de::Error::custom)
}

/// Display-only numbers: garbage is treated as absent.
fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(value).ok().flatten())
}
