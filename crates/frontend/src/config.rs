use std::time::Duration;

use serde::{Deserialize, Serialize};
use trainmap_shared::models::{LatLon, MOVE_TOLERANCE};

/// Runtime settings for the live train map. Every field has a default, so a
/// partial JSON object (or none at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainMapConfig {
    pub center: LatLon,
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
    /// Element whose children carry the `data-train` payloads.
    pub trains_container_id: String,
    /// Prefix of each train element's id; the rest is the train id.
    pub element_id_prefix: String,
    pub ready_poll_ms: u64,
    pub move_tolerance: f64,
    /// `tracing` filter directive for the browser console.
    pub log_level: String,
}

impl Default for TrainMapConfig {
    fn default() -> Self {
        Self {
            center: LatLon::new(46.2276, 2.2137),
            zoom: 6,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            trains_container_id: "trains".to_string(),
            element_id_prefix: "trains-".to_string(),
            ready_poll_ms: 100,
            move_tolerance: MOVE_TOLERANCE,
            log_level: "info".to_string(),
        }
    }
}

impl TrainMapConfig {
    /// Parse a JSON config, falling back to defaults for missing fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    /// A tolerance that is negative or not finite would make every update a
    /// move (or none); fall back to the default.
    pub fn effective_tolerance(&self) -> f64 {
        if self.move_tolerance.is_finite() && self.move_tolerance >= 0.0 {
            self.move_tolerance
        } else {
            MOVE_TOLERANCE
        }
    }
}
