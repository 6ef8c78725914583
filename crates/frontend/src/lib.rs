//! Live train map: mirrors server-pushed train positions onto map markers.

pub mod config;
pub mod feed;
pub mod readiness;
pub mod reconciler;
pub mod train_map;
pub mod widget;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::TrainMapConfig;
pub use feed::{ChangeEvent, ChangeSource, FeedError};
pub use reconciler::{ReconcileReport, Reconciler};
pub use train_map::TrainMap;
pub use widget::{MapWidget, MarkerStyle, RecordingWidget, WidgetCall, WidgetError};
