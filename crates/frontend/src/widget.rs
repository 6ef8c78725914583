use trainmap_shared::classify::{classify, TrainCategory};
use trainmap_shared::icon::icon_html;
use trainmap_shared::models::LatLon;

/// Visual styling of a train marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub category: TrainCategory,
    pub bearing: Option<f64>,
}

impl MarkerStyle {
    pub fn for_train(train_number: &str, bearing: Option<f64>) -> Self {
        Self {
            category: classify(train_number),
            bearing,
        }
    }

    pub fn color(&self) -> &'static str {
        self.category.color()
    }

    pub fn icon_html(&self) -> String {
        icon_html(self.category, self.bearing)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    /// The rendering capability could not be initialized.
    #[error("map widget unavailable: {0}")]
    Unavailable(String),
}

/// Marker primitives provided by the mapping library.
///
/// Calls are synchronous from the caller's side. Handles are owned by the
/// widget; `remove_marker` consumes the handle so it cannot be reused.
pub trait MapWidget {
    type Handle;

    fn create_marker(&mut self, position: LatLon, style: &MarkerStyle, popup: &str) -> Self::Handle;
    fn move_marker(&mut self, handle: &Self::Handle, position: LatLon);
    fn marker_position(&self, handle: &Self::Handle) -> LatLon;
    fn set_popup(&mut self, handle: &Self::Handle, content: &str);
    fn remove_marker(&mut self, handle: Self::Handle);
}

/// One call made against a [`RecordingWidget`].
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetCall {
    Create {
        marker: usize,
        position: LatLon,
        category: TrainCategory,
    },
    Move {
        marker: usize,
        position: LatLon,
    },
    SetPopup {
        marker: usize,
    },
    Remove {
        marker: usize,
    },
}

#[derive(Debug, Clone)]
struct RecordedMarker {
    position: LatLon,
    popup: String,
    live: bool,
}

/// In-memory widget that records every call. Marker handles are sequential indices.
#[derive(Debug, Default)]
pub struct RecordingWidget {
    markers: Vec<RecordedMarker>,
    calls: Vec<WidgetCall>,
}

impl RecordingWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[WidgetCall] {
        &self.calls
    }

    /// Drain the call log, keeping marker state.
    pub fn take_calls(&mut self) -> Vec<WidgetCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn live_markers(&self) -> usize {
        self.markers.iter().filter(|m| m.live).count()
    }

    pub fn popup(&self, marker: usize) -> Option<&str> {
        self.markers
            .get(marker)
            .filter(|m| m.live)
            .map(|m| m.popup.as_str())
    }

    pub fn count(&self, pred: impl Fn(&WidgetCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl MapWidget for RecordingWidget {
    type Handle = usize;

    fn create_marker(&mut self, position: LatLon, style: &MarkerStyle, popup: &str) -> usize {
        let marker = self.markers.len();
        self.markers.push(RecordedMarker {
            position,
            popup: popup.to_string(),
            live: true,
        });
        self.calls.push(WidgetCall::Create {
            marker,
            position,
            category: style.category,
        });
        marker
    }

    fn move_marker(&mut self, handle: &usize, position: LatLon) {
        if let Some(m) = self.markers.get_mut(*handle) {
            m.position = position;
        }
        self.calls.push(WidgetCall::Move {
            marker: *handle,
            position,
        });
    }

    fn marker_position(&self, handle: &usize) -> LatLon {
        self.markers
            .get(*handle)
            .map(|m| m.position)
            .unwrap_or(LatLon::new(f64::NAN, f64::NAN))
    }

    fn set_popup(&mut self, handle: &usize, content: &str) {
        if let Some(m) = self.markers.get_mut(*handle) {
            m.popup = content.to_string();
        }
        self.calls.push(WidgetCall::SetPopup { marker: *handle });
    }

    fn remove_marker(&mut self, handle: usize) {
        if let Some(m) = self.markers.get_mut(handle) {
            m.live = false;
        }
        self.calls.push(WidgetCall::Remove { marker: handle });
    }
}
