use crate::config::TrainMapConfig;
use crate::feed::{decode_all, decode_batch, decode_snapshot, ChangeEvent, ChangeSource};
use crate::readiness::CancelToken;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::widget::{MapWidget, WidgetError};

pub enum MapState<W: MapWidget> {
    /// The map library has not produced a widget yet.
    Waiting,
    Live(Reconciler<W>),
    /// Widget initialization failed; holds the message shown to the user.
    Failed(String),
    TornDown,
}

/// Lifecycle of one live train map: waits for the widget, seeds it from the
/// page, routes change events into the reconciler, and tears down cleanly.
///
/// Hosts keep a direct handle to this value and push events into
/// [`TrainMap::handle`].
pub struct TrainMap<S: ChangeSource, W: MapWidget> {
    source: S,
    config: TrainMapConfig,
    state: MapState<W>,
    cancel: CancelToken,
    subscribed: bool,
}

impl<S: ChangeSource, W: MapWidget> TrainMap<S, W> {
    pub fn new(source: S, config: TrainMapConfig) -> Self {
        Self {
            source,
            config,
            state: MapState::Waiting,
            cancel: CancelToken::new(),
            subscribed: false,
        }
    }

    pub fn config(&self) -> &TrainMapConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> &MapState<W> {
        &self.state
    }

    /// Token that a pending readiness wait should observe; cancelled on teardown.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, MapState::Live(_))
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            MapState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn reconciler(&self) -> Option<&Reconciler<W>> {
        match &self.state {
            MapState::Live(r) => Some(r),
            _ => None,
        }
    }

    pub fn reconciler_mut(&mut self) -> Option<&mut Reconciler<W>> {
        match &mut self.state {
            MapState::Live(r) => Some(r),
            _ => None,
        }
    }

    /// Build the widget with `init`, start listening and seed the markers.
    ///
    /// Returns `Ok(None)` when the map is not waiting for a widget (already
    /// live, failed or torn down). An initialization error moves the map to
    /// the failed state and is returned exactly once.
    pub fn attach<F>(&mut self, init: F) -> Result<Option<ReconcileReport>, WidgetError>
    where
        F: FnOnce(&TrainMapConfig) -> Result<W, WidgetError>,
    {
        if !matches!(self.state, MapState::Waiting) {
            tracing::debug!("Ignoring attach: map is not waiting for a widget");
            return Ok(None);
        }

        let widget = match init(&self.config) {
            Ok(widget) => widget,
            Err(e) => {
                tracing::error!(error = %e, "Error initializing map");
                self.state = MapState::Failed(e.to_string());
                return Err(e);
            }
        };

        let mut reconciler = Reconciler::with_tolerance(widget, self.config.effective_tolerance());
        self.source.subscribe();
        self.subscribed = true;

        let seed = decode_all(&self.source.list_current_entities());
        tracing::info!(trains = seed.len(), "Loading initial trains");
        let report = reconciler.ingest_full(&seed);
        self.state = MapState::Live(reconciler);
        Ok(Some(report))
    }

    /// Allow another [`attach`](Self::attach) after a failed initialization.
    pub fn reinitialize(&mut self) -> bool {
        if matches!(self.state, MapState::Failed(_)) {
            self.state = MapState::Waiting;
            self.cancel = CancelToken::new();
            true
        } else {
            false
        }
    }

    /// Apply one change notification. Events are dropped unless the map is live.
    pub fn handle(&mut self, event: ChangeEvent) -> Option<ReconcileReport> {
        let reconciler = match &mut self.state {
            MapState::Live(r) => r,
            _ => {
                tracing::debug!(?event, "Map not live, dropping event");
                return None;
            }
        };

        match event {
            ChangeEvent::Added { payload } | ChangeEvent::Updated { payload } => {
                match decode_snapshot(&payload) {
                    Ok(train) => Some(reconciler.ingest_delta(&train)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping train notification");
                        None
                    }
                }
            }
            ChangeEvent::Removed { id } => {
                let mut report = ReconcileReport::default();
                if reconciler.remove(id) {
                    report.removed = 1;
                }
                Some(report)
            }
            ChangeEvent::Refresh { payload } => match decode_batch(&payload) {
                Ok(batch) => {
                    Some(reconciler.ingest_full_retaining(&batch.trains, &batch.retained))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping train refresh");
                    None
                }
            },
        }
    }

    /// Stop listening, abandon any readiness wait, then release all markers.
    /// Returns the number of markers released. Idempotent.
    pub fn teardown(&mut self) -> usize {
        if matches!(self.state, MapState::TornDown) {
            return 0;
        }
        self.cancel.cancel();
        if self.subscribed {
            self.source.unsubscribe();
            self.subscribed = false;
        }
        let released = match &mut self.state {
            MapState::Live(r) => r.teardown(),
            _ => 0,
        };
        self.state = MapState::TornDown;
        tracing::info!(released, "Train map torn down");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{RecordingWidget, WidgetCall};

    #[derive(Default)]
    struct FakeSource {
        entities: Vec<String>,
        subscribed: bool,
        subscribe_calls: usize,
        unsubscribe_calls: usize,
    }

    impl ChangeSource for FakeSource {
        fn list_current_entities(&self) -> Vec<String> {
            self.entities.clone()
        }

        fn subscribe(&mut self) {
            self.subscribed = true;
            self.subscribe_calls += 1;
        }

        fn unsubscribe(&mut self) {
            self.subscribed = false;
            self.unsubscribe_calls += 1;
        }
    }

    fn train_json(id: u64, lat: f64, lon: f64, number: &str) -> String {
        format!(r#"{{"id": {id}, "latitude": {lat}, "longitude": {lon}, "train_number": "{number}"}}"#)
    }

    fn seeded_source() -> FakeSource {
        FakeSource {
            entities: vec![
                train_json(1, 48.8, 2.3, "TGV101"),
                train_json(2, 45.7, 4.8, "TER200"),
                "not json".to_string(),
            ],
            ..FakeSource::default()
        }
    }

    fn live_map() -> TrainMap<FakeSource, RecordingWidget> {
        let mut map = TrainMap::new(seeded_source(), TrainMapConfig::default());
        map.attach(|_| Ok(RecordingWidget::new())).unwrap();
        map
    }

    #[test]
    fn test_attach_seeds_and_subscribes() {
        let mut map = TrainMap::new(seeded_source(), TrainMapConfig::default());
        let report = map.attach(|_| Ok(RecordingWidget::new())).unwrap().unwrap();
        assert_eq!(report.created, 2);
        assert!(map.is_live());
        assert!(map.source().subscribed);
        assert_eq!(map.reconciler().unwrap().ids(), vec![1, 2]);
    }

    #[test]
    fn test_events_before_attach_are_dropped() {
        let mut map: TrainMap<FakeSource, RecordingWidget> =
            TrainMap::new(FakeSource::default(), TrainMapConfig::default());
        let event = ChangeEvent::Added {
            payload: train_json(9, 1.0, 1.0, "IC1"),
        };
        assert!(map.handle(event).is_none());
        map.attach(|_| Ok(RecordingWidget::new())).unwrap();
        assert!(map.reconciler().unwrap().is_empty());
    }

    #[test]
    fn test_attach_twice_is_ignored() {
        let mut map = live_map();
        assert!(map.attach(|_| Ok(RecordingWidget::new())).unwrap().is_none());
        assert_eq!(map.source().subscribe_calls, 1);
    }

    #[test]
    fn test_widget_failure_reported_once() {
        let mut map: TrainMap<FakeSource, RecordingWidget> =
            TrainMap::new(seeded_source(), TrainMapConfig::default());
        let err = map
            .attach(|_| Err(WidgetError::Unavailable("L.map threw".to_string())))
            .unwrap_err();
        assert!(err.to_string().contains("L.map threw"));
        assert_eq!(map.failure(), Some("map widget unavailable: L.map threw"));
        assert!(!map.source().subscribed);

        // Suspended: further attaches and events do nothing until reinitialized.
        assert!(map.attach(|_| Ok(RecordingWidget::new())).unwrap().is_none());
        assert!(map
            .handle(ChangeEvent::Removed { id: 1 })
            .is_none());

        assert!(map.reinitialize());
        assert!(map.attach(|_| Ok(RecordingWidget::new())).unwrap().is_some());
        assert!(map.is_live());
    }

    #[test]
    fn test_attach_receives_config() {
        let config = TrainMapConfig {
            zoom: 11,
            ..TrainMapConfig::default()
        };
        let mut map: TrainMap<FakeSource, RecordingWidget> =
            TrainMap::new(FakeSource::default(), config);
        let mut seen_zoom = 0;
        map.attach(|c| {
            seen_zoom = c.zoom;
            Ok(RecordingWidget::new())
        })
        .unwrap();
        assert_eq!(seen_zoom, 11);
    }

    #[test]
    fn test_added_updated_removed() {
        let mut map = live_map();
        let report = map
            .handle(ChangeEvent::Added {
                payload: train_json(3, 43.6, 1.4, "IC37"),
            })
            .unwrap();
        assert_eq!(report.created, 1);

        let report = map
            .handle(ChangeEvent::Updated {
                payload: train_json(3, 43.61, 1.4, "IC37"),
            })
            .unwrap();
        assert_eq!(report.moved, 1);

        let report = map.handle(ChangeEvent::Removed { id: 3 }).unwrap();
        assert_eq!(report.removed, 1);
        let report = map.handle(ChangeEvent::Removed { id: 3 }).unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(map.reconciler().unwrap().ids(), vec![1, 2]);
    }

    #[test]
    fn test_bad_payload_is_dropped() {
        let mut map = live_map();
        let calls_before = map.reconciler().unwrap().widget().calls().len();
        assert!(map
            .handle(ChangeEvent::Updated {
                payload: "{broken".to_string()
            })
            .is_none());
        assert!(map
            .handle(ChangeEvent::Added {
                payload: r#"{"latitude": 1, "longitude": 2}"#.to_string()
            })
            .is_none());
        assert_eq!(map.reconciler().unwrap().widget().calls().len(), calls_before);
    }

    #[test]
    fn test_refresh_replaces_set() {
        let mut map = live_map();
        let payload = format!("[{}]", train_json(2, 45.7, 4.8, "TER200"));
        let report = map.handle(ChangeEvent::Refresh { payload }).unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(map.reconciler().unwrap().ids(), vec![2]);
    }

    #[test]
    fn test_refresh_keeps_marker_of_malformed_entry() {
        let mut map = live_map();
        let payload = format!(
            r#"[{{"id": 1, "latitude": "n/a", "longitude": 2.3, "train_number": "TGV101"}}, {}]"#,
            train_json(2, 45.7, 4.8, "TER200")
        );
        let report = map.handle(ChangeEvent::Refresh { payload }).unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(map.reconciler().unwrap().ids(), vec![1, 2]);

        // An entry that loses its coordinates keeps its marker as well.
        let payload = format!(
            r#"[{{"id": 1, "latitude": null, "train_number": "TGV101"}}, {}]"#,
            train_json(2, 45.7, 4.8, "TER200")
        );
        let report = map.handle(ChangeEvent::Refresh { payload }).unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(map.reconciler().unwrap().ids(), vec![1, 2]);
    }

    #[test]
    fn test_teardown_order_and_idempotence() {
        let mut map = live_map();
        let token = map.cancel_token();
        assert_eq!(map.teardown(), 2);
        assert!(token.is_cancelled());
        assert!(!map.source().subscribed);
        assert_eq!(map.source().unsubscribe_calls, 1);

        assert_eq!(map.teardown(), 0);
        assert_eq!(map.source().unsubscribe_calls, 1);
    }

    #[test]
    fn test_late_event_after_teardown_creates_nothing() {
        let mut map = live_map();
        map.teardown();
        let event = ChangeEvent::Added {
            payload: train_json(7, 48.0, 2.0, "TGV7"),
        };
        assert!(map.handle(event).is_none());
        assert!(map.reconciler().is_none());
        assert!(map.attach(|_| Ok(RecordingWidget::new())).unwrap().is_none());
    }

    #[test]
    fn test_teardown_while_waiting_cancels_readiness() {
        let mut map: TrainMap<FakeSource, RecordingWidget> =
            TrainMap::new(FakeSource::default(), TrainMapConfig::default());
        let token = map.cancel_token();
        assert_eq!(map.teardown(), 0);
        assert!(token.is_cancelled());
        assert_eq!(map.source().unsubscribe_calls, 0);
    }

    #[test]
    fn test_seed_skips_entities_without_position() {
        let source = FakeSource {
            entities: vec![
                train_json(1, 48.8, 2.3, "TGV101"),
                r#"{"id": 2, "train_number": "TER9"}"#.to_string(),
            ],
            ..FakeSource::default()
        };
        let mut map = TrainMap::new(source, TrainMapConfig::default());
        let report = map.attach(|_| Ok(RecordingWidget::new())).unwrap().unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        let calls = map.reconciler().unwrap().widget().calls();
        assert!(matches!(calls[0], WidgetCall::Create { marker: 0, .. }));
    }
}
