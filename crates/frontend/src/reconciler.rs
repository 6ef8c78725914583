use std::collections::{HashMap, HashSet};

use trainmap_shared::models::{TrainId, TrainSnapshot, MOVE_TOLERANCE};
use trainmap_shared::popup::popup_content;

use crate::widget::{MapWidget, MarkerStyle};

/// Counts of widget mutations produced by one ingest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub moved: usize,
    pub popups: usize,
    pub removed: usize,
    /// Snapshots ignored because they carried no usable position.
    pub skipped: usize,
}

impl ReconcileReport {
    pub fn merge(&mut self, other: ReconcileReport) {
        self.created += other.created;
        self.moved += other.moved;
        self.popups += other.popups;
        self.removed += other.removed;
        self.skipped += other.skipped;
    }
}

/// Keeps one marker per live train and mirrors train state onto it with as
/// few widget calls as possible.
pub struct Reconciler<W: MapWidget> {
    widget: W,
    markers: HashMap<TrainId, W::Handle>,
    tolerance: f64,
}

impl<W: MapWidget> Reconciler<W> {
    pub fn new(widget: W) -> Self {
        Self::with_tolerance(widget, MOVE_TOLERANCE)
    }

    pub fn with_tolerance(widget: W, tolerance: f64) -> Self {
        Self {
            widget,
            markers: HashMap::new(),
            tolerance,
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn contains(&self, id: TrainId) -> bool {
        self.markers.contains_key(&id)
    }

    /// Identifiers with a live marker, sorted.
    pub fn ids(&self) -> Vec<TrainId> {
        let mut ids: Vec<TrainId> = self.markers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Apply `snapshots` as the complete live set: markers for trains not in
    /// the set are removed, the rest are created or updated.
    pub fn ingest_full(&mut self, snapshots: &[TrainSnapshot]) -> ReconcileReport {
        self.ingest_full_retaining(snapshots, &[])
    }

    /// Like [`ingest_full`](Self::ingest_full), but the trains in `retained`
    /// also count as present. Used for entries of the set that named a train
    /// but could not be decoded: their markers are left as they are.
    pub fn ingest_full_retaining(
        &mut self,
        snapshots: &[TrainSnapshot],
        retained: &[TrainId],
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let incoming: HashSet<TrainId> = snapshots
            .iter()
            .map(|t| t.id)
            .chain(retained.iter().copied())
            .collect();
        let stale: Vec<TrainId> = self
            .markers
            .keys()
            .filter(|id| !incoming.contains(id))
            .copied()
            .collect();
        for id in stale {
            if self.remove(id) {
                report.removed += 1;
            }
        }

        for train in snapshots {
            self.upsert(train, &mut report);
        }

        tracing::debug!(
            trains = snapshots.len(),
            created = report.created,
            moved = report.moved,
            removed = report.removed,
            skipped = report.skipped,
            "Applied full train set"
        );
        report
    }

    /// Create or update the marker of a single train; other markers are untouched.
    pub fn ingest_delta(&mut self, snapshot: &TrainSnapshot) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        self.upsert(snapshot, &mut report);
        tracing::trace!(id = snapshot.id, ?report, "Applied train delta");
        report
    }

    /// Remove the marker for `id`. Returns whether one existed.
    pub fn remove(&mut self, id: TrainId) -> bool {
        match self.markers.remove(&id) {
            Some(handle) => {
                self.widget.remove_marker(handle);
                tracing::debug!(id, "Removed train marker");
                true
            }
            None => false,
        }
    }

    /// Release every marker. Returns how many were released; calling it again is a no-op.
    pub fn teardown(&mut self) -> usize {
        let released = self.markers.len();
        for (_, handle) in self.markers.drain() {
            self.widget.remove_marker(handle);
        }
        if released > 0 {
            tracing::debug!(released, "Released all train markers");
        }
        released
    }

    fn upsert(&mut self, train: &TrainSnapshot, report: &mut ReconcileReport) {
        let Some(position) = train.position() else {
            tracing::trace!(id = train.id, "Train has no position, skipping");
            report.skipped += 1;
            return;
        };
        let popup = popup_content(train);

        match self.markers.get(&train.id) {
            Some(handle) => {
                let current = self.widget.marker_position(handle);
                // Sub-tolerance moves are sensor noise; redrawing them makes markers jitter.
                if current.moved_beyond(position, self.tolerance) {
                    self.widget.move_marker(handle, position);
                    report.moved += 1;
                }
                self.widget.set_popup(handle, &popup);
                report.popups += 1;
            }
            None => {
                let style = MarkerStyle::for_train(&train.train_number, train.bearing);
                let handle = self.widget.create_marker(position, &style, &popup);
                self.markers.insert(train.id, handle);
                report.created += 1;
            }
        }
    }
}
