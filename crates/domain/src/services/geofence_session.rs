//! Per-subject glue between the position stream, the zone tracker and the
//! alert relay.

use metrics::counter;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::alert_relay::{AlertRelay, SendOutcome};
use super::position_watcher::PositionEvent;
use super::zone_matcher::ZoneTracker;
use crate::models::{AlertDraft, PositionHistory, Zone};

pub struct GeofenceSession {
    subject_id: String,
    zones: Arc<Vec<Zone>>,
    tracker: Arc<Mutex<ZoneTracker>>,
    relay: Arc<AlertRelay>,
    history: Arc<Mutex<PositionHistory>>,
}

impl GeofenceSession {
    pub fn new(
        subject_id: impl Into<String>,
        zones: Arc<Vec<Zone>>,
        tracker: Arc<Mutex<ZoneTracker>>,
        relay: Arc<AlertRelay>,
        history: Arc<Mutex<PositionHistory>>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            zones,
            tracker,
            relay,
            history,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Processes one watcher event. Returns the alert outcome when the event
    /// caused a zone transition.
    pub async fn handle_event(&self, event: PositionEvent) -> Option<SendOutcome> {
        let sample = match event {
            Ok(sample) => sample,
            Err(e) => {
                warn!(
                    subject_id = %self.subject_id,
                    code = e.code(),
                    error = %e,
                    "Location error"
                );
                return None;
            }
        };

        if let Ok(mut history) = self.history.lock() {
            history.push(sample.clone());
        }
        self.relay.record_position(&self.subject_id, sample.point());

        let evaluation = {
            let Ok(mut tracker) = self.tracker.lock() else {
                return None;
            };
            match tracker.observe(&self.subject_id, &sample, &self.zones) {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    warn!(subject_id = %self.subject_id, error = %e, "Zone evaluation failed");
                    return None;
                }
            }
        };

        if !evaluation.transition.is_change() {
            return None;
        }
        counter!("zone_transitions_total", "transition" => evaluation.transition.as_str())
            .increment(1);

        let Some(zone) = evaluation.zone.as_ref() else {
            debug!(subject_id = %self.subject_id, "Left a zone that is no longer configured");
            return None;
        };
        info!(
            subject_id = %self.subject_id,
            zone_id = %zone.id,
            transition = %evaluation.transition,
            "Zone transition"
        );

        let draft =
            AlertDraft::zone_transition(&self.subject_id, zone, evaluation.transition, &sample)?;
        match self.relay.send(draft).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(subject_id = %self.subject_id, error = %e, "Zone alert rejected");
                None
            }
        }
    }

    /// Runs the session until the event stream closes, then forgets the
    /// subject's zone membership.
    pub fn spawn(self, mut events: broadcast::Receiver<PositionEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.handle_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            subject_id = %self.subject_id,
                            skipped = skipped,
                            "Geofence session lagged, fixes skipped"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            if let Ok(mut tracker) = self.tracker.lock() {
                tracker.clear(&self.subject_id);
            }
            info!(subject_id = %self.subject_id, "Geofence session ended");
        })
    }
}
