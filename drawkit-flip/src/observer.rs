//! Observer collaborator for the draw state machine.
//!
//! The orchestrator reports transitions through this seam instead of
//! writing to ambient logging itself, so the state machine stays free of
//! side effects and tests can assert the exact transition sequence.

use crate::draw::DrawState;
use crate::outcome::DrawOutcome;
use chrono::{DateTime, Utc};
use drawkit_core::Signature;
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DrawEvent {
    pub draw_id: Uuid,
    pub state: DrawState,
    /// Signature of the bundle that produced the transition, when one was
    /// submitted.
    pub signature: Option<Signature>,
    pub at: DateTime<Utc>,
}

pub trait DrawObserver: Send + Sync {
    fn on_transition(&self, event: DrawEvent);

    fn on_outcome(&self, _draw_id: Uuid, _outcome: &DrawOutcome) {}
}

/// Forwards transitions to the tracing subscriber.
pub struct TracingObserver;

impl DrawObserver for TracingObserver {
    fn on_transition(&self, event: DrawEvent) {
        match event.signature {
            Some(signature) => {
                tracing::info!(draw = %event.draw_id, state = %event.state, %signature, "draw transition")
            }
            None => tracing::info!(draw = %event.draw_id, state = %event.state, "draw transition"),
        }
    }

    fn on_outcome(&self, draw_id: Uuid, outcome: &DrawOutcome) {
        tracing::info!(
            draw = %draw_id,
            participant = %outcome.participant,
            result = %outcome.result,
            "draw settled"
        );
    }
}

/// Captures every event; tests use it to assert transition order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DrawEvent>>,
    outcomes: Mutex<Vec<(Uuid, DrawOutcome)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DrawEvent> {
        self.events.lock().clone()
    }

    pub fn states(&self) -> Vec<DrawState> {
        self.events.lock().iter().map(|e| e.state.clone()).collect()
    }

    pub fn outcomes(&self) -> Vec<(Uuid, DrawOutcome)> {
        self.outcomes.lock().clone()
    }
}

impl DrawObserver for RecordingObserver {
    fn on_transition(&self, event: DrawEvent) {
        self.events.lock().push(event);
    }

    fn on_outcome(&self, draw_id: Uuid, outcome: &DrawOutcome) {
        self.outcomes.lock().push((draw_id, outcome.clone()));
    }
}
