//! Progress events (§ "Event emission to UI").
//!
//! The executor never depends on a UI being attached: it writes
//! [`ProgressEvent`]s onto a `tokio::sync::mpsc::Sender` and moves on. Tests
//! substitute a capturing sink by reading the matching `Receiver` directly.

use crate::research::model::GateStatus;
use tokio::sync::mpsc;

/// Phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Plan just produced, before any action has run.
    Intake,
    /// An action is currently executing.
    Executing,
    /// A coverage/gate checkpoint was just computed.
    Checkpoint,
    /// Synthesizing a final answer from gathered evidence (reserved; the
    /// research core stops at `checkpoint` and hands off to the LLM loop).
    Synthesizing,
    /// Execution finished.
    Done,
}

/// A single progress update emitted during execution.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Which phase this event belongs to.
    pub phase: ProgressPhase,
    /// Human-readable message.
    pub message: String,
    /// Action ids known at this point, if relevant.
    pub actions: Option<Vec<String>>,
    /// Source ids known at this point, if relevant.
    pub sources: Option<Vec<String>>,
    /// The source currently being visited, if any.
    pub active_source_id: Option<String>,
    /// The URL currently being visited, if any.
    pub active_source_url: Option<String>,
    /// Current gate status, if computed.
    pub gate_status: Option<GateStatus>,
    /// Which checkpoint this is (1-based), if this is a checkpoint event.
    pub checkpoint_number: Option<u32>,
}

impl ProgressEvent {
    /// Builds a bare event carrying only phase and message.
    #[must_use]
    pub fn new(phase: ProgressPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            actions: None,
            sources: None,
            active_source_id: None,
            active_source_url: None,
            gate_status: None,
            checkpoint_number: None,
        }
    }
}

/// Sending half of the progress channel. Sends are best-effort: a dropped
/// receiver never aborts execution.
#[derive(Clone)]
pub struct ProgressSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink {
    /// Creates a linked sink/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Emits `event`, silently dropping it if nothing is listening.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}
