//! Execution control commands.
//!
//! Each command arms the session's event-suppression flags, issues the CDP
//! command, and leaves a completion token in `current_step`. The adapter
//! holds the matching sender until the DAP response has been written, which
//! is what keeps `Stopped` after the response on the wire.

use std::sync::Arc;

use chrome_cdp::Cdp;
use tokio::sync::{oneshot, Mutex};

use crate::error::Result;
use crate::session::{ExpectedStop, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Continue,
    Next,
    StepIn,
    StepOut,
    Pause,
}

pub struct StepController {
    state: Arc<Mutex<Session>>,
}

impl StepController {
    pub fn new(state: Arc<Mutex<Session>>) -> Self {
        Self { state }
    }

    /// Issues the command and returns the sender side of the completion
    /// token. The receiver is parked in the session and awaited before the
    /// next `Stopped` emission.
    pub async fn run(&self, cdp: &Cdp, kind: StepKind) -> Result<oneshot::Sender<()>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let mut session = self.state.lock().await;
            match kind {
                StepKind::Continue => {
                    session.expecting_resumed_event = true;
                }
                StepKind::Next | StepKind::StepIn | StepKind::StepOut => {
                    session.expecting_resumed_event = true;
                    session.expecting_stop_reason = Some(ExpectedStop::Step);
                }
                StepKind::Pause => {
                    // expecting_resumed_event stays clear: the resume after a
                    // user pause is reported to the editor.
                    session.expecting_stop_reason = Some(ExpectedStop::UserRequest);
                }
            }
            session.current_step = Some(ack_rx);
        }

        match kind {
            StepKind::Continue => cdp.resume().await?,
            StepKind::Next => cdp.step_over().await?,
            StepKind::StepIn => cdp.step_into().await?,
            StepKind::StepOut => cdp.step_out().await?,
            StepKind::Pause => cdp.pause().await?,
        }

        Ok(ack_tx)
    }
}
