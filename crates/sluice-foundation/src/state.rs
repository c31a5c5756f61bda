use crate::error::EngineError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Session lifecycle. A session is one transport connection with its own
/// ring buffer, shield, and scorer state; `Recovering` always rebuilds all
/// of them before returning to `Running`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Initializing,
    Running,
    Recovering { from_error: String },
    Stopping,
    Stopped,
}

pub struct SessionStateManager {
    state: Arc<RwLock<SessionState>>,
    state_tx: Sender<SessionState>,
    state_rx: Receiver<SessionState>,
}

impl Default for SessionStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(SessionState::Initializing)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: SessionState) -> Result<(), EngineError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (SessionState::Initializing, SessionState::Running)
                | (SessionState::Running, SessionState::Recovering { .. })
                | (SessionState::Running, SessionState::Stopping)
                | (SessionState::Recovering { .. }, SessionState::Running)
                | (SessionState::Recovering { .. }, SessionState::Stopping)
                | (SessionState::Stopping, SessionState::Stopped)
        );

        if !valid {
            return Err(EngineError::Fatal(format!(
                "Invalid session transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("Session transition: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_lifecycle() {
        let mgr = SessionStateManager::new();
        assert_eq!(mgr.current(), SessionState::Initializing);
        mgr.transition(SessionState::Running).unwrap();
        mgr.transition(SessionState::Stopping).unwrap();
        mgr.transition(SessionState::Stopped).unwrap();
        assert_eq!(mgr.current(), SessionState::Stopped);
    }

    #[test]
    fn transport_loss_forces_recovery_roundtrip() {
        let mgr = SessionStateManager::new();
        mgr.transition(SessionState::Running).unwrap();
        mgr.transition(SessionState::Recovering {
            from_error: "transport closed".into(),
        })
        .unwrap();
        mgr.transition(SessionState::Running).unwrap();
        assert_eq!(mgr.current(), SessionState::Running);
    }

    #[test]
    fn cannot_resume_from_stopped() {
        let mgr = SessionStateManager::new();
        mgr.transition(SessionState::Running).unwrap();
        mgr.transition(SessionState::Stopping).unwrap();
        mgr.transition(SessionState::Stopped).unwrap();
        assert!(mgr.transition(SessionState::Running).is_err());
    }

    #[test]
    fn subscribers_observe_transitions() {
        let mgr = SessionStateManager::new();
        let rx = mgr.subscribe();
        mgr.transition(SessionState::Running).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SessionState::Running);
    }
}
