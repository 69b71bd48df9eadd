use std::sync::atomic::{AtomicU8, Ordering};

/// Client lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Open,
    Closing,
    Closed,
}

/// Atomic lifecycle cell. `terminate()` is the single writer; the session
/// flows and the supervisor only read it. Transitions are monotonic, so a
/// racing advance can never move the state backwards.
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Open as u8))
    }

    pub(crate) fn state(&self) -> LifecycleState {
        match self.0.load(Ordering::SeqCst) {
            0 => LifecycleState::Open,
            1 => LifecycleState::Closing,
            _ => LifecycleState::Closed,
        }
    }

    pub(crate) fn advance(&self, to: LifecycleState) {
        self.0.fetch_max(to as u8, Ordering::SeqCst);
    }

    /// True once the client has entered `Closing` or `Closed`.
    pub(crate) fn is_closing(&self) -> bool {
        self.0.load(Ordering::SeqCst) >= LifecycleState::Closing as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_only_moves_forward() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Open);
        assert!(!lifecycle.is_closing());

        lifecycle.advance(LifecycleState::Closing);
        assert_eq!(lifecycle.state(), LifecycleState::Closing);
        assert!(lifecycle.is_closing());

        // A stale writer cannot reopen the client.
        lifecycle.advance(LifecycleState::Closed);
        lifecycle.advance(LifecycleState::Closing);
        assert_eq!(lifecycle.state(), LifecycleState::Closed);
    }
}
