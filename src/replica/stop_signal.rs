use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stopper tells the paired task to stop once it is dropped. Leader-scoped tasks are stopped by
/// dropping the leader state that owns their Stopper.
pub(crate) struct Stopper {
    stop_signal: Arc<AtomicBool>,
}

#[derive(Clone)]
pub(crate) struct StopCheck {
    stop_signal: Arc<AtomicBool>,
}

impl Drop for Stopper {
    fn drop(&mut self) {
        self.stop_signal.store(true, Ordering::Release);
    }
}

impl StopCheck {
    pub(crate) fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::Acquire)
    }
}

pub(crate) fn new() -> (Stopper, StopCheck) {
    let stop_signal = Arc::new(AtomicBool::new(false));

    let stopper = Stopper {
        stop_signal: stop_signal.clone(),
    };
    let stop_check = StopCheck { stop_signal };

    (stopper, stop_check)
}

#[cfg(test)]
mod tests {
    #[test]
    fn drop_signals_stop() {
        let (stopper, stop_check) = super::new();
        let other_check = stop_check.clone();
        assert!(!stop_check.should_stop());

        drop(stopper);
        assert!(stop_check.should_stop());
        assert!(other_check.should_stop());
    }
}
