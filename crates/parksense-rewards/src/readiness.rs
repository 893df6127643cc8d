use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Whether the payout program is confirmed on the ledger.
///
/// Written once by the readiness poller, read by every reward attempt.
/// Never reset once set: a ledger that disappears mid-run is not detected.
#[derive(Debug, Default)]
pub struct Readiness {
    ready: AtomicBool,
    program: OnceLock<String>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// The confirmed program address, once ready.
    pub fn program(&self) -> Option<&str> {
        if self.is_ready() {
            self.program.get().map(String::as_str)
        } else {
            None
        }
    }

    /// Publishes the confirmed program address. Later calls are ignored.
    pub(crate) fn mark_ready(&self, program: String) -> bool {
        if self.program.set(program).is_err() {
            return false;
        }
        self.ready.store(true, Ordering::Release);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_ready() {
        let readiness = Readiness::new();
        assert!(!readiness.is_ready());
        assert_eq!(readiness.program(), None);
    }

    #[test]
    fn marks_ready_once() {
        let readiness = Readiness::new();
        assert!(readiness.mark_ready("0xprogram".to_string()));
        assert!(!readiness.mark_ready("0xother".to_string()));
        assert!(readiness.is_ready());
        assert_eq!(readiness.program(), Some("0xprogram"));
    }
}
