use std::time::Duration;

use skysync_client::ClientError;

/// Total recorded errors at which a job aborts regardless of class.
pub const MAX_TOTAL_ERRORS: usize = 5;

const CONFLICT_CAP: u32 = 3;
const TRANSFER_CAP: u32 = 3;
const NETWORK_CAP: u32 = 2;

const CONFLICT_PAUSE: Duration = Duration::from_secs(30);
const TRANSFER_PAUSE: Duration = Duration::from_secs(30);
const NETWORK_PAUSE: Duration = Duration::from_secs(10);

/// Failure classes the adaptive policy distinguishes. Derived from the typed
/// client error, not from message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider refused because another operation is still in flight.
    Conflict,
    /// The provider rejected a transfer batch without a more specific cause.
    Transfer,
    /// Delete-side failures and already-gone targets; never worth a retry.
    Delete,
    /// Transport, timeout, or response-decode failures.
    Network,
    /// Everything else: log it and keep going.
    Other,
}

impl ErrorClass {
    pub fn of(err: &ClientError) -> Self {
        match err {
            ClientError::Conflict(_) => ErrorClass::Conflict,
            ClientError::Network(_) => ErrorClass::Network,
            ClientError::NotFound(_) => ErrorClass::Delete,
            _ => ErrorClass::Other,
        }
    }
}

/// What the engine should do after a batch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
    /// Sleep for `pause`, then re-issue the same batch.
    Retry { pause: Duration },
    /// Leave the batch failed and carry on with the rest of the tree.
    Continue,
    /// Stop the whole job.
    Abort { reason: String },
}

/// Per-job failure accounting. Consecutive-class streaks reset on success or
/// when a different class shows up; the network count never resets.
#[derive(Debug, Default)]
pub struct ErrorPolicy {
    conflict_streak: u32,
    transfer_streak: u32,
    network_total: u32,
}

impl ErrorPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch went through; consecutive failure streaks are over.
    pub fn record_success(&mut self) {
        self.conflict_streak = 0;
        self.transfer_streak = 0;
    }

    /// Decide the next move after a failure. `total_errors` is the number of
    /// errors collected on the job so far, including this one.
    pub fn assess(&mut self, class: ErrorClass, total_errors: usize) -> PolicyAction {
        if total_errors >= MAX_TOTAL_ERRORS {
            return PolicyAction::Abort {
                reason: format!("error count reached {total_errors}"),
            };
        }

        match class {
            ErrorClass::Conflict => {
                self.transfer_streak = 0;
                self.conflict_streak += 1;
                if self.conflict_streak >= CONFLICT_CAP {
                    PolicyAction::Abort {
                        reason: format!("{} consecutive provider conflicts", self.conflict_streak),
                    }
                } else {
                    PolicyAction::Retry { pause: CONFLICT_PAUSE }
                }
            }
            ErrorClass::Transfer => {
                self.conflict_streak = 0;
                self.transfer_streak += 1;
                if self.transfer_streak >= TRANSFER_CAP {
                    PolicyAction::Abort {
                        reason: format!("{} consecutive transfer failures", self.transfer_streak),
                    }
                } else {
                    PolicyAction::Retry { pause: TRANSFER_PAUSE }
                }
            }
            ErrorClass::Delete => {
                self.conflict_streak = 0;
                self.transfer_streak = 0;
                PolicyAction::Continue
            }
            ErrorClass::Network => {
                self.network_total += 1;
                if self.network_total >= NETWORK_CAP {
                    PolicyAction::Abort {
                        reason: format!("network errors reached {}", self.network_total),
                    }
                } else {
                    PolicyAction::Retry { pause: NETWORK_PAUSE }
                }
            }
            ErrorClass::Other => {
                self.conflict_streak = 0;
                self.transfer_streak = 0;
                PolicyAction::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_retry_twice_then_abort() {
        let mut policy = ErrorPolicy::new();
        assert_eq!(
            policy.assess(ErrorClass::Conflict, 1),
            PolicyAction::Retry { pause: Duration::from_secs(30) }
        );
        assert_eq!(
            policy.assess(ErrorClass::Conflict, 2),
            PolicyAction::Retry { pause: Duration::from_secs(30) }
        );
        assert!(matches!(
            policy.assess(ErrorClass::Conflict, 3),
            PolicyAction::Abort { .. }
        ));
    }

    #[test]
    fn success_resets_the_streak() {
        let mut policy = ErrorPolicy::new();
        policy.assess(ErrorClass::Conflict, 1);
        policy.assess(ErrorClass::Conflict, 2);
        policy.record_success();
        assert!(matches!(
            policy.assess(ErrorClass::Conflict, 3),
            PolicyAction::Retry { .. }
        ));
    }

    #[test]
    fn a_different_class_resets_the_streak() {
        let mut policy = ErrorPolicy::new();
        policy.assess(ErrorClass::Transfer, 1);
        policy.assess(ErrorClass::Transfer, 2);
        // delete-class failure in between
        assert_eq!(policy.assess(ErrorClass::Delete, 3), PolicyAction::Continue);
        assert!(matches!(
            policy.assess(ErrorClass::Transfer, 4),
            PolicyAction::Retry { .. }
        ));
    }

    #[test]
    fn network_errors_cap_at_two_total() {
        let mut policy = ErrorPolicy::new();
        assert_eq!(
            policy.assess(ErrorClass::Network, 1),
            PolicyAction::Retry { pause: Duration::from_secs(10) }
        );
        policy.record_success(); // network cap is total, not consecutive
        assert!(matches!(
            policy.assess(ErrorClass::Network, 2),
            PolicyAction::Abort { .. }
        ));
    }

    #[test]
    fn global_cap_overrides_class_handling() {
        let mut policy = ErrorPolicy::new();
        assert!(matches!(
            policy.assess(ErrorClass::Other, MAX_TOTAL_ERRORS),
            PolicyAction::Abort { .. }
        ));
    }

    #[test]
    fn delete_and_unknown_failures_continue() {
        let mut policy = ErrorPolicy::new();
        assert_eq!(policy.assess(ErrorClass::Delete, 1), PolicyAction::Continue);
        assert_eq!(policy.assess(ErrorClass::Other, 2), PolicyAction::Continue);
    }

    #[test]
    fn classification_follows_the_typed_variant() {
        assert_eq!(
            ErrorClass::of(&ClientError::Conflict("x".into())),
            ErrorClass::Conflict
        );
        assert_eq!(
            ErrorClass::of(&ClientError::Network("t".into())),
            ErrorClass::Network
        );
        assert_eq!(
            ErrorClass::of(&ClientError::NotFound("gone".into())),
            ErrorClass::Delete
        );
        assert_eq!(
            ErrorClass::of(&ClientError::Quota("full".into())),
            ErrorClass::Other
        );
    }
}
