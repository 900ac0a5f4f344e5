use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::dao::models::{LifecycleEntity, LifecycleStateEntity};

/// Phase an activity is in, with the timestamps each phase guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityPhase {
    /// Created or reset; never started since.
    Draft,
    /// Accepting submissions.
    Running { started_at: SystemTime },
    /// Closed manually or by the expiry timer.
    Ended {
        started_at: SystemTime,
        ended_at: SystemTime,
    },
}

/// Events that can be applied to an activity lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Instructor (re)starts the activity.
    Start { now: SystemTime },
    /// Instructor closes the activity.
    Stop { now: SystemTime },
    /// Expiry timer armed for `epoch` fired.
    Expire { epoch: u64, now: SystemTime },
    /// Back to draft; responses are purged by the caller.
    Reset,
}

/// Reason an event left the lifecycle untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NoTransition {
    #[error("activity is not running")]
    NotRunning,
    #[error("expiry armed for epoch {scheduled} but activity is at epoch {current}")]
    StaleEpoch { scheduled: u64, current: u64 },
}

/// A persisted lifecycle that violates the phase invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("inconsistent lifecycle record: {0}")]
pub struct InvalidLifecycle(&'static str);

/// Lifecycle of a single activity: its phase plus the start epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    phase: ActivityPhase,
    epoch: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            phase: ActivityPhase::Draft,
            epoch: 0,
        }
    }
}

impl Lifecycle {
    pub fn phase(&self) -> ActivityPhase {
        self.phase
    }

    /// Number of starts so far; identifies the current run.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, ActivityPhase::Running { .. })
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        match self.phase {
            ActivityPhase::Draft => None,
            ActivityPhase::Running { started_at } | ActivityPhase::Ended { started_at, .. } => {
                Some(started_at)
            }
        }
    }

    pub fn ended_at(&self) -> Option<SystemTime> {
        match self.phase {
            ActivityPhase::Ended { ended_at, .. } => Some(ended_at),
            _ => None,
        }
    }

    /// Deadline of the current run, when running.
    pub fn will_end_at(&self, duration: Duration) -> Option<SystemTime> {
        match self.phase {
            ActivityPhase::Running { started_at } => Some(started_at + duration),
            _ => None,
        }
    }

    /// Compute the lifecycle that results from `event`.
    pub fn plan(&self, event: LifecycleEvent) -> Result<Lifecycle, NoTransition> {
        let next = match (self.phase, event) {
            // A fresh start from Running closes the previous run implicitly.
            (_, LifecycleEvent::Start { now }) => Lifecycle {
                phase: ActivityPhase::Running { started_at: now },
                epoch: self.epoch + 1,
            },
            (ActivityPhase::Running { started_at }, LifecycleEvent::Stop { now }) => {
                self.ended(started_at, now)
            }
            (ActivityPhase::Running { started_at }, LifecycleEvent::Expire { epoch, now }) => {
                if epoch != self.epoch {
                    return Err(NoTransition::StaleEpoch {
                        scheduled: epoch,
                        current: self.epoch,
                    });
                }
                self.ended(started_at, now)
            }
            (_, LifecycleEvent::Stop { .. } | LifecycleEvent::Expire { .. }) => {
                return Err(NoTransition::NotRunning);
            }
            (_, LifecycleEvent::Reset) => Lifecycle {
                phase: ActivityPhase::Draft,
                epoch: self.epoch,
            },
        };

        Ok(next)
    }

    fn ended(&self, started_at: SystemTime, now: SystemTime) -> Lifecycle {
        Lifecycle {
            phase: ActivityPhase::Ended {
                started_at,
                ended_at: now.max(started_at),
            },
            epoch: self.epoch,
        }
    }
}

impl From<Lifecycle> for LifecycleEntity {
    fn from(value: Lifecycle) -> Self {
        let state = match value.phase {
            ActivityPhase::Draft => LifecycleStateEntity::Draft,
            ActivityPhase::Running { .. } => LifecycleStateEntity::Running,
            ActivityPhase::Ended { .. } => LifecycleStateEntity::Ended,
        };
        Self {
            state,
            started_at: value.started_at(),
            ended_at: value.ended_at(),
            start_epoch: value.epoch,
        }
    }
}

impl TryFrom<&LifecycleEntity> for Lifecycle {
    type Error = InvalidLifecycle;

    fn try_from(value: &LifecycleEntity) -> Result<Self, Self::Error> {
        let phase = match (value.state, value.started_at, value.ended_at) {
            (LifecycleStateEntity::Draft, None, None) => ActivityPhase::Draft,
            (LifecycleStateEntity::Draft, _, _) => {
                return Err(InvalidLifecycle("draft activity carries timestamps"));
            }
            (LifecycleStateEntity::Running, Some(started_at), None) => {
                ActivityPhase::Running { started_at }
            }
            (LifecycleStateEntity::Running, _, _) => {
                return Err(InvalidLifecycle("running activity needs only started_at"));
            }
            (LifecycleStateEntity::Ended, Some(started_at), Some(ended_at))
                if ended_at >= started_at =>
            {
                ActivityPhase::Ended {
                    started_at,
                    ended_at,
                }
            }
            (LifecycleStateEntity::Ended, _, _) => {
                return Err(InvalidLifecycle("ended activity needs ordered timestamps"));
            }
        };

        Ok(Self {
            phase,
            epoch: value.start_epoch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn apply(lifecycle: Lifecycle, event: LifecycleEvent) -> Lifecycle {
        lifecycle.plan(event).unwrap()
    }

    #[test]
    fn initial_lifecycle_is_draft() {
        let lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.phase(), ActivityPhase::Draft);
        assert_eq!(lifecycle.epoch(), 0);
        assert_eq!(lifecycle.started_at(), None);
    }

    #[test]
    fn start_stop_restart_cycle() {
        let running = apply(Lifecycle::default(), LifecycleEvent::Start { now: at(0) });
        assert_eq!(running.phase(), ActivityPhase::Running { started_at: at(0) });
        assert_eq!(running.epoch(), 1);
        assert_eq!(
            running.will_end_at(Duration::from_secs(30)),
            Some(at(30))
        );

        let ended = apply(running, LifecycleEvent::Stop { now: at(12) });
        assert_eq!(ended.ended_at(), Some(at(12)));
        assert_eq!(ended.epoch(), 1);

        let again = apply(ended, LifecycleEvent::Start { now: at(40) });
        assert_eq!(again.epoch(), 2);
        assert_eq!(again.ended_at(), None);
    }

    #[test]
    fn restart_while_running_bumps_epoch() {
        let first = apply(Lifecycle::default(), LifecycleEvent::Start { now: at(0) });
        let second = apply(first, LifecycleEvent::Start { now: at(3) });
        assert_eq!(second.epoch(), 2);
        assert_eq!(second.started_at(), Some(at(3)));
    }

    #[test]
    fn stale_expiry_is_rejected() {
        let first = apply(Lifecycle::default(), LifecycleEvent::Start { now: at(0) });
        let second = apply(first, LifecycleEvent::Start { now: at(3) });

        assert_eq!(
            second.plan(LifecycleEvent::Expire {
                epoch: 1,
                now: at(10)
            }),
            Err(NoTransition::StaleEpoch {
                scheduled: 1,
                current: 2
            })
        );

        let ended = apply(
            second,
            LifecycleEvent::Expire {
                epoch: 2,
                now: at(13),
            },
        );
        assert_eq!(ended.ended_at(), Some(at(13)));
    }

    #[test]
    fn stop_outside_running_is_not_a_transition() {
        assert_eq!(
            Lifecycle::default().plan(LifecycleEvent::Stop { now: at(1) }),
            Err(NoTransition::NotRunning)
        );

        let running = apply(Lifecycle::default(), LifecycleEvent::Start { now: at(0) });
        let ended = apply(running, LifecycleEvent::Stop { now: at(5) });
        assert_eq!(
            ended.plan(LifecycleEvent::Stop { now: at(9) }),
            Err(NoTransition::NotRunning)
        );
        assert_eq!(
            ended.plan(LifecycleEvent::Expire { epoch: 1, now: at(9) }),
            Err(NoTransition::NotRunning)
        );
    }

    #[test]
    fn ended_at_never_precedes_started_at() {
        let running = apply(Lifecycle::default(), LifecycleEvent::Start { now: at(10) });
        let ended = apply(running, LifecycleEvent::Stop { now: at(4) });
        assert_eq!(ended.ended_at(), Some(at(10)));
    }

    #[test]
    fn reset_returns_to_draft_and_keeps_epoch() {
        let running = apply(Lifecycle::default(), LifecycleEvent::Start { now: at(0) });
        let draft = apply(running, LifecycleEvent::Reset);
        assert_eq!(draft.phase(), ActivityPhase::Draft);
        assert_eq!(draft.epoch(), 1);

        let restarted = apply(draft, LifecycleEvent::Start { now: at(20) });
        assert_eq!(restarted.epoch(), 2);
    }

    #[test]
    fn entity_conversion_checks_invariants() {
        let running = apply(Lifecycle::default(), LifecycleEvent::Start { now: at(0) });
        let entity = LifecycleEntity::from(running);
        assert_eq!(entity.state, LifecycleStateEntity::Running);
        assert_eq!(Lifecycle::try_from(&entity), Ok(running));

        let broken = LifecycleEntity {
            state: LifecycleStateEntity::Ended,
            started_at: Some(at(10)),
            ended_at: Some(at(5)),
            start_epoch: 1,
        };
        assert!(Lifecycle::try_from(&broken).is_err());

        let broken = LifecycleEntity {
            ended_at: Some(at(1)),
            ..LifecycleEntity::draft()
        };
        assert!(Lifecycle::try_from(&broken).is_err());
    }
}
