use crate::logging::TerminationKind;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Tracks outstanding quit requests between polling cycles and decides when
/// a graceful quit escalates to forced termination
pub struct QuitEscalation {
    grace_period: Duration,
    /// identifier -> time of the first request in the current streak
    first_requested: HashMap<String, Instant>,
}

impl QuitEscalation {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            first_requested: HashMap::new(),
        }
    }

    /// Kind of request to issue now for `identifier`
    pub fn next_request(&mut self, identifier: &str, now: Instant) -> TerminationKind {
        let first = *self
            .first_requested
            .entry(identifier.to_string())
            .or_insert(now);

        if now.duration_since(first) >= self.grace_period {
            TerminationKind::Forced
        } else {
            TerminationKind::Graceful
        }
    }

    /// Forget applications that were not targeted in the latest cycle
    pub fn retain_targeted(&mut self, targeted: &HashSet<String>) {
        self.first_requested
            .retain(|identifier, _| targeted.contains(identifier));
    }

    pub fn pending(&self) -> usize {
        self.first_requested.len()
    }
}
