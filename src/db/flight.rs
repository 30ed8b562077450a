//! Outcome sharing for single-flight operations.
//!
//! The operation itself is serialized by the caller's lock. [`Flight`] only
//! remembers how the latest attempt ended, so callers that queued on the lock
//! while an attempt was running get that attempt's error instead of starting
//! their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Error;

/// Position in the attempt sequence when a caller started waiting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ticket(u64);

#[derive(Debug, Default)]
pub(crate) struct Flight {
    finished: AtomicU64,
    failure: Mutex<Option<(u64, Arc<Error>)>>,
}

impl Flight {
    /// Take a ticket before waiting on the lock that guards the operation.
    pub(crate) fn arrive(&self) -> Ticket {
        Ticket(self.finished.load(Ordering::SeqCst))
    }

    /// With the lock held: the error of an attempt that finished after
    /// `ticket` was taken, if the latest attempt failed.
    pub(crate) fn failure_since(&self, ticket: Ticket) -> Option<Error> {
        let failure = self.failure.lock().ok()?;
        match failure.as_ref() {
            Some((attempt, err)) if *attempt > ticket.0 => Some(Error::Shared(Arc::clone(err))),
            _ => None,
        }
    }

    /// With the lock held: record the outcome of the attempt just made.
    pub(crate) fn finish<T>(&self, outcome: Result<T, Error>) -> Result<T, Error> {
        let attempt = self.finished.load(Ordering::SeqCst) + 1;
        let (recorded, outcome) = match outcome {
            Ok(value) => (None, Ok(value)),
            Err(err) => {
                let err = Arc::new(err);
                (
                    Some((attempt, Arc::clone(&err))),
                    Err(Error::Shared(err)),
                )
            }
        };
        if let Ok(mut failure) = self.failure.lock() {
            *failure = recorded;
        }
        self.finished.store(attempt, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiter_sees_failure_of_attempt_it_queued_behind() {
        let flight = Flight::default();
        let ticket = flight.arrive();
        assert!(flight.failure_since(ticket).is_none());

        let err = flight
            .finish::<()>(Err(Error::StoreInit("offline".to_string())))
            .unwrap_err();
        assert!(matches!(err.root(), Error::StoreInit(_)));

        let shared = flight.failure_since(ticket).unwrap();
        assert_eq!(shared.to_string(), err.to_string());
    }

    #[test]
    fn test_late_arrival_starts_fresh() {
        let flight = Flight::default();
        let _ = flight.finish::<()>(Err(Error::StoreInit("offline".to_string())));

        let ticket = flight.arrive();
        assert!(flight.failure_since(ticket).is_none());
    }

    #[test]
    fn test_success_clears_failure() {
        let flight = Flight::default();
        let early = flight.arrive();
        let _ = flight.finish::<()>(Err(Error::StoreInit("offline".to_string())));
        flight.finish(Ok(())).unwrap();
        assert!(flight.failure_since(early).is_none());
    }
}
