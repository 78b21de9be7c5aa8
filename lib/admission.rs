//! Admission control for concurrent sessions.
//!
//! The active-session counter is the only state shared between sessions.
//! It is reachable solely through [`AdmissionController::try_admit`] and the
//! drop of the returned [`AdmissionSlot`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::{Result, VtyError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Tracks admitted sessions against a fixed capacity.
#[derive(Debug)]
pub struct AdmissionController {
    active: AtomicUsize,
    capacity: usize,
}

/// One admitted session's claim against the capacity.
///
/// The slot is released exactly once, when this value is dropped.
#[derive(Debug)]
#[must_use = "dropping the slot releases it immediately"]
pub struct AdmissionSlot {
    controller: Arc<AdmissionController>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AdmissionController {
    /// Create a controller admitting at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Try to claim a slot.
    ///
    /// The capacity check and the increment are a single atomic step, so
    /// concurrent callers can never over-admit.
    pub fn try_admit(self: &Arc<Self>) -> Result<AdmissionSlot> {
        let capacity = self.capacity;
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| VtyError::AdmissionRejected { capacity })?;

        Ok(AdmissionSlot {
            controller: Arc::clone(self),
        })
    }

    /// Number of currently admitted sessions.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Maximum number of concurrently admitted sessions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self) {
        let prev = self.active.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "admission slot released with no active sessions");
    }
}

impl AdmissionSlot {
    /// Controller this slot was taken from.
    pub fn controller(&self) -> &Arc<AdmissionController> {
        &self.controller
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.controller.release();
        tracing::trace!(active = self.controller.active(), "Admission slot released");
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn test_admit_until_capacity() {
        let controller = Arc::new(AdmissionController::new(3));

        let slots: Vec<_> = (0..3).map(|_| controller.try_admit().unwrap()).collect();
        assert_eq!(controller.active(), 3);

        let err = controller.try_admit().unwrap_err();
        assert!(matches!(err, VtyError::AdmissionRejected { capacity: 3 }));
        assert_eq!(controller.active(), 3);

        drop(slots);
        assert_eq!(controller.active(), 0);
    }

    #[test]
    fn test_release_frees_a_slot() {
        let controller = Arc::new(AdmissionController::new(1));

        let slot = controller.try_admit().unwrap();
        assert!(controller.try_admit().is_err());

        drop(slot);
        let _slot = controller.try_admit().unwrap();
        assert_eq!(controller.active(), 1);
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let controller = Arc::new(AdmissionController::new(0));
        assert!(controller.try_admit().is_err());
        assert_eq!(controller.active(), 0);
    }

    #[test]
    fn test_concurrent_admission_never_exceeds_capacity() {
        const THREADS: usize = 16;
        const ROUNDS: usize = 500;
        const CAPACITY: usize = 3;

        let controller = Arc::new(AdmissionController::new(CAPACITY));
        let holders = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let controller = controller.clone();
                let holders = holders.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        if let Ok(slot) = controller.try_admit() {
                            let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                            assert!(now <= CAPACITY, "{now} holders with capacity {CAPACITY}");
                            std::thread::yield_now();
                            holders.fetch_sub(1, Ordering::SeqCst);
                            drop(slot);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(controller.active(), 0);
    }

    #[test]
    fn test_slot_released_on_panic_unwind() {
        let controller = Arc::new(AdmissionController::new(1));
        let c = controller.clone();

        let result = std::thread::spawn(move || {
            let _slot = c.try_admit().unwrap();
            panic!("session blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(controller.active(), 0);
    }
}
