//! [`ControlState`] – the only shared mutable state in the controller.
//!
//! Holds the two control flags and the bounded target position.  One
//! instance is created at startup and handed to every task as an
//! `Arc<ControlState>`.
//!
//! The flags are atomics so the periodic loops can read them on every tick
//! without locking.  The target sits behind a `std::sync::Mutex`; critical
//! sections are a few float operations and never cross an `.await`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use facetrack_types::{Bounds, ControlFlags, TargetPosition};

/// Shared flags + target position.
///
/// # Example
///
/// ```
/// use facetrack_kernel::ControlState;
/// use facetrack_types::{Bounds, TargetPosition};
///
/// let state = ControlState::new(Bounds::NORMALIZED);
/// assert_eq!(state.target(), TargetPosition::new(0.5, 0.5));
///
/// // Writes are clamped into bounds.
/// state.set_target(TargetPosition::new(4.0, -1.0));
/// assert_eq!(state.target(), TargetPosition::new(1.0, 0.0));
/// ```
#[derive(Debug)]
pub struct ControlState {
    bounds: Bounds,
    tracking_enabled: AtomicBool,
    nod_enabled: AtomicBool,
    /// Set whenever nodding is switched on; cleared by [`Self::take_nod_activity`].
    nod_seen: AtomicBool,
    target: Mutex<TargetPosition>,
}

impl ControlState {
    /// Create a state with both flags off and the target at the center of
    /// `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            tracking_enabled: AtomicBool::new(false),
            nod_enabled: AtomicBool::new(false),
            nod_seen: AtomicBool::new(false),
            target: Mutex::new(bounds.center()),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    // -------------------------------------------------------------------------
    // Flags
    // -------------------------------------------------------------------------

    pub fn tracking_enabled(&self) -> bool {
        self.tracking_enabled.load(Ordering::Acquire)
    }

    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.tracking_enabled.store(enabled, Ordering::Release);
    }

    pub fn nod_enabled(&self) -> bool {
        self.nod_enabled.load(Ordering::Acquire)
    }

    pub fn set_nod_enabled(&self, enabled: bool) {
        if enabled {
            self.nod_seen.store(true, Ordering::Release);
        }
        self.nod_enabled.store(enabled, Ordering::Release);
    }

    /// Whether nodding was on at any point since the previous call, including
    /// now.  Resets the record.
    pub fn take_nod_activity(&self) -> bool {
        let seen = self.nod_seen.swap(false, Ordering::AcqRel);
        seen || self.nod_enabled()
    }

    /// Snapshot of both flags.  The two loads are independent, so a
    /// concurrent writer may be observed half-applied.
    pub fn flags(&self) -> ControlFlags {
        ControlFlags {
            tracking_enabled: self.tracking_enabled(),
            nod_enabled: self.nod_enabled(),
        }
    }

    // -------------------------------------------------------------------------
    // Target position
    // -------------------------------------------------------------------------

    pub fn target(&self) -> TargetPosition {
        *self.lock_target()
    }

    /// Overwrite the target, clamped into bounds.  Returns the stored value.
    pub fn set_target(&self, target: TargetPosition) -> TargetPosition {
        self.update_target(|_| target)
    }

    /// Read-modify-write the target under a single lock acquisition.
    ///
    /// The value returned by `f` is clamped into bounds before it is stored;
    /// the stored value is returned.
    pub fn update_target<F>(&self, f: F) -> TargetPosition
    where
        F: FnOnce(TargetPosition) -> TargetPosition,
    {
        let mut guard = self.lock_target();
        let next = self.bounds.clamp(f(*guard));
        *guard = next;
        next
    }

    fn lock_target(&self) -> MutexGuard<'_, TargetPosition> {
        // The guarded value is plain data that is always written whole, so a
        // poisoned lock still holds a valid position.
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(Bounds::default())
    }
}
