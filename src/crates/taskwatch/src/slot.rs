//! One-session-at-a-time guard for a launch trigger.
//!
//! The monitor does not stop two sessions polling the same endpoint. Call
//! sites that must not double-launch hold a [`SlotGuard`] for the life of the
//! session.
//!
//! This is for programs that embed the library and drive several triggers
//! from one process. The `taskwatch` binary runs a single session per
//! invocation and takes no slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A named trigger that at most one session may hold.
#[derive(Debug, Clone)]
pub struct TaskSlot {
    name: Arc<str>,
    busy: Arc<AtomicBool>,
}

impl TaskSlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Take the slot, or `None` while another session holds it.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        debug!(slot = %self.name, "Slot acquired");
        Some(SlotGuard { slot: self.clone() })
    }
}

/// Holds a [`TaskSlot`]; released on drop.
#[derive(Debug)]
pub struct SlotGuard {
    slot: TaskSlot,
}

impl SlotGuard {
    pub fn slot_name(&self) -> &str {
        self.slot.name()
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
        debug!(slot = %self.slot.name, "Slot released");
    }
}
