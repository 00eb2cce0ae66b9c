use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::error::SubmitError;
use crate::unit::Work;

/// Bounded ring buffer of pending units shared by all worker threads.
///
/// The BoundedQueue is the central component of the [`WorkerPool`](crate::WorkerPool).
/// Producers insert at the front and consumers take from the front, so the
/// most recently submitted unit is serviced next. For fork/join recursion
/// that means the freshest (smallest) sub-problems run first.
///
/// # Counting
/// - `queued`: units physically present in the ring
/// - `active`: units accepted and not yet finished (queued + running)
///
/// `submit` refuses work once `active == capacity`; `active` only drops when
/// [`BoundedQueue::complete`] is called after a unit has executed.
///
/// # Thread Safety
/// - One mutex guards the ring, both counters and the termination flag
/// - One condition variable wakes consumers on new work or termination
pub struct BoundedQueue {
    inner: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

struct QueueState {
    slots: Box<[Option<Arc<dyn Work>>]>,
    front: usize,
    queued: usize,
    active: usize,
    peak_active: usize,
    terminated: bool,
}

impl fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("front", &state.front)
            .field("queued", &state.queued)
            .field("active", &state.active)
            .field("terminated", &state.terminated)
            .finish()
    }
}

impl BoundedQueue {
    /// Creates an empty queue admitting at most `capacity` active units.
    ///
    /// A capacity of zero is raised to one; [`PoolConfig::validate`](crate::PoolConfig::validate)
    /// rejects it before a pool gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueState {
                slots: (0..capacity).map(|_| None).collect(),
                front: 0,
                queued: 0,
                active: 0,
                peak_active: 0,
                terminated: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Inserts a unit at the front of the queue.
    ///
    /// Never blocks. On success the unit is marked queued, the active count
    /// grows by one and every waiting consumer is woken.
    pub fn submit(&self, unit: Arc<dyn Work>) -> Result<(), SubmitError> {
        let mut state = self.lock();

        if state.terminated {
            return Err(SubmitError::ShuttingDown);
        }
        if state.active >= self.capacity {
            trace!(unit = unit.id(), active = state.active, "queue full");
            return Err(SubmitError::QueueFull { capacity: self.capacity });
        }
        unit.prepare_submit()?;

        state.front = (state.front + self.capacity - 1) % self.capacity;
        let front = state.front;
        debug_assert!(state.slots[front].is_none());
        trace!(unit = unit.id(), slot = front, "unit queued at front");
        state.slots[front] = Some(unit);
        state.queued += 1;
        state.active += 1;
        state.peak_active = state.peak_active.max(state.active);

        drop(state);
        self.available.notify_all();
        Ok(())
    }

    /// Removes the unit at the front, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue has been terminated and everything left
    /// in it has been handed out.
    pub fn take(&self) -> Option<Arc<dyn Work>> {
        let mut state = self.lock();
        loop {
            if let Some(unit) = Self::pop_front(&mut state, self.capacity) {
                return Some(unit);
            }
            if state.terminated {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Removes the unit at the front without blocking.
    pub fn try_take(&self) -> Option<Arc<dyn Work>> {
        let mut state = self.lock();
        Self::pop_front(&mut state, self.capacity)
    }

    fn pop_front(state: &mut QueueState, capacity: usize) -> Option<Arc<dyn Work>> {
        if state.queued == 0 {
            return None;
        }
        let front = state.front;
        let unit = state.slots[front].take();
        state.front = (front + 1) % capacity;
        state.queued -= 1;
        unit
    }

    /// Records that a previously taken unit has finished executing.
    ///
    /// Returns `false` and leaves the counts alone when no taken unit is
    /// outstanding, so a stray call cannot free a slot still held by a
    /// queued unit.
    pub fn complete(&self) -> bool {
        let mut state = self.lock();
        if state.active == state.queued {
            warn!(active = state.active, "complete called with no unit running");
            return false;
        }
        state.active -= 1;
        true
    }

    /// Stops accepting work and wakes every consumer.
    ///
    /// Units already queued are still handed out by [`BoundedQueue::take`].
    /// Returns the number of units that were queued at this point.
    pub fn terminate(&self) -> usize {
        let mut state = self.lock();
        let pending = state.queued;
        if !state.terminated {
            state.terminated = true;
            debug!(pending, "queue terminated");
        }
        drop(state);
        self.available.notify_all();
        pending
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units queued or running.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Highest active count observed since the queue was created.
    pub fn peak_active(&self) -> usize {
        self.lock().peak_active
    }

    /// Units waiting in the ring.
    pub fn queued(&self) -> usize {
        self.lock().queued
    }

    pub fn is_empty(&self) -> bool {
        self.queued() == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
