//! Request bookkeeping for the simulation state machine

use serde::Serialize;

/// The two kinds of work a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Request {
    /// Compute the next generation
    Next,
    /// Rebuild and upload meshes of dirty chunks
    CubesUpdate,
}

/// What the scheduler is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    ComputingNext,
    UpdatingCubes,
    /// A worker failed; nothing further is dispatched
    Halted,
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::ComputingNext | Phase::UpdatingCubes)
    }
}

/// Pending flags plus request sequence numbers.
///
/// Scheduling one kind stamps it after the other kind's last index, so when
/// both are pending the earlier request is popped first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQueue {
    next_pending: bool,
    cubes_update_pending: bool,
    next_index: u64,
    cubes_update_index: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `request` pending. Returns false when it already was.
    pub fn schedule(&mut self, request: Request) -> bool {
        match request {
            Request::Next => {
                if self.next_pending {
                    return false;
                }
                self.next_pending = true;
                self.next_index = self.cubes_update_index + 1;
            }
            Request::CubesUpdate => {
                if self.cubes_update_pending {
                    return false;
                }
                self.cubes_update_pending = true;
                self.cubes_update_index = self.next_index + 1;
            }
        }
        true
    }

    pub fn is_pending(&self, request: Request) -> bool {
        match request {
            Request::Next => self.next_pending,
            Request::CubesUpdate => self.cubes_update_pending,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.next_pending || self.cubes_update_pending
    }

    /// The earliest pending request, without removing it
    pub fn peek(&self) -> Option<Request> {
        match (self.next_pending, self.cubes_update_pending) {
            (true, true) if self.next_index < self.cubes_update_index => Some(Request::Next),
            (true, true) => Some(Request::CubesUpdate),
            (true, false) => Some(Request::Next),
            (false, true) => Some(Request::CubesUpdate),
            (false, false) => None,
        }
    }

    /// Remove and return the earliest pending request
    pub fn pop(&mut self) -> Option<Request> {
        let request = self.peek()?;
        match request {
            Request::Next => self.next_pending = false,
            Request::CubesUpdate => self.cubes_update_pending = false,
        }
        Some(request)
    }

    pub fn clear(&mut self) {
        self.next_pending = false;
        self.cubes_update_pending = false;
    }

    pub fn sequence_index(&self, request: Request) -> u64 {
        match request {
            Request::Next => self.next_index,
            Request::CubesUpdate => self.cubes_update_index,
        }
    }
}

/// Snapshot of the four scheduler flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerState {
    pub next_pending: bool,
    pub next_in_progress: bool,
    pub cubes_update_pending: bool,
    pub cubes_update_in_progress: bool,
}

impl SchedulerState {
    pub fn new(queue: &RequestQueue, phase: Phase) -> Self {
        Self {
            next_pending: queue.is_pending(Request::Next),
            next_in_progress: phase == Phase::ComputingNext,
            cubes_update_pending: queue.is_pending(Request::CubesUpdate),
            cubes_update_in_progress: phase == Phase::UpdatingCubes,
        }
    }

    pub fn busy(&self) -> bool {
        self.next_in_progress || self.cubes_update_in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_queue() {
        let mut queue = RequestQueue::new();
        assert!(!queue.has_pending());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_next_then_cubes_runs_next_first() {
        let mut queue = RequestQueue::new();
        assert!(queue.schedule(Request::Next));
        assert!(queue.schedule(Request::CubesUpdate));

        assert_eq!(queue.pop(), Some(Request::Next));
        assert_eq!(queue.pop(), Some(Request::CubesUpdate));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_cubes_then_next_runs_cubes_first() {
        let mut queue = RequestQueue::new();
        queue.schedule(Request::CubesUpdate);
        queue.schedule(Request::Next);

        assert_eq!(queue.pop(), Some(Request::CubesUpdate));
        assert_eq!(queue.pop(), Some(Request::Next));
    }

    #[test]
    fn test_repeat_schedule_is_idempotent() {
        let mut queue = RequestQueue::new();
        assert!(queue.schedule(Request::Next));
        let index = queue.sequence_index(Request::Next);
        assert!(!queue.schedule(Request::Next));
        assert_eq!(queue.sequence_index(Request::Next), index);

        assert_eq!(queue.pop(), Some(Request::Next));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_indices_never_tie() {
        let mut queue = RequestQueue::new();
        for round in 0..10 {
            if round % 2 == 0 {
                queue.schedule(Request::Next);
                queue.schedule(Request::CubesUpdate);
            } else {
                queue.schedule(Request::CubesUpdate);
                queue.schedule(Request::Next);
            }
            assert_ne!(
                queue.sequence_index(Request::Next),
                queue.sequence_index(Request::CubesUpdate)
            );
            let first = queue.pop();
            let expected = if round % 2 == 0 { Request::Next } else { Request::CubesUpdate };
            assert_eq!(first, Some(expected));
            queue.pop();
        }
    }

    #[test]
    fn test_old_pending_request_stays_ahead() {
        let mut queue = RequestQueue::new();
        queue.schedule(Request::CubesUpdate);
        queue.schedule(Request::Next);
        assert_eq!(queue.pop(), Some(Request::CubesUpdate));

        // Next is still pending from before; a new mesh request goes behind it
        queue.schedule(Request::CubesUpdate);
        assert_eq!(queue.pop(), Some(Request::Next));
        assert_eq!(queue.pop(), Some(Request::CubesUpdate));
    }

    #[test]
    fn test_state_snapshot() {
        let mut queue = RequestQueue::new();
        queue.schedule(Request::CubesUpdate);
        let state = SchedulerState::new(&queue, Phase::ComputingNext);
        assert!(state.busy());
        assert!(state.next_in_progress);
        assert!(state.cubes_update_pending);
        assert!(!state.next_pending);

        let idle = SchedulerState::new(&RequestQueue::new(), Phase::Idle);
        assert!(!idle.busy());
        assert!(!Phase::Halted.is_busy());
    }
}
