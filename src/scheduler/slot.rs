//! Single-slot mailbox state machine.
//!
//! ```text
//!            submit                 submit (store)
//!   Idle ───────────► Busy ───────────────────► BusyPending ◄─┐
//!    ▲                 │  ▲                         │    submit (overwrite)
//!    │ complete        │  │ complete (dispatch      │         │
//!    └─────────────────┘  └──── pending) ───────────┘─────────┘
//! ```
//!
//! At most one job runs and at most one waits; intermediate submissions
//! during a burst are dropped in favour of the latest.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Busy,
    BusyPending,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Submit<T> {
    /// Start this job now.
    Dispatch(T),
    /// Held as the pending job.
    Queued,
    /// Held as the pending job; the returned job was superseded.
    Replaced(T),
}

#[derive(Debug)]
pub struct SlotMachine<T> {
    busy: bool,
    pending: Option<T>,
}

impl<T> Default for SlotMachine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotMachine<T> {
    pub fn new() -> Self {
        Self { busy: false, pending: None }
    }

    pub fn state(&self) -> SlotState {
        match (self.busy, self.pending.is_some()) {
            (false, _) => SlotState::Idle,
            (true, false) => SlotState::Busy,
            (true, true) => SlotState::BusyPending,
        }
    }

    pub fn submit(&mut self, job: T) -> Submit<T> {
        if !self.busy {
            self.busy = true;
            return Submit::Dispatch(job);
        }
        match self.pending.replace(job) {
            Some(old) => Submit::Replaced(old),
            None => Submit::Queued,
        }
    }

    /// The running job finished. Returns the pending job to run next, if
    /// any; otherwise the machine goes idle.
    pub fn complete(&mut self) -> Option<T> {
        let next = self.pending.take();
        self.busy = next.is_some();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_dispatches_immediately() {
        let mut m = SlotMachine::new();
        assert_eq!(m.state(), SlotState::Idle);
        assert_eq!(m.submit(1), Submit::Dispatch(1));
        assert_eq!(m.state(), SlotState::Busy);
    }

    #[test]
    fn test_busy_holds_latest_only() {
        let mut m = SlotMachine::new();
        m.submit(1);
        assert_eq!(m.submit(2), Submit::Queued);
        assert_eq!(m.state(), SlotState::BusyPending);
        assert_eq!(m.submit(3), Submit::Replaced(2));
        assert_eq!(m.submit(4), Submit::Replaced(3));
        assert_eq!(m.state(), SlotState::BusyPending);
    }

    #[test]
    fn test_complete_runs_pending_then_idles() {
        let mut m = SlotMachine::new();
        m.submit(1);
        m.submit(2);
        m.submit(3);
        assert_eq!(m.complete(), Some(3));
        assert_eq!(m.state(), SlotState::Busy);
        assert_eq!(m.complete(), None);
        assert_eq!(m.state(), SlotState::Idle);
    }

    #[test]
    fn test_burst_runs_entry_and_final_only() {
        let mut m = SlotMachine::new();
        let mut ran = Vec::new();
        for job in 1..=10 {
            if let Submit::Dispatch(j) = m.submit(job) {
                ran.push(j);
            }
        }
        while let Some(j) = m.complete() {
            ran.push(j);
        }
        assert_eq!(ran, vec![1, 10]);
    }
}
