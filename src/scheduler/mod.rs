//! Per-widget background computation unit.
//!
//! Each widget owns one [`Scheduler`]: a tokio worker task plus a
//! [`SlotMachine`] that decides, synchronously at submit time, whether a
//! request starts now, waits as the single pending request, or replaces
//! the one already waiting. Computations run on the blocking pool; their
//! outcomes (success or typed failure, including panics) are published on
//! an mpsc channel before the machine advances.

pub mod slot;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ComputeError;
use crate::logging::{agg_increment, log, log_coalesced, log_outcome, obj, v_str, Domain, Level};
use crate::message::{ComputeRequest, ComputeResponse};
use crate::table::pipeline;

pub use slot::{SlotMachine, SlotState, Submit};

pub type ComputeFn = Arc<dyn Fn(&ComputeRequest) -> Result<ComputeResponse, ComputeError> + Send + Sync>;

#[derive(Debug)]
pub struct Outcome {
    pub seq: u64,
    pub elapsed_ms: f64,
    pub result: Result<ComputeResponse, ComputeError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub computed: u64,
    pub coalesced: u64,
    pub failed: u64,
}

#[derive(Debug)]
struct Job {
    seq: u64,
    request: ComputeRequest,
}

#[derive(Default)]
struct Shared {
    machine: Mutex<SlotMachine<Job>>,
    submitted: AtomicU64,
    computed: AtomicU64,
    coalesced: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn machine(&self) -> MutexGuard<'_, SlotMachine<Job>> {
        match self.machine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub struct Scheduler {
    widget: String,
    shared: Arc<Shared>,
    dispatch: mpsc::Sender<Job>,
    next_seq: AtomicU64,
    worker: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn a worker running the standard pipeline.
    pub fn spawn(widget: &str, outcome_buffer: usize) -> (Self, mpsc::Receiver<Outcome>) {
        Self::spawn_with(widget, outcome_buffer, Arc::new(pipeline::compute))
    }

    pub fn spawn_with(widget: &str, outcome_buffer: usize, compute: ComputeFn) -> (Self, mpsc::Receiver<Outcome>) {
        // The machine admits one dispatched job at a time, so one slot suffices.
        let (dispatch, jobs) = mpsc::channel(1);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(outcome_buffer.max(1));
        let shared = Arc::new(Shared::default());
        let worker = tokio::spawn(run_worker(widget.to_string(), Arc::clone(&shared), compute, jobs, outcomes_tx));
        log(
            Level::Debug,
            Domain::Schedule,
            "worker_spawned",
            obj(&[("widget", v_str(widget))]),
        );
        (
            Self {
                widget: widget.to_string(),
                shared,
                dispatch,
                next_seq: AtomicU64::new(0),
                worker,
            },
            outcomes_rx,
        )
    }

    pub fn widget(&self) -> &str {
        &self.widget
    }

    /// Submit a request snapshot. Never blocks; returns its sequence number.
    pub fn submit(&self, request: ComputeRequest) -> Result<u64> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        let action = self.shared.machine().submit(Job { seq, request });
        match action {
            Submit::Dispatch(job) => {
                if let Err(e) = self.dispatch.try_send(job) {
                    // Nothing will ever complete this job; free the slot.
                    self.shared.machine().complete();
                    return Err(anyhow!("scheduler for {} cannot dispatch: {}", self.widget, e));
                }
            }
            Submit::Queued => {}
            Submit::Replaced(old) => {
                self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
                agg_increment("coalesced");
                log_coalesced(&self.widget, old.seq, seq);
            }
        }
        Ok(seq)
    }

    pub fn state(&self) -> SlotState {
        self.shared.machine().state()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.stats()
    }

    /// Stop accepting requests, let in-flight and pending work finish.
    /// Returns the final counters.
    pub async fn shutdown(self) -> Result<SchedulerStats> {
        let Scheduler { dispatch, worker, shared, .. } = self;
        drop(dispatch);
        worker.await?;
        Ok(shared.stats())
    }
}

async fn run_worker(
    widget: String,
    shared: Arc<Shared>,
    compute: ComputeFn,
    mut jobs: mpsc::Receiver<Job>,
    outcomes: mpsc::Sender<Outcome>,
) {
    while let Some(job) = jobs.recv().await {
        let mut next = Some(job);
        while let Some(job) = next.take() {
            let outcome = execute(&compute, job).await;
            shared.computed.fetch_add(1, Ordering::Relaxed);
            agg_increment("compute");
            match &outcome.result {
                Ok(resp) => log_outcome(&widget, outcome.seq, outcome.elapsed_ms, Ok(&resp.digest())),
                Err(err) => {
                    shared.failed.fetch_add(1, Ordering::Relaxed);
                    agg_increment("failure");
                    log_outcome(&widget, outcome.seq, outcome.elapsed_ms, Err(err.code()));
                }
            }
            // A dropped receiver only means nobody renders; keep the machine moving.
            let _ = outcomes.send(outcome).await;
            next = shared.machine().complete();
        }
    }
    log(
        Level::Debug,
        Domain::Schedule,
        "worker_stopped",
        obj(&[("widget", v_str(&widget))]),
    );
}

async fn execute(compute: &ComputeFn, job: Job) -> Outcome {
    let started = Instant::now();
    let Job { seq, request } = job;
    let f = Arc::clone(compute);
    let result = match tokio::task::spawn_blocking(move || f(&request)).await {
        Ok(result) => result,
        Err(err) => Err(ComputeError::Panicked(panic_message(err))),
    };
    Outcome {
        seq,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        result,
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
