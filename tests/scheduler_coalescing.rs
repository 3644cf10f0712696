//! Single-slot coalescing under a computation held in flight.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use livegrid::error::ComputeError;
use livegrid::message::{ComputeRequest, ComputeResponse, SourceSnapshot};
use livegrid::scheduler::{ComputeFn, Scheduler, SlotState};
use livegrid::table::compute;

fn request(n: i64) -> ComputeRequest {
    ComputeRequest::new(vec![SourceSnapshot::new("s", vec![json!({"_id": n, "v": n})])], Vec::new())
}

/// A compute function that reports each start and waits for a release.
fn gated() -> (ComputeFn, std_mpsc::Receiver<i64>, std_mpsc::Sender<()>) {
    let (started_tx, started_rx) = std_mpsc::channel::<i64>();
    let (release_tx, release_rx) = std_mpsc::channel::<()>();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);
    let f: ComputeFn = Arc::new(move |req: &ComputeRequest| -> Result<ComputeResponse, ComputeError> {
        let id = req.sources[0].rows[0]["_id"].as_i64().unwrap_or(-1);
        started_tx.lock().unwrap().send(id).unwrap();
        release_rx.lock().unwrap().recv_timeout(Duration::from_secs(10)).unwrap();
        compute(req)
    });
    (f, started_rx, release_tx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_three_requests_during_flight_run_twice() {
    let (f, started, release) = gated();
    let (sched, mut outcomes) = Scheduler::spawn_with("coalesce", 8, f);

    assert_eq!(sched.submit(request(1)).unwrap(), 1);
    assert_eq!(started.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    assert_eq!(sched.state(), SlotState::Busy);

    for n in 2..=4 {
        sched.submit(request(n)).unwrap();
    }
    assert_eq!(sched.state(), SlotState::BusyPending);

    release.send(()).unwrap();
    let first = outcomes.recv().await.unwrap();
    assert_eq!(first.seq, 1);

    assert_eq!(started.recv_timeout(Duration::from_secs(5)).unwrap(), 4);
    release.send(()).unwrap();
    let second = outcomes.recv().await.unwrap();
    assert_eq!(second.seq, 4);
    assert_eq!(second.result.unwrap().rows[0].row_id, 4);

    let stats = sched.shutdown().await.unwrap();
    assert_eq!(stats.submitted, 4);
    assert_eq!(stats.computed, 2);
    assert_eq!(stats.coalesced, 2);
    assert!(started.try_recv().is_err());
    assert!(outcomes.recv().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_after_last_outcome() {
    let (sched, mut outcomes) = Scheduler::spawn("idle", 4);
    sched.submit(request(1)).unwrap();
    let outcome = outcomes.recv().await.unwrap();
    assert!(outcome.result.is_ok());
    let stats = sched.shutdown().await.unwrap();
    assert_eq!(stats.computed, 1);
    assert_eq!(stats.coalesced, 0);
}
