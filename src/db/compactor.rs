use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;

use super::Inner;

const STEP_BUDGET: Duration = Duration::from_millis(500);
const STEP_TICK: Duration = Duration::from_secs(1);
const GC_QUIET_PERIOD: Duration = Duration::from_secs(5);

/// Body of the dedicated compactor thread. Runs until `shutdown` is closed
/// (by `DB::close` dropping its sender, or implicitly when the owning `DB`
/// is dropped).
pub(super) fn run(inner: Arc<RwLock<Inner>>, gc_interval: Duration, shutdown: Receiver<()>) {
    let start_ticker = crossbeam::channel::tick(gc_interval);
    let step_ticker = crossbeam::channel::tick(STEP_TICK);

    loop {
        crossbeam::channel::select! {
            recv(shutdown) -> _ => {
                log::info!("compactor thread stopping");
                return;
            }
            recv(start_ticker) -> _ => {
                let mut guard = inner.write().unwrap();
                if !guard.in_gc() {
                    if let Err(err) = guard.start_gc() {
                        log::warn!("failed to start compaction: {err}");
                    }
                }
            }
            recv(step_ticker) -> _ => {
                let mut guard = inner.write().unwrap();
                if !guard.in_gc() || Instant::now() < guard.last_gc_time() + GC_QUIET_PERIOD {
                    continue;
                }

                let deadline = Instant::now() + STEP_BUDGET;
                while Instant::now() < deadline && guard.in_gc() {
                    if let Err(err) = guard.gc_step() {
                        log::warn!("compaction step failed: {err}");
                        break;
                    }
                }
            }
        }
    }
}
