use std::time::Duration;

use forge_core::now_ms;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::http::AppState;

/// Periodically evict finished tasks and expired cached results.
pub fn spawn_gc(state: AppState) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.gc_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        tick.tick().await;
        loop {
            tick.tick().await;
            if state.orchestrator.is_shut_down() {
                debug!("gc stopping");
                break;
            }
            gc_tick(&state);
        }
    })
}

fn gc_tick(state: &AppState) {
    let report = state.orchestrator.cleanup(now_ms());
    let cleaned = report.cleaned.generations + report.cleaned.analyses + report.cleaned.publishes;
    if cleaned > 0 || report.cache_purged > 0 {
        info!(
            cleaned,
            cache_purged = report.cache_purged,
            remaining_generations = report.remaining.generations,
            remaining_analyses = report.remaining.analyses,
            remaining_publishes = report.remaining.publishes,
            "gc evicted finished tasks"
        );
    } else {
        debug!("gc found nothing to evict");
    }
}
