//! Background runtime: the fast poll loop, the slow reconciler loop, the
//! enrichment worker, and the queue reaper.
//!
//! Each loop iterates its accounts (or batch) sequentially, sleeps with
//! jitter, and checks the shared shutdown flag at every suspension point.
//! A misbehaving account costs one log line and is skipped until the next
//! cycle; it never takes the loop down.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use waxwing_core::types::Provider;
use waxwing_core::util;

use crate::infra::app_state::AppState;

/// Spawn every background task. The returned handles complete after the
/// shutdown flag flips and each loop drains.
pub fn spawn_loops(state: AppState, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(fast_loop(state.clone(), shutdown.clone())),
        tokio::spawn(slow_loop(state.clone(), shutdown.clone())),
        tokio::spawn(worker_loop(state.clone(), shutdown.clone())),
        tokio::spawn(reaper_loop(state, shutdown)),
    ]
}

/// Sleep, or return early (true) when shutdown fires.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => *shutdown.borrow(),
        _ = shutdown.changed() => true,
    }
}

async fn fast_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let interval = state.config().playback.poll_interval_ms;
    info!(interval_ms = interval, "playback poll loop started");

    while !*shutdown.borrow() {
        match state
            .db()
            .accounts()
            .list_by_provider(Provider::Spotify.as_str())
            .await
        {
            Ok(accounts) => {
                for account in &accounts {
                    if *shutdown.borrow() {
                        break;
                    }
                    if let Err(e) = state.engine().poll_account(account).await {
                        warn!(account = %account.id, error = %e,
                              "playback poll failed, skipping account this cycle");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to list accounts for playback loop"),
        }

        if sleep_or_shutdown(&mut shutdown, util::jittered_ms(interval)).await {
            break;
        }
    }
    info!("playback poll loop stopped");
}

async fn slow_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let interval = state.config().reconciler.interval_ms;
    info!(interval_ms = interval, "recently-played reconciler loop started");

    while !*shutdown.borrow() {
        match state
            .db()
            .accounts()
            .list_by_provider(Provider::Spotify.as_str())
            .await
        {
            Ok(accounts) => {
                for account in &accounts {
                    if *shutdown.borrow() {
                        break;
                    }
                    if let Err(e) = state.reconciler().reconcile_account(account).await {
                        warn!(account = %account.id, error = %e,
                              "reconciliation failed, skipping account this cycle");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to list accounts for reconciler loop"),
        }

        if sleep_or_shutdown(&mut shutdown, util::jittered_ms(interval)).await {
            break;
        }
    }
    info!("recently-played reconciler loop stopped");
}

async fn worker_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let idle_interval = state.config().worker.poll_interval_ms;
    info!("enrichment worker loop started");

    while !*shutdown.borrow() {
        match state.worker().run_cycle().await {
            // A full batch was drained; more work may be queued behind it,
            // so claim again right away (pacing happens inside the cycle).
            Ok(count) if count > 0 => {}
            Ok(_) => {
                if sleep_or_shutdown(&mut shutdown, util::jittered_ms(idle_interval)).await {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "enrichment cycle failed");
                if sleep_or_shutdown(&mut shutdown, util::jittered_ms(idle_interval)).await {
                    break;
                }
            }
        }
    }
    info!("enrichment worker loop stopped");
}

async fn reaper_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let interval = state.config().queue.reap_interval_ms;
    info!(interval_ms = interval, "job reaper loop started");

    while !*shutdown.borrow() {
        if let Err(e) = state.db().jobs().reap().await {
            warn!(error = %e, "job reap failed");
        }
        if sleep_or_shutdown(&mut shutdown, util::jittered_ms(interval)).await {
            break;
        }
    }
    info!("job reaper loop stopped");
}
