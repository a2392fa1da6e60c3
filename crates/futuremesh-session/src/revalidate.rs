//! Background token revalidation.
//!
//! While a session is established, a task re-checks the token with the
//! server on a fixed period and right after connectivity comes back. A
//! failed check ends the session. The loop:
//!
//! ```text
//! loop {
//!     select! {
//!         connectivity changed → offline: pause the scheduler
//!                                back online: resume + check now
//!         scheduler tick       → verify(); failure → logout
//!     }
//! }
//! ```
//!
//! The task holds only a weak reference to the manager, and the manager
//! owns the [`RevalidationHandle`]. Dropping the handle (which logout
//! does) aborts the task, so no timer outlives the session it checks.

use std::sync::Weak;

use futuremesh_tick::{IntervalConfig, IntervalScheduler};
use futuremesh_transport::HttpClient;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::manager::{LogoutReason, SessionManager, Shared};
use crate::SessionError;

/// Owns a running revalidation task. Dropping it aborts the task.
#[derive(Debug)]
pub struct RevalidationHandle {
    task: JoinHandle<()>,
    generation: u64,
}

impl RevalidationHandle {
    /// Starts revalidating the session `manager` holds now. Returns `None`
    /// outside a tokio runtime.
    pub(crate) fn spawn<H: HttpClient>(
        manager: &SessionManager<H>,
        mut connectivity: watch::Receiver<bool>,
    ) -> Option<Self> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let generation = manager.generation();
        let mut scheduler = IntervalScheduler::new(IntervalConfig::every(
            manager.config().revalidate_every,
        ));
        // Read the starting state now: a restore that lands before the task
        // is first polled must still show up as a change.
        let online = *connectivity.borrow_and_update();
        if !online {
            scheduler.pause();
        }
        let task = runtime.spawn(run(
            manager.downgrade(),
            connectivity,
            scheduler,
            generation,
            online,
        ));
        debug!(generation, "revalidation started");
        Some(Self { task, generation })
    }

    /// The session generation this task checks. It exits on its own once
    /// the manager moves past it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the task. Same as dropping the handle.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RevalidationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<H: HttpClient>(
    weak: Weak<Shared<H>>,
    mut connectivity: watch::Receiver<bool>,
    mut scheduler: IntervalScheduler,
    generation: u64,
    mut online: bool,
) {
    let mut watching = true;

    loop {
        tokio::select! {
            changed = connectivity.changed(), if watching => {
                if changed.is_err() {
                    // Nobody reports connectivity any more: assume online.
                    debug!(generation, "connectivity signal dropped");
                    watching = false;
                    scheduler.resume();
                    online = true;
                    continue;
                }
                let now_online = *connectivity.borrow_and_update();
                match (online, now_online) {
                    (false, true) => {
                        info!(generation, "connectivity restored, revalidating");
                        scheduler.resume();
                        scheduler.fire_now();
                    }
                    (true, false) => {
                        debug!(generation, "offline, pausing revalidation");
                        scheduler.pause();
                    }
                    _ => {}
                }
                online = now_online;
            }
            tick = scheduler.wait_for_tick() => {
                let Some(manager) = SessionManager::upgrade(&weak) else {
                    break;
                };
                if manager.generation() != generation {
                    break;
                }
                if !manager.is_authenticated() {
                    continue;
                }
                trace!(tick = tick.tick, forced = tick.forced, "revalidating session");
                match manager.verify().await {
                    Ok(_) => {}
                    Err(SessionError::Superseded) => break,
                    Err(e) => {
                        warn!(error = %e, "token verification failed, logging out");
                        manager.logout_with(LogoutReason::VerificationFailed);
                        break;
                    }
                }
            }
        }
    }

    debug!(generation, "revalidation stopped");
}
