use crate::sim::{RecoveryTicket, Simulator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Delay before an emergency stop reverts to IDLE on its own.
pub const RECOVERY_DELAY: Duration = Duration::from_millis(1500);

/// The simulator behind its guard, as shared between the tick loop, the
/// transport, and recovery tasks.
pub type SharedSimulator = Arc<Mutex<Simulator>>;

/// Spawns the one-shot deferred recovery for one emergency stop.
///
/// The task sleeps for [`RECOVERY_DELAY`], re-acquires the guard, and asks
/// the simulator to clear the ERROR keyed by `ticket`. A command that
/// changed the cabin mode in the meantime makes the ticket stale and the
/// recovery a no-op. The returned handle reports whether the recovery
/// fired; callers other than tests drop it (fire-and-forget).
pub fn spawn_recovery(sim: SharedSimulator, ticket: RecoveryTicket) -> JoinHandle<bool> {
    tokio::spawn(async move {
        tokio::time::sleep(RECOVERY_DELAY).await;
        let mut guard = sim.lock().await;
        guard.clear_error(ticket)
    })
}
