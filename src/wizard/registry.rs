//! In-memory registry of live wizards, keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::machine::WizardMachine;

/// One wizard, locked per request so transitions never interleave.
pub type SharedWizard = Arc<Mutex<WizardMachine>>;

/// Sessions nobody touched for this long are dropped.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
/// Finished sessions (or ones parked on the completion screen) linger this
/// long so the share link stays readable.
pub const DEFAULT_FINISHED_TTL: Duration = Duration::from_secs(10 * 60);

struct Entry {
    wizard: SharedWizard,
    last_seen: Instant,
}

pub struct WizardRegistry {
    wizards: RwLock<HashMap<Uuid, Entry>>,
    idle_ttl: Duration,
    finished_ttl: Duration,
}

impl WizardRegistry {
    pub fn new() -> Arc<Self> {
        Self::with_ttl(DEFAULT_IDLE_TTL, DEFAULT_FINISHED_TTL)
    }

    pub fn with_ttl(idle_ttl: Duration, finished_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            wizards: RwLock::new(HashMap::new()),
            idle_ttl,
            finished_ttl,
        })
    }

    /// Register a freshly mounted wizard and return its handle.
    pub async fn insert(&self, machine: WizardMachine) -> (Uuid, SharedWizard) {
        let id = machine.id();
        let shared = Arc::new(Mutex::new(machine));
        let entry = Entry {
            wizard: Arc::clone(&shared),
            last_seen: Instant::now(),
        };
        self.wizards.write().await.insert(id, entry);
        info!(session_id = %id, "Wizard registered");
        (id, shared)
    }

    /// Look a wizard up and mark it as seen.
    pub async fn get(&self, id: Uuid) -> Option<SharedWizard> {
        let mut wizards = self.wizards.write().await;
        let entry = wizards.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.wizard))
    }

    /// Drop a wizard once it has exited; its draft left with the exit signal.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.wizards.write().await.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Wizard removed");
        }
        removed
    }

    /// Drop abandoned wizards and finished ones past their grace period.
    /// Returns the number of wizards dropped.
    pub async fn expire_old(&self) -> usize {
        let mut wizards = self.wizards.write().await;
        let before = wizards.len();

        wizards.retain(|id, entry| {
            let idle = entry.last_seen.elapsed();
            // A wizard locked by a request in flight is busy, not finished.
            let finished = entry
                .wizard
                .try_lock()
                .is_ok_and(|machine| machine.is_finished() || machine.current_step().is_terminal());
            let expired = idle >= self.idle_ttl || (finished && idle >= self.finished_ttl);
            if expired {
                debug!(session_id = %id, finished, "Wizard expired");
            }
            !expired
        });

        let expired_count = before - wizards.len();
        if expired_count > 0 {
            info!(count = expired_count, "Expired wizards");
        }
        expired_count
    }

    pub async fn len(&self) -> usize {
        self.wizards.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.wizards.read().await.is_empty()
    }
}

/// Spawn a background task that periodically drops expired wizards.
pub fn spawn_expiry_task(registry: Arc<WizardRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            registry.expire_old().await;
        }
    })
}
