use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use mentor_core::{ChatSession, SessionSettings};

pub type SharedSession = Arc<Mutex<ChatSession>>;

struct Entry {
    session: SharedSession,
    last_used: Instant,
}

/// Live sessions of the web shell, keyed by an opaque id.
///
/// Each session sits behind its own mutex, so submissions to one session are
/// serialised while different sessions proceed independently. Every lookup
/// refreshes the session's last-used time; sessions left alone longer than
/// the idle timeout are ended by [`SessionRegistry::sweep_idle`].
#[derive(Default, Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, settings: SessionSettings) -> Uuid {
        let id = Uuid::new_v4();
        let entry = Entry {
            session: Arc::new(Mutex::new(ChatSession::new(settings))),
            last_used: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        info!(session = %id, "session started");
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Discard a session and its history. Returns whether it existed.
    pub async fn end(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session = %id, "session ended");
        }
        removed
    }

    /// End every session unused for at least `max_idle`. Returns how many
    /// were discarded.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        self.sweep_idle_at(Instant::now(), max_idle).await
    }

    async fn sweep_idle_at(&self, now: Instant, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            // A locked session has a submission in flight.
            let busy = entry.session.try_lock().is_err();
            let keep = busy || now.saturating_duration_since(entry.last_used) < max_idle;
            if !keep {
                info!(session = %id, "session expired");
            }
            keep
        });
        before - sessions.len()
    }

    /// Run [`SessionRegistry::sweep_idle`] in the background for as long as
    /// the runtime lives.
    pub fn spawn_idle_sweep(&self, max_idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let period = (max_idle / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let expired = registry.sweep_idle(max_idle).await;
                if expired > 0 {
                    debug!(expired, "idle sessions swept");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::ModelCatalog;

    #[tokio::test]
    async fn sessions_are_isolated_and_discarded() {
        let registry = SessionRegistry::new();
        let settings = SessionSettings::for_catalog(&ModelCatalog::default());

        let a = registry.create(settings.clone()).await;
        let b = registry.create(settings).await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);

        registry
            .get(&a)
            .await
            .unwrap()
            .lock()
            .await
            .set_memory_length(2)
            .unwrap();
        let b_len = registry.get(&b).await.unwrap().lock().await.settings.memory_length;
        assert_eq!(b_len.get(), 5);

        assert!(registry.end(&a).await);
        assert!(!registry.end(&a).await);
        assert!(registry.get(&a).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let registry = SessionRegistry::new();
        let settings = SessionSettings::for_catalog(&ModelCatalog::default());
        let idle = Duration::from_secs(30);

        let stale = registry.create(settings.clone()).await;
        let fresh = registry.create(settings).await;
        let cutoff = Instant::now();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(registry.get(&fresh).await.is_some());

        assert_eq!(registry.sweep_idle_at(cutoff + idle, idle).await, 1);
        assert!(registry.get(&stale).await.is_none());
        assert!(registry.get(&fresh).await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn busy_session_survives_sweep() {
        let registry = SessionRegistry::new();
        let id = registry
            .create(SessionSettings::for_catalog(&ModelCatalog::default()))
            .await;
        let session = registry.get(&id).await.unwrap();
        let _guard = session.lock().await;

        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(registry.sweep_idle_at(later, Duration::from_secs(1)).await, 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn recent_sessions_survive_sweep() {
        let registry = SessionRegistry::new();
        registry
            .create(SessionSettings::for_catalog(&ModelCatalog::default()))
            .await;
        assert_eq!(registry.sweep_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.len().await, 1);
    }
}
