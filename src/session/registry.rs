//! Session registry for managing session actor lifecycle.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::api::SESSION_ID_PREFIX;
use crate::matchmaking::UnpairedPool;

use super::actor::SessionActor;
use super::actor_types::{ActorError, SessionView};
use super::handle::SessionHandle;

/// Upper bound on concurrent view fetches when listing sessions.
const LIST_CONCURRENCY: usize = 16;

/// Registry of live session actors.
///
/// Owns actor lifecycle: spawning, lookup, and coordinated shutdown via a
/// shared watch channel.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
    task_handles: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
    pool: Arc<UnpairedPool>,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionRegistry {
    pub fn new(pool: Arc<UnpairedPool>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            sessions: DashMap::new(),
            task_handles: std::sync::Mutex::new(Vec::new()),
            pool,
            shutdown_tx,
        }
    }

    pub fn pool(&self) -> &Arc<UnpairedPool> {
        &self.pool
    }

    /// Create a new session with a freshly minted id.
    pub fn create(&self) -> SessionHandle {
        let id = format!("{}{}", SESSION_ID_PREFIX, Ulid::new());
        let (tx, task) = SessionActor::spawn(
            id.clone(),
            self.pool.clone(),
            self.shutdown_tx.subscribe(),
        );
        let handle = SessionHandle::new(tx, id.clone());
        self.sessions.insert(id.clone(), handle.clone());
        self.task_handles
            .lock()
            .expect("task handle lock poisoned")
            .push(task);
        info!(session_id = %id, "Session created");
        handle
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|e| e.value().clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Remove a session from the registry. The actor stops once every handle
    /// is dropped; its pool entry is purged on exit.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!(session_id = %session_id, "Session removed");
        }
        removed
    }

    /// Views of all live sessions, fetched with bounded concurrency.
    pub async fn list(&self) -> Vec<SessionView> {
        let handles: Vec<SessionHandle> =
            self.sessions.iter().map(|e| e.value().clone()).collect();

        stream::iter(handles)
            .map(|handle| async move {
                match handle.view().await {
                    Ok(view) => Some(view),
                    // Actor stopped between snapshot and fetch.
                    Err(ActorError::ActorShutdown) => None,
                    Err(err) => {
                        warn!(session_id = %handle.id(), error = %err, "Failed to fetch session view");
                        None
                    }
                }
            })
            .buffer_unordered(LIST_CONCURRENCY)
            .filter_map(|view| async move { view })
            .collect()
            .await
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Signal all actors to stop and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        debug!("Signaling session actors to shut down");
        let _ = self.shutdown_tx.send(true);

        let tasks: Vec<_> = self
            .task_handles
            .lock()
            .expect("task handle lock poisoned")
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "Session actor task panicked during shutdown");
            }
        }
        self.sessions.clear();
        info!("All session actors stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SessionState;
    use crate::intro::Introduction;

    fn test_introduction(first_name: &str) -> Introduction {
        Introduction {
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            age: 30,
            interests: vec!["hiking".to_string()],
        }
    }

    #[tokio::test]
    async fn create_mints_prefixed_unique_ids() {
        let registry = SessionRegistry::new(Arc::new(UnpairedPool::new()));
        let a = registry.create();
        let b = registry.create();

        assert!(a.id().starts_with(SESSION_ID_PREFIX));
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a.id()));
    }

    #[tokio::test]
    async fn get_returns_live_handle() {
        let registry = SessionRegistry::new(Arc::new(UnpairedPool::new()));
        let handle = registry.create();

        let fetched = registry.get(handle.id()).unwrap();
        let view = fetched.view().await.unwrap();
        assert_eq!(view.state, SessionState::Introduction);

        assert!(registry.get("session_nope").is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = SessionRegistry::new(Arc::new(UnpairedPool::new()));
        let handle = registry.create();

        assert!(registry.remove(handle.id()));
        assert!(!registry.remove(handle.id()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn list_returns_all_views() {
        let registry = SessionRegistry::new(Arc::new(UnpairedPool::new()));
        let a = registry.create();
        registry.create();
        a.complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();

        let views = registry.list().await;
        assert_eq!(views.len(), 2);
        assert!(
            views
                .iter()
                .any(|v| v.id == a.id() && v.state == SessionState::Waiting)
        );
    }

    #[tokio::test]
    async fn shutdown_stops_actors_and_clears_pool() {
        let pool = Arc::new(UnpairedPool::new());
        let registry = SessionRegistry::new(pool.clone());
        let handle = registry.create();
        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();
        assert!(!pool.is_empty());

        registry.shutdown().await;
        assert!(registry.is_empty());
        assert!(pool.is_empty());
        assert!(matches!(
            handle.view().await.unwrap_err(),
            ActorError::ActorShutdown
        ));
    }
}
