//! Optimistic synchronization engine
//!
//! The engine owns the in-memory view of the clip collection. Every mutation
//! is applied to the view before the remote store is contacted, then either
//! committed (and mirrored to the local cache) or rolled back when the store
//! is unavailable. Operations never hold the view lock across a network call,
//! so several of them can be in flight at once; each carries its own rollback
//! state. Two overlapping operations on the same id are not serialized and
//! the later completion wins.

pub mod undo;
pub mod view;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::{LocalCache, StorageError};
use crate::clip::{self, Clip};
use crate::notify::{Toast, ToastAction, ToastIntent, ToastSink};
use crate::remote::{RemoteError, RemoteStore};

pub use undo::UndoManager;
pub use view::View;

pub const MSG_POSTED: &str = "Posted!";
pub const MSG_POST_FAILED: &str = "Post failed.";
pub const MSG_UPDATED: &str = "Updated.";
pub const MSG_UPDATE_FAILED: &str = "Update failed.";
pub const MSG_DELETED: &str = "Clip deleted.";
pub const MSG_DELETE_FAILED: &str = "Delete failed.";
pub const MSG_OFFLINE: &str = "Unable to reach the server, offline mode enabled.";
pub const LABEL_UNDO: &str = "Undo";

/// Failure taxonomy of engine operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote store unreachable or answered with something unusable.
    /// The view has already been rolled back or fallen back.
    #[error("Remote store unavailable: {0}")]
    Unavailable(#[from] RemoteError),

    /// Nothing to do: blank content, unknown id, empty undo slot
    #[error("Nothing to do")]
    Empty,

    /// Local persistence failed
    #[error("Local storage failure: {0}")]
    StorageFailure(#[from] StorageError),
}

impl SyncError {
    /// Whether this is a no-op rather than a failure
    pub fn is_noop(&self) -> bool {
        matches!(self, SyncError::Empty)
    }
}

/// Last known reachability of the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Unknown,
    Online,
    Offline,
}

/// Result of a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Remote identity set differed; the view was replaced
    Replaced,
    /// Remote identity set matched; the view was left alone
    Unchanged,
    /// Remote store unavailable
    Offline,
}

/// Who asked for a refresh; decides how failures are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    /// User or startup: falls back to the cache and notifies
    Explicit,
    /// Background poll: failures are only logged
    Poll,
}

/// An optimistic change to the view
#[derive(Debug, Clone)]
pub enum Mutation {
    Create { content: String, note: Option<String> },
    Update { id: String, content: String, note: Option<String> },
    Delete { id: String },
}

/// State needed to commit or undo an applied [`Mutation`]
#[derive(Debug, Clone)]
pub enum Pending {
    /// A provisional clip sits at the head of the view
    Create { provisional: Clip },
    /// Full view before the edit, and the view revision right after it
    Update {
        id: String,
        snapshot: Vec<Clip>,
        revision: u64,
    },
    /// The clip taken out of the view, where it sat, and the view revision
    /// right after
    Delete {
        removed: Clip,
        index: usize,
        revision: u64,
    },
}

pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    cache: LocalCache,
    toasts: Arc<dyn ToastSink>,
    view: RwLock<View>,
    undo: Mutex<UndoManager>,
    connectivity: watch::Sender<Connectivity>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: LocalCache,
        toasts: Arc<dyn ToastSink>,
    ) -> Self {
        let (connectivity, _) = watch::channel(Connectivity::Unknown);

        Self {
            remote,
            cache,
            toasts,
            view: RwLock::new(View::default()),
            undo: Mutex::new(UndoManager::new()),
            connectivity,
        }
    }

    /// Seed the view from the local cache, then refresh from the remote store
    pub async fn bootstrap(&self) -> RefreshOutcome {
        let mut cached = self.cache.read();
        clip::sort_newest_first(&mut cached);
        info!("Loaded {} clips from local cache", cached.len());
        self.view.write().await.replace(cached);

        self.refresh_from_remote().await
    }

    /// Current view, newest first
    pub async fn view(&self) -> Vec<Clip> {
        self.view.read().await.clips().to_vec()
    }

    /// Clips in the view matching `query` in content or note
    pub async fn search(&self, query: &str) -> Vec<Clip> {
        let view = self.view.read().await;
        clip::filter_clips(view.clips(), query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn connectivity(&self) -> Connectivity {
        *self.connectivity.borrow()
    }

    /// Watch connectivity changes, e.g. for a header status indicator
    pub fn subscribe_connectivity(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.subscribe()
    }

    /// The clip an `undo()` would restore, if any
    pub async fn pending_undo(&self) -> Option<Clip> {
        self.undo.lock().await.peek().cloned()
    }

    /// Post a new clip
    pub async fn submit(&self, content: &str, note: Option<String>) -> Result<Clip, SyncError> {
        let note = clip::normalize_note(note);
        let pending = self
            .apply_optimistic(Mutation::Create {
                content: content.to_string(),
                note: note.clone(),
            })
            .await?;

        let outcome = self.remote.create(content, note).await.map(Some);
        match self.commit_or_rollback(pending, outcome).await {
            Ok(confirmed) => {
                self.toasts.add_toast(Toast::success(MSG_POSTED));
                confirmed.ok_or(SyncError::Empty)
            }
            Err(e) => {
                self.toasts.add_toast(Toast::error(MSG_POST_FAILED));
                Err(e)
            }
        }
    }

    /// Change content and note of an existing clip
    pub async fn edit(&self, id: &str, content: &str, note: Option<String>) -> Result<(), SyncError> {
        let note = clip::normalize_note(note);
        let pending = self
            .apply_optimistic(Mutation::Update {
                id: id.to_string(),
                content: content.to_string(),
                note: note.clone(),
            })
            .await?;

        let outcome = self.remote.update(id, content, note).await.map(|_| None);
        match self.commit_or_rollback(pending, outcome).await {
            Ok(_) => {
                self.toasts.add_toast(Toast::success(MSG_UPDATED));
                Ok(())
            }
            Err(e) => {
                self.toasts.add_toast(Toast::error(MSG_UPDATE_FAILED));
                Err(e)
            }
        }
    }

    /// Delete a clip, keeping it available to `undo()`
    pub async fn remove(&self, id: &str) -> Result<Clip, SyncError> {
        let pending = self
            .apply_optimistic(Mutation::Delete { id: id.to_string() })
            .await?;
        let removed = match &pending {
            Pending::Delete { removed, .. } => removed.clone(),
            _ => return Err(SyncError::Empty),
        };

        self.toasts.add_toast(Toast::info_with_action(
            MSG_DELETED,
            ToastAction {
                label: LABEL_UNDO.to_string(),
                intent: ToastIntent::UndoDelete {
                    clip_id: removed.id.clone(),
                },
            },
        ));

        let outcome = self.remote.delete(id).await.map(|_| None);
        match self.commit_or_rollback(pending, outcome).await {
            Ok(_) => Ok(removed),
            Err(e) => {
                self.toasts.add_toast(Toast::error(MSG_DELETE_FAILED));
                Err(e)
            }
        }
    }

    /// Restore the most recently deleted clip.
    ///
    /// The clip is reinserted locally first, then re-created remotely under a
    /// new identity. A failed re-create is logged and the local copy stays.
    pub async fn undo(&self) -> Result<Clip, SyncError> {
        let captured = self.undo.lock().await.take().ok_or(SyncError::Empty)?;

        {
            let mut view = self.view.write().await;
            if view.contains(&captured.id) {
                debug!("Clip {} already in view, nothing to undo", captured.id);
                return Err(SyncError::Empty);
            }
            view.insert_sorted(captured.clone());
        }
        info!("Restored clip {} locally", captured.id);

        match self
            .remote
            .create(&captured.content, captured.note.clone())
            .await
        {
            Ok(confirmed) => {
                self.set_connectivity(Connectivity::Online);
                {
                    // Adopt the new remote identity; its timestamp may move it.
                    let mut view = self.view.write().await;
                    view.remove(&captured.id);
                    if !view.contains(&confirmed.id) {
                        view.insert_sorted(confirmed.clone());
                    }
                }
                self.persist_view().await;
                Ok(confirmed)
            }
            Err(e) => {
                self.set_connectivity(Connectivity::Offline);
                error!("Undo failed on server for clip {}: {}", captured.id, e);
                Ok(captured)
            }
        }
    }

    /// Explicit refresh: on failure falls back to the cached collection
    pub async fn refresh_from_remote(&self) -> RefreshOutcome {
        self.reconcile(RefreshSource::Explicit).await
    }

    /// Pull the remote collection and replace the view only when the set of
    /// ids differs. Content-only changes to existing ids are ignored to avoid
    /// churning the view; they show up once the id set changes for another
    /// reason.
    pub async fn reconcile(&self, source: RefreshSource) -> RefreshOutcome {
        match self.remote.list().await {
            Ok(remote) => {
                self.set_connectivity(Connectivity::Online);
                self.cache.write(&remote);

                let mut view = self.view.write().await;
                if clip::same_identities(view.clips(), &remote) {
                    debug!("Remote collection unchanged ({} clips)", remote.len());
                    RefreshOutcome::Unchanged
                } else {
                    info!(
                        "Remote collection changed, replacing view ({} -> {} clips)",
                        view.len(),
                        remote.len()
                    );
                    view.replace(remote);
                    RefreshOutcome::Replaced
                }
            }
            Err(e) => {
                self.set_connectivity(Connectivity::Offline);
                match source {
                    RefreshSource::Poll => {
                        debug!("Poll failed, keeping current view: {}", e);
                    }
                    RefreshSource::Explicit => {
                        warn!("Remote fetch failed, falling back to local cache: {}", e);
                        self.fall_back_to_cache().await;
                        self.toasts.add_toast(Toast::error(MSG_OFFLINE));
                    }
                }
                RefreshOutcome::Offline
            }
        }
    }

    /// First phase: change the view and return what is needed to finish
    pub async fn apply_optimistic(&self, mutation: Mutation) -> Result<Pending, SyncError> {
        match mutation {
            Mutation::Create { content, note } => {
                if content.trim().is_empty() {
                    return Err(SyncError::Empty);
                }
                let provisional = Clip::provisional(content, note);
                self.view.write().await.push_front(provisional.clone());
                debug!("Optimistically inserted {}", provisional.id);
                Ok(Pending::Create { provisional })
            }
            Mutation::Update { id, content, note } => {
                if content.trim().is_empty() {
                    return Err(SyncError::Empty);
                }
                let mut view = self.view.write().await;
                let snapshot = view.clips().to_vec();
                if !view.update(&id, content, note) {
                    return Err(SyncError::Empty);
                }
                debug!("Optimistically updated {}", id);
                Ok(Pending::Update {
                    id,
                    snapshot,
                    revision: view.revision(),
                })
            }
            Mutation::Delete { id } => {
                let (removed, index, revision) = {
                    let mut view = self.view.write().await;
                    let index = view.position(&id).ok_or(SyncError::Empty)?;
                    let removed = view.remove(&id).ok_or(SyncError::Empty)?;
                    (removed, index, view.revision())
                };
                self.undo.lock().await.capture(removed.clone());
                debug!("Optimistically removed {}", id);
                Ok(Pending::Delete {
                    removed,
                    index,
                    revision,
                })
            }
        }
    }

    /// Second phase: keep the optimistic change if the store confirmed it,
    /// otherwise restore the view. Rollback only touches the view; requests
    /// already sent are never compensated.
    pub async fn commit_or_rollback(
        &self,
        pending: Pending,
        outcome: Result<Option<Clip>, RemoteError>,
    ) -> Result<Option<Clip>, SyncError> {
        match outcome {
            Ok(confirmed) => {
                self.set_connectivity(Connectivity::Online);
                match (pending, confirmed) {
                    (Pending::Create { provisional }, Some(confirmed)) => {
                        self.commit_create(&provisional.id, confirmed.clone()).await;
                        Ok(Some(confirmed))
                    }
                    (Pending::Delete { removed, .. }, confirmed) => {
                        // A poll that ran while the delete was in flight may
                        // have brought the clip back.
                        if self.view.write().await.remove(&removed.id).is_some() {
                            debug!("Dropped {} reinstated during delete", removed.id);
                        }
                        self.persist_view().await;
                        Ok(confirmed)
                    }
                    (_, confirmed) => {
                        self.persist_view().await;
                        Ok(confirmed)
                    }
                }
            }
            Err(e) => {
                self.set_connectivity(Connectivity::Offline);
                warn!("Remote store unavailable, rolling back: {}", e);
                self.rollback(pending).await;
                Err(SyncError::Unavailable(e))
            }
        }
    }

    async fn rollback(&self, pending: Pending) {
        // Set when other operations committed meanwhile and may have mirrored
        // this optimistic change into the cache.
        let touched = match pending {
            Pending::Create { provisional } => {
                self.view.write().await.remove(&provisional.id);
                false
            }
            Pending::Update {
                id,
                snapshot,
                revision,
            } => {
                let mut view = self.view.write().await;
                if view.revision() == revision {
                    view.replace(snapshot);
                    false
                } else {
                    // Restore only this clip so the other changes survive. If
                    // it was deleted meanwhile this brings it back.
                    if let Some(original) = snapshot.into_iter().find(|c| c.id == id) {
                        if !view.set(&id, original.clone()) {
                            view.insert_sorted(original);
                        }
                    }
                    true
                }
            }
            Pending::Delete {
                removed,
                index,
                revision,
            } => {
                self.undo.lock().await.discard(&removed.id);
                let mut view = self.view.write().await;
                if view.revision() == revision {
                    view.insert_at(index, removed);
                    false
                } else {
                    if !view.contains(&removed.id) {
                        view.insert_sorted(removed);
                    }
                    true
                }
            }
        };

        if touched {
            self.persist_view().await;
        }
    }

    /// Swap the provisional clip for the confirmed one, keeping its position.
    /// If the provisional clip is gone (a refresh replaced the view in the
    /// meantime) the confirmed clip is inserted unless already present.
    async fn commit_create(&self, provisional_id: &str, confirmed: Clip) {
        {
            let mut view = self.view.write().await;
            if view.contains(&confirmed.id) {
                view.remove(provisional_id);
            } else if !view.set(provisional_id, confirmed.clone()) {
                view.insert_sorted(confirmed);
            }
        }
        self.persist_view().await;
    }

    /// Mirror the confirmed part of the view to the local cache
    async fn persist_view(&self) {
        let confirmed = self.view.read().await.confirmed();
        self.cache.write(&confirmed);
    }

    async fn fall_back_to_cache(&self) {
        let mut cached = self.cache.read();
        let mut view = self.view.write().await;
        if cached.is_empty() && !view.is_empty() {
            // Cache is unusable; keep running on what is in memory.
            debug!("Local cache empty, keeping in-memory view");
            return;
        }
        clip::sort_newest_first(&mut cached);
        view.replace(cached);
    }

    fn set_connectivity(&self, state: Connectivity) {
        self.connectivity.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{RecordingSink, ToastKind};
    use crate::remote::MockRemoteStore;
    use pretty_assertions::assert_eq;

    fn clip(id: &str, content: &str, created_at: i64) -> Clip {
        Clip {
            id: id.to_string(),
            content: content.to_string(),
            note: None,
            created_at,
        }
    }

    fn unavailable() -> RemoteError {
        RemoteError::Status(503)
    }

    async fn engine_with(
        mock: MockRemoteStore,
        view: Vec<Clip>,
    ) -> (SyncEngine, Arc<RecordingSink>, LocalCache) {
        let sink = Arc::new(RecordingSink::new());
        let cache = LocalCache::in_memory();
        let engine = SyncEngine::new(Arc::new(mock), cache.clone(), sink.clone());
        engine.view.write().await.replace(view);
        (engine, sink, cache)
    }

    #[tokio::test]
    async fn test_submit_rejects_blank_content_without_remote_call() {
        let mut mock = MockRemoteStore::new();
        mock.expect_create().never();
        let (engine, sink, _) = engine_with(mock, vec![]).await;

        let err = engine.submit("   ", None).await.unwrap_err();
        assert!(err.is_noop());
        assert!(engine.view().await.is_empty());
        assert!(sink.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure_removes_provisional_and_reports() {
        let mut mock = MockRemoteStore::new();
        mock.expect_create().returning(|_, _| Err(unavailable()));
        let (engine, sink, cache) = engine_with(mock, vec![clip("a", "x", 100)]).await;

        let err = engine.submit("y", None).await.unwrap_err();
        assert!(matches!(err, SyncError::Unavailable(_)));
        assert_eq!(engine.view().await, vec![clip("a", "x", 100)]);
        assert_eq!(sink.kinds(), vec![ToastKind::Error]);
        assert!(cache.read().is_empty());
        assert_eq!(engine.connectivity(), Connectivity::Offline);
    }

    #[tokio::test]
    async fn test_submit_success_writes_through_to_cache() {
        let mut mock = MockRemoteStore::new();
        mock.expect_create()
            .withf(|content, note| content == "y" && note.as_deref() == Some("n"))
            .returning(|_, _| {
                Ok(Clip {
                    id: "b".to_string(),
                    content: "y".to_string(),
                    note: Some("n".to_string()),
                    created_at: 101,
                })
            });
        let (engine, sink, cache) = engine_with(mock, vec![clip("a", "x", 100)]).await;

        let confirmed = engine.submit("y", Some(" n ".to_string())).await.unwrap();
        assert_eq!(confirmed.id, "b");
        let ids: Vec<_> = cache.read().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(sink.kinds(), vec![ToastKind::Success]);
        assert_eq!(engine.connectivity(), Connectivity::Online);
    }

    #[tokio::test]
    async fn test_edit_unknown_id_is_noop() {
        let mut mock = MockRemoteStore::new();
        mock.expect_update().never();
        let (engine, _, _) = engine_with(mock, vec![clip("a", "x", 100)]).await;

        assert!(engine.edit("zzz", "new", None).await.unwrap_err().is_noop());
    }

    #[tokio::test]
    async fn test_edit_failure_restores_snapshot() {
        let mut mock = MockRemoteStore::new();
        mock.expect_update().returning(|_, _, _| Err(unavailable()));
        let before = vec![clip("b", "y", 101), clip("a", "x", 100)];
        let (engine, sink, _) = engine_with(mock, before.clone()).await;

        assert!(engine.edit("a", "z", None).await.is_err());
        assert_eq!(engine.view().await, before);
        assert_eq!(sink.kinds(), vec![ToastKind::Error]);
        assert_eq!(sink.toasts()[0].message, MSG_UPDATE_FAILED);
    }

    #[tokio::test]
    async fn test_failed_edit_keeps_concurrent_delete_of_other_clip() {
        let mut mock = MockRemoteStore::new();
        mock.expect_update().never();
        mock.expect_delete().never();
        let (engine, _, _) =
            engine_with(mock, vec![clip("b", "y", 101), clip("a", "x", 100)]).await;

        let edit = engine
            .apply_optimistic(Mutation::Update {
                id: "a".to_string(),
                content: "z".to_string(),
                note: None,
            })
            .await
            .unwrap();
        let delete = engine
            .apply_optimistic(Mutation::Delete { id: "b".to_string() })
            .await
            .unwrap();
        engine.commit_or_rollback(delete, Ok(None)).await.unwrap();
        assert!(engine
            .commit_or_rollback(edit, Err(unavailable()))
            .await
            .is_err());

        assert_eq!(engine.view().await, vec![clip("a", "x", 100)]);
    }

    #[tokio::test]
    async fn test_remove_absent_id_is_noop() {
        let mut mock = MockRemoteStore::new();
        mock.expect_delete().never();
        let (engine, sink, _) = engine_with(mock, vec![clip("a", "x", 100)]).await;

        assert!(engine.remove("nope").await.unwrap_err().is_noop());
        assert!(sink.toasts().is_empty());
        assert!(engine.pending_undo().await.is_none());
    }

    #[tokio::test]
    async fn test_remove_failure_reinserts_in_order_and_clears_undo() {
        let mut mock = MockRemoteStore::new();
        mock.expect_delete().returning(|_| Err(unavailable()));
        let before = vec![clip("c", "3", 300), clip("b", "2", 200), clip("a", "1", 100)];
        let (engine, sink, _) = engine_with(mock, before.clone()).await;

        assert!(engine.remove("b").await.is_err());
        assert_eq!(engine.view().await, before);
        assert_eq!(sink.kinds(), vec![ToastKind::Info, ToastKind::Error]);
        assert!(engine.pending_undo().await.is_none());
    }

    #[tokio::test]
    async fn test_remove_emits_undo_action() {
        let mut mock = MockRemoteStore::new();
        mock.expect_delete().returning(|_| Ok(()));
        let (engine, sink, _) = engine_with(mock, vec![clip("a", "x", 100)]).await;

        engine.remove("a").await.unwrap();
        let toast = &sink.toasts()[0];
        assert_eq!(toast.kind, ToastKind::Info);
        assert_eq!(
            toast.action.as_ref().map(|a| a.intent.clone()),
            Some(ToastIntent::UndoDelete {
                clip_id: "a".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_undo_with_nothing_captured_is_noop() {
        let (engine, _, _) = engine_with(MockRemoteStore::new(), vec![]).await;
        assert!(engine.undo().await.unwrap_err().is_noop());
    }

    #[tokio::test]
    async fn test_undo_remote_failure_keeps_local_copy() {
        let mut mock = MockRemoteStore::new();
        mock.expect_delete().returning(|_| Ok(()));
        mock.expect_create().returning(|_, _| Err(unavailable()));
        let (engine, sink, _) =
            engine_with(mock, vec![clip("b", "y", 200), clip("a", "x", 100)]).await;

        engine.remove("b").await.unwrap();
        let restored = engine.undo().await.unwrap();
        assert_eq!(restored.id, "b");
        assert_eq!(
            engine.view().await,
            vec![clip("b", "y", 200), clip("a", "x", 100)]
        );
        // Only the delete notice; undo failures are log-only.
        assert_eq!(sink.kinds(), vec![ToastKind::Info]);
    }

    #[tokio::test]
    async fn test_poll_failure_is_silent_and_keeps_view() {
        let mut mock = MockRemoteStore::new();
        mock.expect_list().returning(|| Err(unavailable()));
        let (engine, sink, _) = engine_with(mock, vec![clip("a", "x", 100)]).await;

        assert_eq!(
            engine.reconcile(RefreshSource::Poll).await,
            RefreshOutcome::Offline
        );
        assert_eq!(engine.view().await, vec![clip("a", "x", 100)]);
        assert!(sink.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_refresh_failure_with_empty_cache_keeps_memory_view() {
        let mut mock = MockRemoteStore::new();
        mock.expect_list().returning(|| Err(unavailable()));
        let (engine, sink, _) = engine_with(mock, vec![clip("a", "x", 100)]).await;

        assert_eq!(engine.refresh_from_remote().await, RefreshOutcome::Offline);
        assert_eq!(engine.view().await, vec![clip("a", "x", 100)]);
        assert_eq!(sink.toasts()[0].message, MSG_OFFLINE);
    }

    #[tokio::test]
    async fn test_connectivity_watch_reports_changes() {
        let mut mock = MockRemoteStore::new();
        mock.expect_list().returning(|| Ok(vec![]));
        let (engine, _, _) = engine_with(mock, vec![]).await;
        let mut rx = engine.subscribe_connectivity();
        assert_eq!(*rx.borrow(), Connectivity::Unknown);

        engine.refresh_from_remote().await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Connectivity::Online);
    }
}
