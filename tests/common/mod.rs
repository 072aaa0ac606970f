#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use syncclip::cache::LocalCache;
use syncclip::notify::RecordingSink;
use syncclip::remote::{RemoteError, RemoteStore};
use syncclip::{Clip, SyncEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Create,
    Update,
    Delete,
}

/// Holds one remote call until the test releases it
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Resolves once the held call has reached the store
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// In-memory remote store with switchable failures and call gating
#[derive(Default)]
pub struct FakeRemote {
    clips: Mutex<Vec<Clip>>,
    failing: Mutex<HashSet<Op>>,
    gates: Mutex<HashMap<Op, Arc<Gate>>>,
    next_ids: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Op>>,
    clock: AtomicI64,
    counter: AtomicI64,
}

impl FakeRemote {
    pub fn with_clips(clips: Vec<Clip>) -> Arc<Self> {
        let newest = clips.iter().map(|c| c.created_at).max().unwrap_or(0);
        let remote = Self::default();
        remote.clock.store(newest, Ordering::SeqCst);
        *remote.clips.lock().unwrap() = clips;
        Arc::new(remote)
    }

    /// Every call fails until `go_online`
    pub fn go_offline(&self) {
        let mut failing = self.failing.lock().unwrap();
        failing.extend([Op::List, Op::Create, Op::Update, Op::Delete]);
    }

    pub fn go_online(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn set_failing(&self, op: Op, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(op);
        } else {
            set.remove(&op);
        }
    }

    /// Hold the next call of `op`
    pub fn hold(&self, op: Op) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().unwrap().insert(op, Arc::clone(&gate));
        gate
    }

    /// Id the next successful create will get
    pub fn queue_id(&self, id: &str) {
        self.next_ids.lock().unwrap().push_back(id.to_string());
    }

    /// Stored clips, newest first
    pub fn stored(&self) -> Vec<Clip> {
        let mut clips = self.clips.lock().unwrap().clone();
        clips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        clips
    }

    /// Change a clip behind the engine's back
    pub fn set_content(&self, id: &str, content: &str) {
        if let Some(clip) = self.clips.lock().unwrap().iter_mut().find(|c| c.id == id) {
            clip.content = content.to_string();
        }
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    async fn pass(&self, op: Op) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(op);
        let gate = self.gates.lock().unwrap().remove(&op);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.failing.lock().unwrap().contains(&op) {
            Err(RemoteError::Status(503))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn list(&self) -> Result<Vec<Clip>, RemoteError> {
        self.pass(Op::List).await?;
        Ok(self.stored())
    }

    async fn create(&self, content: &str, note: Option<String>) -> Result<Clip, RemoteError> {
        self.pass(Op::Create).await?;
        let id = self.next_ids.lock().unwrap().pop_front().unwrap_or_else(|| {
            format!("clip-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
        });
        let clip = Clip {
            id,
            content: content.to_string(),
            note,
            created_at: self.clock.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.clips.lock().unwrap().push(clip.clone());
        Ok(clip)
    }

    async fn update(&self, id: &str, content: &str, note: Option<String>) -> Result<(), RemoteError> {
        self.pass(Op::Update).await?;
        let mut clips = self.clips.lock().unwrap();
        match clips.iter_mut().find(|c| c.id == id) {
            Some(clip) => {
                clip.content = content.to_string();
                clip.note = note;
                Ok(())
            }
            None => Err(RemoteError::Rejected("Clip not found".to_string())),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.pass(Op::Delete).await?;
        self.clips.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }
}

pub fn clip(id: &str, content: &str, created_at: i64) -> Clip {
    Clip {
        id: id.to_string(),
        content: content.to_string(),
        note: None,
        created_at,
    }
}

pub fn ids(clips: &[Clip]) -> Vec<String> {
    clips.iter().map(|c| c.id.clone()).collect()
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub remote: Arc<FakeRemote>,
    pub toasts: Arc<RecordingSink>,
    pub cache: LocalCache,
}

/// Engine over `remote` with an in-memory cache seeded with `cached`
pub fn harness(remote: Arc<FakeRemote>, cached: &[Clip]) -> Harness {
    let cache = LocalCache::in_memory();
    cache.try_write(cached).unwrap();
    let toasts = Arc::new(RecordingSink::new());
    let engine = Arc::new(SyncEngine::new(
        remote.clone(),
        cache.clone(),
        toasts.clone(),
    ));
    Harness {
        engine,
        remote,
        toasts,
        cache,
    }
}

/// Engine bootstrapped against a store holding `clips`
pub async fn online_harness(clips: Vec<Clip>) -> Harness {
    let h = harness(FakeRemote::with_clips(clips), &[]);
    h.engine.bootstrap().await;
    h
}
