//! The engine's in-memory clip collection

use crate::clip::{self, Clip};

/// Ordered clips plus a revision counter bumped on every change, so a
/// rollback can tell whether other operations touched the view meanwhile.
#[derive(Debug, Default, Clone)]
pub struct View {
    clips: Vec<Clip>,
    revision: u64,
}

impl View {
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clips.iter().any(|c| c.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// Replace everything
    pub fn replace(&mut self, clips: Vec<Clip>) {
        self.clips = clips;
        self.bump();
    }

    /// Put a freshly created clip at the head
    pub fn push_front(&mut self, clip: Clip) {
        self.clips.insert(0, clip);
        self.bump();
    }

    /// Put a clip back at `index`, or at the end if the view got shorter
    pub fn insert_at(&mut self, index: usize, clip: Clip) {
        let index = index.min(self.clips.len());
        self.clips.insert(index, clip);
        self.bump();
    }

    /// Reinsert a clip at its `created_at` position
    pub fn insert_sorted(&mut self, clip: Clip) {
        clip::insert_sorted(&mut self.clips, clip);
        self.bump();
    }

    /// Overwrite the clip with `id` in place. Returns false if absent.
    pub fn set(&mut self, id: &str, clip: Clip) -> bool {
        match self.clips.iter_mut().find(|c| c.id == id) {
            Some(slot) => {
                *slot = clip;
                self.bump();
                true
            }
            None => false,
        }
    }

    /// Change content and note of `id` in place
    pub fn update(&mut self, id: &str, content: String, note: Option<String>) -> bool {
        match self.clips.iter_mut().find(|c| c.id == id) {
            Some(slot) => {
                slot.content = content;
                slot.note = note;
                self.bump();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Clip> {
        let index = self.position(id)?;
        self.bump();
        Some(self.clips.remove(index))
    }

    /// Confirmed clips only, for mirroring to the local cache
    pub fn confirmed(&self) -> Vec<Clip> {
        self.clips
            .iter()
            .filter(|c| !c.is_provisional())
            .cloned()
            .collect()
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
