use shared::domain::{Contact, ContactId};
use tokio::sync::RwLock;

/// Everything needed to undo an optimistic removal: the contact itself, the
/// position it held, and the snapshot generation it was removed under.
#[derive(Debug, Clone)]
pub struct RemovedEntry {
    pub contact: Contact,
    original_index: usize,
    generation: u64,
}

impl RemovedEntry {
    pub fn original_index(&self) -> usize {
        self.original_index
    }
}

/// Process-scoped ordered collection of contacts; the single read model the
/// presentation layer consumes. Operations are total: the store never fails,
/// it only reflects the last authoritative write.
///
/// Each successful `replace_all` bumps a generation counter. A
/// [`RemovedEntry`] remembers the generation it was taken from, and
/// [`DirectoryStore::restore`] refuses to reinsert across a generation
/// boundary: once a refreshed list has been applied, it is authoritative and
/// a stale rollback must not resurrect an entry into it.
#[derive(Debug, Default)]
pub struct DirectoryStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    contacts: Vec<Contact>,
    generation: u64,
}

impl DirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swaps the held sequence for a freshly listed one.
    /// Duplicate ids in the input keep their first occurrence so the
    /// id-uniqueness invariant holds regardless of what the server sent.
    pub async fn replace_all(&self, contacts: Vec<Contact>) {
        let mut inner = self.inner.write().await;
        let mut deduped: Vec<Contact> = Vec::with_capacity(contacts.len());
        for contact in contacts {
            if !deduped.iter().any(|held| held.id == contact.id) {
                deduped.push(contact);
            }
        }
        inner.contacts = deduped;
        inner.generation += 1;
    }

    /// Replaces the entry with a matching id in place, or appends when the
    /// id is new.
    pub async fn upsert(&self, contact: Contact) {
        let mut inner = self.inner.write().await;
        match inner.contacts.iter_mut().find(|held| held.id == contact.id) {
            Some(held) => *held = contact,
            None => inner.contacts.push(contact),
        }
    }

    /// Removes the entry immediately, returning what is needed to undo.
    pub async fn optimistic_remove(&self, id: &ContactId) -> Option<RemovedEntry> {
        let mut inner = self.inner.write().await;
        let index = inner.contacts.iter().position(|held| &held.id == id)?;
        let contact = inner.contacts.remove(index);
        Some(RemovedEntry {
            contact,
            original_index: index,
            generation: inner.generation,
        })
    }

    /// Reinserts an optimistically removed contact at its original position,
    /// clamped to the current bounds. Returns `false` when the rollback is
    /// discarded: the snapshot generation moved on, or the id reappeared.
    pub async fn restore(&self, entry: RemovedEntry) -> bool {
        let mut inner = self.inner.write().await;
        if entry.generation != inner.generation {
            return false;
        }
        if inner.contacts.iter().any(|held| held.id == entry.contact.id) {
            return false;
        }
        let index = entry.original_index.min(inner.contacts.len());
        inner.contacts.insert(index, entry.contact);
        true
    }

    pub async fn find_by_id(&self, id: &ContactId) -> Option<Contact> {
        let inner = self.inner.read().await;
        inner.contacts.iter().find(|held| &held.id == id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<Contact> {
        self.inner.read().await.contacts.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.contacts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.contacts.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
