use std::collections::HashMap;

use crate::error::Result;
use crate::storage::{ContentStore, ItemId};

/// Per-run memo of `(slug, type)` lookups.
///
/// Only hits are remembered: a target missing now may be imported later in the
/// same run. Entries are never invalidated.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<(String, String), ItemId>,
    queries: usize,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a target, querying `store` at most once per call on a cache miss
    pub fn resolve<S: ContentStore + ?Sized>(
        &mut self,
        store: &S,
        slug: &str,
        item_type: &str,
    ) -> Result<Option<ItemId>> {
        let key = (slug.to_string(), item_type.to_string());
        if let Some(id) = self.entries.get(&key) {
            return Ok(Some(*id));
        }

        self.queries += 1;
        let found = store.find_item(slug, item_type)?;
        if let Some(id) = found {
            self.entries.insert(key, id);
        }
        Ok(found)
    }

    /// Number of storage queries issued so far
    pub fn queries(&self) -> usize {
        self.queries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
