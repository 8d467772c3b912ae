use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::FlagRegistry;
use crate::domain::entity::EntityRef;
use crate::domain::flagging::{Flagging, FlaggingFilter, NewFlagging};
use crate::error::Result;
use crate::infra::store::FlaggingStore;

/// In-process store. Each call holds the lock for its whole duration, which
/// makes every operation atomic.
///
/// Counter caches live in host rows the store does not own, so a flaggable
/// only has a counter once `create_counter_row` has been called for it.
/// Until then `counter_value` is `None` and counter updates are skipped,
/// the same as `PgFlaggingStore` against a missing host row.
#[derive(Default, Debug)]
pub struct MemoryFlaggingStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default, Debug)]
struct MemoryState {
    // Insertion order; ties on created_at resolve to the later index.
    rows: Vec<Flagging>,
    // Stand-in host rows, keyed by flaggable.
    counters: HashMap<EntityRef, i64>,
}

impl MemoryState {
    fn adjust_counter(&mut self, registry: &FlagRegistry, flaggable: EntityRef, delta: i64) {
        if registry.counter_cache(&flaggable.entity_type).is_none() {
            return;
        }
        match self.counters.get_mut(&flaggable) {
            Some(count) => *count += delta,
            None => tracing::warn!(flaggable = %flaggable, "counter cache row not found"),
        }
    }

    fn remove_where<F>(&mut self, registry: &FlagRegistry, predicate: F) -> u64
    where
        F: Fn(&Flagging) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.rows).into_iter().partition(|row| predicate(row));
        self.rows = kept;
        for row in &removed {
            if row.is_active() {
                self.adjust_counter(registry, row.flaggable(), -1);
            }
        }
        removed.len() as u64
    }
}

impl MemoryFlaggingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the host row backing a flaggable's counter cache, starting at
    /// zero. A row that already exists is left as is.
    pub async fn create_counter_row(&self, flaggable: &EntityRef) {
        let mut inner = self.inner.lock().await;
        inner.counters.entry(flaggable.clone()).or_insert(0);
    }

    /// Number of stored rows, ignored ones included.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FlaggingStore for MemoryFlaggingStore {
    async fn insert(&self, registry: &FlagRegistry, new: NewFlagging) -> Result<Flagging> {
        let mut inner = self.inner.lock().await;
        let flagging = Flagging {
            id: Uuid::new_v4(),
            flagger_type: new.flagger.entity_type,
            flagger_id: new.flagger.id,
            flaggable_type: new.flaggable.entity_type,
            flaggable_id: new.flaggable.id,
            flag: new.flag,
            ignored: false,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.adjust_counter(registry, flagging.flaggable(), 1);
        inner.rows.push(flagging.clone());
        Ok(flagging)
    }

    async fn find(&self, filter: &FlaggingFilter) -> Result<Vec<Flagging>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Flagging> = inner
            .rows
            .iter()
            .rev()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        // Stable, so equal timestamps keep newest-inserted first.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn exists(&self, filter: &FlaggingFilter) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().any(|row| filter.matches(row)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Flagging>> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn delete(&self, registry: &FlagRegistry, filter: &FlaggingFilter) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        Ok(inner.remove_where(registry, |row| filter.matches(row)))
    }

    async fn delete_referencing(
        &self,
        registry: &FlagRegistry,
        reference: &EntityRef,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let removed = inner.remove_where(registry, |row| {
            row.flagger() == *reference || row.flaggable() == *reference
        });
        // The host row goes with the entity.
        inner.counters.remove(reference);
        Ok(removed)
    }

    async fn set_ignored(
        &self,
        registry: &FlagRegistry,
        id: Uuid,
        ignored: bool,
    ) -> Result<Option<Flagging>> {
        let mut inner = self.inner.lock().await;
        let Some(row) = inner
            .rows
            .iter_mut()
            .find(|row| row.id == id && row.ignored != ignored)
        else {
            return Ok(None);
        };
        row.ignored = ignored;
        let updated = row.clone();
        let delta = if ignored { -1 } else { 1 };
        inner.adjust_counter(registry, updated.flaggable(), delta);
        Ok(Some(updated))
    }

    async fn counter_value(
        &self,
        registry: &FlagRegistry,
        flaggable: &EntityRef,
    ) -> Result<Option<i64>> {
        if registry.counter_cache(&flaggable.entity_type).is_none() {
            return Ok(None);
        }
        let inner = self.inner.lock().await;
        Ok(inner.counters.get(flaggable).copied())
    }
}
