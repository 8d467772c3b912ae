use async_trait::async_trait;
use uuid::Uuid;

use crate::config::FlagRegistry;
use crate::domain::entity::EntityRef;
use crate::domain::flagging::{Flagging, FlaggingFilter, NewFlagging};
use crate::error::Result;

/// Row store behind the `flaggings` table.
///
/// Counter caches are looked up in the registry. Every method that changes
/// how many active rows a flaggable has adjusts its counter in the same
/// atomic unit as the row change.
#[async_trait]
pub trait FlaggingStore: Send + Sync + 'static {
    /// Create an active row, incrementing the flaggable's counter.
    async fn insert(&self, registry: &FlagRegistry, new: NewFlagging) -> Result<Flagging>;

    /// Matching rows, newest first.
    async fn find(&self, filter: &FlaggingFilter) -> Result<Vec<Flagging>>;

    async fn exists(&self, filter: &FlaggingFilter) -> Result<bool>;

    async fn get(&self, id: Uuid) -> Result<Option<Flagging>>;

    /// Delete matching rows, decrementing counters for the active ones.
    /// Returns how many rows were removed.
    async fn delete(&self, registry: &FlagRegistry, filter: &FlaggingFilter) -> Result<u64>;

    /// Delete every row whose flagger or flaggable is `reference`.
    async fn delete_referencing(
        &self,
        registry: &FlagRegistry,
        reference: &EntityRef,
    ) -> Result<u64>;

    /// Flip `ignored` on one row and move its flaggable's counter by one.
    ///
    /// Returns `None` when no row transitioned: the row is missing or
    /// already in the requested state.
    async fn set_ignored(
        &self,
        registry: &FlagRegistry,
        id: Uuid,
        ignored: bool,
    ) -> Result<Option<Flagging>>;

    /// Current counter value, or `None` when the type has no counter cache
    /// or the host row is missing.
    async fn counter_value(
        &self,
        registry: &FlagRegistry,
        flaggable: &EntityRef,
    ) -> Result<Option<i64>>;
}
