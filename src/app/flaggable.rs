use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::app::{present, FlagService};
use crate::config::FlagRegistry;
use crate::domain::entity::Entity;
use crate::domain::flagging::{Flagging, FlaggingFilter};
use crate::error::Result;
use crate::infra::store::FlaggingStore;

/// An entity that can receive flags. Its vocabulary lives in the
/// [`FlagRegistry`] under `TYPE_NAME`.
#[async_trait]
pub trait Flaggable: Entity {
    fn available_flags<'a>(&self, registry: &'a FlagRegistry) -> Option<&'a BTreeSet<String>> {
        registry.available_flags(Self::TYPE_NAME)
    }

    async fn flaggings<S>(&self, flags: &FlagService<S>) -> Result<Vec<Flagging>>
    where
        S: FlaggingStore,
    {
        flags.flaggings_for(self).await
    }

    async fn is_flagged<S>(&self, flags: &FlagService<S>, flag: Option<&str>) -> Result<bool>
    where
        S: FlaggingStore,
    {
        flags.is_flagged(self, flag).await
    }

    async fn flaggings_count<S>(&self, flags: &FlagService<S>) -> Result<Option<i64>>
    where
        S: FlaggingStore,
    {
        flags.flaggings_count(self).await
    }
}

impl<S: FlaggingStore> FlagService<S> {
    pub fn is_flaggable_type<T: Flaggable>(&self) -> bool {
        self.registry.is_flaggable_type(T::TYPE_NAME)
    }

    /// Every row referencing `flaggable`, ignored ones included, newest first.
    pub async fn flaggings_for<T: Flaggable>(&self, flaggable: &T) -> Result<Vec<Flagging>> {
        self.check_flaggable::<T>(None)?;
        self.store
            .find(&FlaggingFilter::new().with_flaggable(flaggable.entity_ref()))
            .await
    }

    /// Whether any row references `flaggable`, optionally only rows with
    /// `flag`. Ignored rows count.
    pub async fn is_flagged<T: Flaggable>(&self, flaggable: &T, flag: Option<&str>) -> Result<bool> {
        let flag = present(flag);
        self.check_flaggable::<T>(flag)?;

        let filter = FlaggingFilter::new().with_flaggable(flaggable.entity_ref());
        let filter = match flag {
            Some(flag) => filter.with_flag(flag),
            None => filter,
        };
        self.store.exists(&filter).await
    }

    /// The counter cache value, or `None` when `T` has no counter cache.
    pub async fn flaggings_count<T: Flaggable>(&self, flaggable: &T) -> Result<Option<i64>> {
        self.check_flaggable::<T>(None)?;
        self.store
            .counter_value(&self.registry, &flaggable.entity_ref())
            .await
    }

    /// Delete every row referencing `flaggable`. Call this from the host's
    /// deletion path for the flaggable entity.
    pub async fn destroy_flaggable<T: Flaggable>(&self, flaggable: &T) -> Result<u64> {
        let reference = flaggable.entity_ref();
        let removed = self
            .store
            .delete_referencing(&self.registry, &reference)
            .await?;
        tracing::info!(flaggable = %reference, removed, "removed flaggings for destroyed flaggable");
        Ok(removed)
    }
}
