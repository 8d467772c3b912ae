use async_trait::async_trait;

use crate::app::{present, triple_filter, FlagService, Flaggable};
use crate::domain::entity::Entity;
use crate::domain::flagging::{Flagging, FlaggingFilter, NewFlagging};
use crate::error::{FlagError, Result};
use crate::infra::store::FlaggingStore;

/// An entity that flags flaggables. Methods forward to [`FlagService`].
#[async_trait]
pub trait Flagger: Entity {
    async fn flag<S, T>(&self, flags: &FlagService<S>, flaggable: &T, flag: &str) -> Result<Flagging>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.flag(self, flaggable, flag).await
    }

    async fn ensure_flagged<S, T>(
        &self,
        flags: &FlagService<S>,
        flaggable: &T,
        flag: &str,
    ) -> Result<Option<Flagging>>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.ensure_flagged(self, flaggable, flag).await
    }

    async fn unflag<S, T>(&self, flags: &FlagService<S>, flaggable: &T, flag: &str) -> Result<u64>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.unflag(self, flaggable, flag).await
    }

    async fn ensure_unflagged<S, T>(
        &self,
        flags: &FlagService<S>,
        flaggable: &T,
        flag: &str,
    ) -> Result<bool>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.ensure_unflagged(self, flaggable, flag).await
    }

    async fn toggle_flag<S, T>(
        &self,
        flags: &FlagService<S>,
        flaggable: &T,
        flag: &str,
    ) -> Result<bool>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.toggle_flag(self, flaggable, flag).await
    }

    async fn has_flagged<S, T>(
        &self,
        flags: &FlagService<S>,
        flaggable: &T,
        flag: Option<&str>,
    ) -> Result<bool>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.has_flagged(self, flaggable, flag).await
    }

    async fn find_last_flag_for<S, T>(
        &self,
        flags: &FlagService<S>,
        flaggable: &T,
        flag: Option<&str>,
    ) -> Result<Option<Flagging>>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.find_last_flag_for(self, flaggable, flag).await
    }

    async fn find_all_flags_for<S, T>(
        &self,
        flags: &FlagService<S>,
        flaggable: &T,
        flag: Option<&str>,
    ) -> Result<Vec<Flagging>>
    where
        S: FlaggingStore,
        T: Flaggable,
    {
        flags.find_all_flags_for(self, flaggable, flag).await
    }

    async fn flags<S>(&self, flags: &FlagService<S>, filter: FlaggingFilter) -> Result<Vec<Flagging>>
    where
        S: FlaggingStore,
    {
        flags.flags_by(self, filter).await
    }
}

impl<S: FlaggingStore> FlagService<S> {
    pub fn is_flagger_type<F: Flagger>(&self) -> bool {
        self.registry.is_flagger_type(F::TYPE_NAME)
    }

    /// Fails with `AlreadyFlagged` when this flagger already has the flag on
    /// `flaggable`, ignored rows included. The check and the insert are
    /// separate statements, so concurrent calls can both insert.
    pub async fn flag<F, T>(&self, flagger: &F, flaggable: &T, flag: &str) -> Result<Flagging>
    where
        F: Flagger,
        T: Flaggable,
    {
        self.check_flagger::<F>()?;
        self.check_flaggable::<T>(Some(flag))?;

        if self
            .store
            .exists(&triple_filter(flagger, flaggable, Some(flag)))
            .await?
        {
            return Err(FlagError::AlreadyFlagged);
        }

        let flagging = self
            .store
            .insert(
                &self.registry,
                NewFlagging {
                    flagger: flagger.entity_ref(),
                    flaggable: flaggable.entity_ref(),
                    flag: flag.to_string(),
                },
            )
            .await?;

        tracing::debug!(
            flagging_id = %flagging.id,
            flagger = %flagger.entity_ref(),
            flaggable = %flaggable.entity_ref(),
            flag,
            "flag created"
        );
        Ok(flagging)
    }

    /// Like [`flag`](Self::flag), but an existing flag is not an error.
    /// Returns the new row, or `None` when nothing was created.
    pub async fn ensure_flagged<F, T>(
        &self,
        flagger: &F,
        flaggable: &T,
        flag: &str,
    ) -> Result<Option<Flagging>>
    where
        F: Flagger,
        T: Flaggable,
    {
        match self.flag(flagger, flaggable, flag).await {
            Ok(flagging) => Ok(Some(flagging)),
            Err(FlagError::AlreadyFlagged) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Remove this flagger's `flag` from `flaggable`, failing with
    /// `NotFlagged` when there is nothing to remove. Returns how many rows
    /// were deleted.
    pub async fn unflag<F, T>(&self, flagger: &F, flaggable: &T, flag: &str) -> Result<u64>
    where
        F: Flagger,
        T: Flaggable,
    {
        self.check_flagger::<F>()?;
        self.check_flaggable::<T>(Some(flag))?;

        let removed = self
            .store
            .delete(&self.registry, &triple_filter(flagger, flaggable, Some(flag)))
            .await?;
        if removed == 0 {
            return Err(FlagError::NotFlagged);
        }

        tracing::debug!(
            flagger = %flagger.entity_ref(),
            flaggable = %flaggable.entity_ref(),
            flag,
            removed,
            "flag removed"
        );
        Ok(removed)
    }

    /// Like [`unflag`](Self::unflag), but returns `false` instead of failing
    /// when there was nothing to remove.
    pub async fn ensure_unflagged<F, T>(&self, flagger: &F, flaggable: &T, flag: &str) -> Result<bool>
    where
        F: Flagger,
        T: Flaggable,
    {
        match self.unflag(flagger, flaggable, flag).await {
            Ok(_) => Ok(true),
            Err(FlagError::NotFlagged) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn toggle_flag<F, T>(&self, flagger: &F, flaggable: &T, flag: &str) -> Result<bool>
    where
        F: Flagger,
        T: Flaggable,
    {
        if self.has_flagged(flagger, flaggable, Some(flag)).await? {
            self.ensure_unflagged(flagger, flaggable, flag).await?;
        } else {
            self.ensure_flagged(flagger, flaggable, flag).await?;
        }
        self.has_flagged(flagger, flaggable, Some(flag)).await
    }

    pub async fn has_flagged<F, T>(
        &self,
        flagger: &F,
        flaggable: &T,
        flag: Option<&str>,
    ) -> Result<bool>
    where
        F: Flagger,
        T: Flaggable,
    {
        let flag = present(flag);
        self.check_flagger::<F>()?;
        self.check_flaggable::<T>(flag)?;
        self.store
            .exists(&triple_filter(flagger, flaggable, flag))
            .await
    }

    pub async fn find_last_flag_for<F, T>(
        &self,
        flagger: &F,
        flaggable: &T,
        flag: Option<&str>,
    ) -> Result<Option<Flagging>>
    where
        F: Flagger,
        T: Flaggable,
    {
        let flaggings = self.find_all_flags_for(flagger, flaggable, flag).await?;
        Ok(flaggings.into_iter().next())
    }

    pub async fn find_all_flags_for<F, T>(
        &self,
        flagger: &F,
        flaggable: &T,
        flag: Option<&str>,
    ) -> Result<Vec<Flagging>>
    where
        F: Flagger,
        T: Flaggable,
    {
        let flag = present(flag);
        self.check_flagger::<F>()?;
        self.check_flaggable::<T>(flag)?;
        self.store
            .find(&triple_filter(flagger, flaggable, flag))
            .await
    }

    /// All rows created by `flagger` that also match `filter`, newest first.
    /// Any flagger set on `filter` is replaced.
    pub async fn flags_by<F: Flagger>(
        &self,
        flagger: &F,
        filter: FlaggingFilter,
    ) -> Result<Vec<Flagging>> {
        self.check_flagger::<F>()?;
        self.store
            .find(&filter.by_flagger(flagger.entity_ref()))
            .await
    }

    /// Delete every row referencing `flagger`. Call this from the host's
    /// deletion path for the flagger entity.
    pub async fn destroy_flagger<F: Flagger>(&self, flagger: &F) -> Result<u64> {
        let reference = flagger.entity_ref();
        let removed = self
            .store
            .delete_referencing(&self.registry, &reference)
            .await?;
        tracing::info!(flagger = %reference, removed, "removed flaggings for destroyed flagger");
        Ok(removed)
    }
}
