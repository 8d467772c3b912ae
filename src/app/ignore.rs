use crate::app::FlagService;
use crate::domain::flagging::{Flagging, FlaggingFilter};
use crate::error::{FlagError, Result};
use crate::infra::store::FlaggingStore;

impl<S: FlaggingStore> FlagService<S> {
    /// Mark the row ignored and drop it from its flaggable's counter, in one
    /// transaction. Already-ignored rows come back unchanged.
    pub async fn ignore(&self, flagging: &Flagging) -> Result<Flagging> {
        self.set_ignored(flagging, true).await
    }

    /// Reverse of [`ignore`](Self::ignore).
    pub async fn unignore(&self, flagging: &Flagging) -> Result<Flagging> {
        self.set_ignored(flagging, false).await
    }

    /// Ignore every active row matching `filter` (all rows when `None`).
    ///
    /// Each row is its own transaction; an error leaves earlier rows
    /// ignored. Returns how many rows changed state.
    pub async fn ignore_all(&self, filter: Option<&FlaggingFilter>) -> Result<u64> {
        let filter = filter.cloned().unwrap_or_default().ignored(false);
        let candidates = self.store.find(&filter).await?;

        let mut ignored = 0;
        for flagging in &candidates {
            if self
                .store
                .set_ignored(&self.registry, flagging.id, true)
                .await?
                .is_some()
            {
                ignored += 1;
            }
        }

        tracing::info!(matched = candidates.len(), ignored, "ignored flaggings");
        Ok(ignored)
    }

    async fn set_ignored(&self, flagging: &Flagging, ignored: bool) -> Result<Flagging> {
        match self
            .store
            .set_ignored(&self.registry, flagging.id, ignored)
            .await?
        {
            Some(updated) => {
                tracing::debug!(
                    flagging_id = %updated.id,
                    flaggable = %updated.flaggable(),
                    ignored,
                    "flagging state changed"
                );
                Ok(updated)
            }
            None => self
                .store
                .get(flagging.id)
                .await?
                .ok_or(FlagError::FlaggingNotFound(flagging.id)),
        }
    }
}
