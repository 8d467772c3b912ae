pub mod flaggable;
pub mod flagger;
pub mod ignore;

use std::sync::Arc;

use crate::config::FlagRegistry;
use crate::domain::entity::Entity;
use crate::domain::flagging::FlaggingFilter;
use crate::error::{FlagError, Result};
use crate::infra::store::FlaggingStore;

pub use flaggable::Flaggable;
pub use flagger::Flagger;

/// Flagging operations over a registry and a store.
pub struct FlagService<S> {
    registry: Arc<FlagRegistry>,
    store: Arc<S>,
}

impl<S> Clone for FlagService<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: FlaggingStore> FlagService<S> {
    pub fn new(registry: impl Into<Arc<FlagRegistry>>, store: S) -> Self {
        Self {
            registry: registry.into(),
            store: Arc::new(store),
        }
    }

    pub fn registry(&self) -> &FlagRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn check_flagger<F: Flagger>(&self) -> Result<()> {
        if !self.registry.is_flagger_type(F::TYPE_NAME) {
            return Err(FlagError::InvalidFlagger {
                flagger_type: F::TYPE_NAME.to_string(),
            });
        }
        Ok(())
    }

    /// Reject undeclared flaggable types and, when given, flags outside the
    /// type's vocabulary.
    fn check_flaggable<T: Flaggable>(&self, flag: Option<&str>) -> Result<()> {
        let Some(declaration) = self.registry.declaration(T::TYPE_NAME) else {
            return Err(FlagError::InvalidFlaggable {
                flaggable_type: T::TYPE_NAME.to_string(),
            });
        };
        if let Some(flag) = flag {
            if !declaration.allows(flag) {
                return Err(FlagError::InvalidFlag {
                    flag: flag.to_string(),
                    flaggable_type: T::TYPE_NAME.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// An optional flag argument given as an empty string means "any flag".
fn present(flag: Option<&str>) -> Option<&str> {
    flag.filter(|flag| !flag.is_empty())
}

fn triple_filter<F: Entity, T: Entity>(
    flagger: &F,
    flaggable: &T,
    flag: Option<&str>,
) -> FlaggingFilter {
    let filter = FlaggingFilter::new()
        .by_flagger(flagger.entity_ref())
        .with_flaggable(flaggable.entity_ref());
    match flag {
        Some(flag) => filter.with_flag(flag),
        None => filter,
    }
}
