use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entity::{Entity, EntityRef};

/// One flagger having applied one named flag to one flaggable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flagging {
    pub id: Uuid,
    pub flagger_type: String,
    pub flagger_id: Uuid,
    pub flaggable_type: String,
    pub flaggable_id: Uuid,
    pub flag: String,
    pub ignored: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Flagging {
    pub fn flagger(&self) -> EntityRef {
        EntityRef::new(self.flagger_type.clone(), self.flagger_id)
    }

    pub fn flaggable(&self) -> EntityRef {
        EntityRef::new(self.flaggable_type.clone(), self.flaggable_id)
    }

    pub fn flagger_id_for<T: Entity>(&self) -> Option<Uuid> {
        (self.flagger_type == T::TYPE_NAME).then_some(self.flagger_id)
    }

    pub fn flaggable_id_for<T: Entity>(&self) -> Option<Uuid> {
        (self.flaggable_type == T::TYPE_NAME).then_some(self.flaggable_id)
    }

    pub fn is_active(&self) -> bool {
        !self.ignored
    }
}

/// Payload for a row about to be created. New rows always start active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFlagging {
    pub flagger: EntityRef,
    pub flaggable: EntityRef,
    pub flag: String,
}

/// Equality filter over the `flaggings` table. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlaggingFilter {
    pub flagger: Option<EntityRef>,
    pub flaggable: Option<EntityRef>,
    pub flag: Option<String>,
    pub ignored: Option<bool>,
}

impl FlaggingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_flagger(mut self, flagger: EntityRef) -> Self {
        self.flagger = Some(flagger);
        self
    }

    pub fn with_flaggable(mut self, flaggable: EntityRef) -> Self {
        self.flaggable = Some(flaggable);
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    pub fn ignored(mut self, ignored: bool) -> Self {
        self.ignored = Some(ignored);
        self
    }

    pub fn matches(&self, flagging: &Flagging) -> bool {
        if let Some(flagger) = &self.flagger {
            if flagging.flagger_type != flagger.entity_type || flagging.flagger_id != flagger.id {
                return false;
            }
        }
        if let Some(flaggable) = &self.flaggable {
            if flagging.flaggable_type != flaggable.entity_type
                || flagging.flaggable_id != flaggable.id
            {
                return false;
            }
        }
        if let Some(flag) = &self.flag {
            if &flagging.flag != flag {
                return false;
            }
        }
        if let Some(ignored) = self.ignored {
            if flagging.ignored != ignored {
                return false;
            }
        }
        true
    }
}
