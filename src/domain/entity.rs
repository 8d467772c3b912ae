use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A host entity that can take part in flagging.
///
/// `TYPE_NAME` is what gets stored in the `*_type` columns, so it must stay
/// stable once rows exist.
pub trait Entity: Sized + Send + Sync {
    const TYPE_NAME: &'static str;

    fn id(&self) -> Uuid;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::TYPE_NAME, self.id())
    }
}

/// Polymorphic reference: a stored type name plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }

    pub fn of<T: Entity>(entity: &T) -> Self {
        entity.entity_ref()
    }

    pub fn is<T: Entity>(&self) -> bool {
        self.entity_type == T::TYPE_NAME
    }

    /// Resolve to `T`'s id when this reference points at a `T`.
    pub fn id_for<T: Entity>(&self) -> Option<Uuid> {
        self.is::<T>().then_some(self.id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}
