//! Named flags ("spam", "favorite", ...) that flagger entities put on
//! flaggable entities, backed by a `flaggings` table.
//!
//! ```ignore
//! let registry = FlagRegistry::builder()
//!     .flaggable::<Article, _, _>(["spam", "favorite"])
//!     .flagger::<User>()
//!     .build()?;
//! let flags = FlagService::new(registry, PgFlaggingStore::new(db));
//!
//! user.flag(&flags, &article, "spam").await?;
//! assert!(article.is_flagged(&flags, Some("spam")).await?);
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;

pub use crate::app::{FlagService, Flaggable, Flagger};
pub use crate::config::{AppConfig, CounterCache, FlagRegistry, FlaggableDeclaration};
pub use crate::domain::entity::{Entity, EntityRef};
pub use crate::domain::flagging::{Flagging, FlaggingFilter, NewFlagging};
pub use crate::error::{FlagError, Result};
pub use crate::infra::db::Db;
pub use crate::infra::memory_store::MemoryFlaggingStore;
pub use crate::infra::pg_store::PgFlaggingStore;
pub use crate::infra::store::FlaggingStore;
