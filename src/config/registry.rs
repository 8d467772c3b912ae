use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::app::{Flaggable, Flagger};
use crate::error::{FlagError, Result};

pub const DEFAULT_COUNTER_COLUMN: &str = "flaggings_count";

/// Host table and integer column holding a flaggable's active flag count.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CounterCache {
    pub table: String,
    #[serde(default = "default_counter_column")]
    pub column: String,
}

fn default_counter_column() -> String {
    DEFAULT_COUNTER_COLUMN.to_string()
}

impl CounterCache {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Result<Self> {
        let cache = Self {
            table: table.into(),
            column: column.into(),
        };
        cache.validate()?;
        Ok(cache)
    }

    // Both names are spliced into SQL, so only plain identifiers pass.
    fn validate(&self) -> Result<()> {
        for ident in [&self.table, &self.column] {
            if !is_plain_identifier(ident) {
                return Err(FlagError::InvalidDeclaration(format!(
                    "{:?} is not a valid SQL identifier",
                    ident
                )));
            }
        }
        Ok(())
    }
}

fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A flaggable type together with its vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggableDeclaration {
    type_name: String,
    flags: BTreeSet<String>,
    counter_cache: Option<CounterCache>,
}

impl FlaggableDeclaration {
    pub fn new<I, S>(type_name: impl Into<String>, flags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let type_name = type_name.into();
        let flags: BTreeSet<String> = flags.into_iter().map(Into::into).collect();
        if flags.is_empty() {
            return Err(FlagError::MissingFlags {
                flaggable_type: type_name,
            });
        }
        if flags.iter().any(|flag| flag.trim().is_empty()) {
            return Err(FlagError::InvalidDeclaration(format!(
                "{} declares a blank flag name",
                type_name
            )));
        }
        Ok(Self {
            type_name,
            flags,
            counter_cache: None,
        })
    }

    pub fn with_counter_cache(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Result<Self> {
        self.counter_cache = Some(CounterCache::new(table, column)?);
        Ok(self)
    }

    pub fn with_default_counter_cache(self, table: impl Into<String>) -> Result<Self> {
        self.with_counter_cache(table, DEFAULT_COUNTER_COLUMN)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn available_flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    pub fn allows(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn counter_cache(&self) -> Option<&CounterCache> {
        self.counter_cache.as_ref()
    }
}

/// Which host types may flag and be flagged, and with which flags.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct FlagRegistry {
    flaggables: HashMap<String, FlaggableDeclaration>,
    flaggers: HashSet<String>,
}

impl FlagRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Parse a registry from a JSON document:
    ///
    /// ```json
    /// {
    ///   "flaggables": [
    ///     {"type": "Article", "flags": ["spam", "favorite"],
    ///      "counter_cache": {"table": "articles"}}
    ///   ],
    ///   "flaggers": ["User"]
    /// }
    /// ```
    pub fn from_json(document: &str) -> Result<Self> {
        let document: RegistryDocument = serde_json::from_str(document)?;
        let mut builder = Self::builder();
        for entry in document.flaggables {
            let declaration = FlaggableDeclaration::new(entry.type_name, entry.flags).and_then(
                |declaration| match entry.counter_cache {
                    Some(cache) => {
                        cache.validate()?;
                        Ok(FlaggableDeclaration {
                            counter_cache: Some(cache),
                            ..declaration
                        })
                    }
                    None => Ok(declaration),
                },
            );
            builder = builder.declare_result(declaration);
        }
        for flagger in document.flaggers {
            builder = builder.flagger_named(flagger);
        }
        builder.build()
    }

    pub fn is_flaggable_type(&self, type_name: &str) -> bool {
        self.flaggables.contains_key(type_name)
    }

    pub fn is_flagger_type(&self, type_name: &str) -> bool {
        self.flaggers.contains(type_name)
    }

    pub fn declaration(&self, type_name: &str) -> Option<&FlaggableDeclaration> {
        self.flaggables.get(type_name)
    }

    pub fn available_flags(&self, type_name: &str) -> Option<&BTreeSet<String>> {
        self.declaration(type_name)
            .map(FlaggableDeclaration::available_flags)
    }

    pub fn counter_cache(&self, type_name: &str) -> Option<&CounterCache> {
        self.declaration(type_name)
            .and_then(FlaggableDeclaration::counter_cache)
    }

    pub fn flaggable_types(&self) -> impl Iterator<Item = &str> {
        self.flaggables.keys().map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: FlagRegistry,
    error: Option<FlagError>,
}

impl RegistryBuilder {
    /// Declare `T` flaggable with the given vocabulary.
    pub fn flaggable<T, I, S>(self, flags: I) -> Self
    where
        T: Flaggable,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare_result(FlaggableDeclaration::new(T::TYPE_NAME, flags))
    }

    pub fn declare(self, declaration: FlaggableDeclaration) -> Self {
        self.declare_result(Ok(declaration))
    }

    /// Record a declaration that may have failed; the first failure is
    /// reported by `build`.
    pub fn declare_result(mut self, declaration: Result<FlaggableDeclaration>) -> Self {
        match declaration {
            Ok(declaration) => {
                self.registry
                    .flaggables
                    .insert(declaration.type_name.clone(), declaration);
            }
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
            }
        }
        self
    }

    pub fn flagger<T: Flagger>(self) -> Self {
        self.flagger_named(T::TYPE_NAME)
    }

    pub fn flagger_named(mut self, type_name: impl Into<String>) -> Self {
        self.registry.flaggers.insert(type_name.into());
        self
    }

    pub fn build(self) -> Result<FlagRegistry> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.registry),
        }
    }
}

#[derive(Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    flaggables: Vec<FlaggableEntry>,
    #[serde(default)]
    flaggers: Vec<String>,
}

#[derive(Deserialize)]
struct FlaggableEntry {
    #[serde(rename = "type")]
    type_name: String,
    flags: Vec<String>,
    counter_cache: Option<CounterCache>,
}
