#![allow(dead_code)]

use sqlx::PgPool;
use std::sync::Once;
use tokio::sync::OnceCell;
use uuid::Uuid;

use flaggable::{
    AppConfig, Db, Entity, EntityRef, FlagRegistry, FlagService, Flaggable, FlaggableDeclaration, Flagger,
    MemoryFlaggingStore, PgFlaggingStore,
};

// ---------------------------------------------------------------------------
// Fixture entities
// ---------------------------------------------------------------------------

pub const ARTICLE_FLAGS: [&str; 2] = ["favorite", "inappropriate"];

/// Flaggable with a counter cache on `test_articles.flaggings_count`.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: Uuid,
    pub name: String,
}

impl Article {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }
}

impl Entity for Article {
    const TYPE_NAME: &'static str = "Article";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Flaggable for Article {}

/// Flaggable without a counter cache.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
}

impl Comment {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Entity for Comment {
    const TYPE_NAME: &'static str = "Comment";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Flaggable for Comment {}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }
}

impl Entity for User {
    const TYPE_NAME: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Flagger for User {}

/// Implements `Flaggable` but is never declared in the registry.
#[derive(Debug, Clone)]
pub struct Draft {
    pub id: Uuid,
}

impl Draft {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Entity for Draft {
    const TYPE_NAME: &'static str = "Draft";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Flaggable for Draft {}

/// Implements `Flagger` but is never declared in the registry.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: Uuid,
}

impl Bot {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Entity for Bot {
    const TYPE_NAME: &'static str = "Bot";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Flagger for Bot {}

// ---------------------------------------------------------------------------
// Registry and services
// ---------------------------------------------------------------------------

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn registry() -> FlagRegistry {
    FlagRegistry::builder()
        .declare(
            FlaggableDeclaration::new(Article::TYPE_NAME, ARTICLE_FLAGS)
                .and_then(|declaration| declaration.with_default_counter_cache("test_articles"))
                .expect("valid Article declaration"),
        )
        .flaggable::<Comment, _, _>(["spam"])
        .flagger::<User>()
        .build()
        .expect("valid registry")
}

pub fn memory_service() -> FlagService<MemoryFlaggingStore> {
    init_tracing();
    FlagService::new(registry(), MemoryFlaggingStore::new())
}

/// Memory counterpart of `insert_article`: creates the counter cache row.
pub async fn create_article_row(flags: &FlagService<MemoryFlaggingStore>, article: &Article) {
    flags
        .store()
        .create_counter_row(&EntityRef::of(article))
        .await;
}

// ---------------------------------------------------------------------------
// Postgres — schema set up once per test binary, skipped without a database
// ---------------------------------------------------------------------------

static PG_SCHEMA: OnceCell<()> = OnceCell::const_new();

fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

async fn setup_schema(database_url: &str) {
    let pool = PgPool::connect(database_url)
        .await
        .expect("cannot connect to test database");

    let mut migration_files: Vec<_> = std::fs::read_dir("migrations")
        .expect("cannot read migrations/")
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "sql"))
        .collect();
    migration_files.sort_by_key(|e| e.file_name());

    for entry in &migration_files {
        let sql = std::fs::read_to_string(entry.path())
            .unwrap_or_else(|_| panic!("cannot read {:?}", entry.path()));
        sqlx::raw_sql(&sql)
            .execute(&pool)
            .await
            .unwrap_or_else(|e| panic!("migration {:?} failed: {}", entry.file_name(), e));
    }

    // Host table owning the Article counter cache.
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS test_articles ( \
             id UUID PRIMARY KEY, \
             name TEXT NOT NULL, \
             flaggings_count BIGINT NOT NULL DEFAULT 0 \
         )",
    )
    .execute(&pool)
    .await
    .expect("failed to create test_articles");

    pool.close().await;
}

/// A service over a fresh pool, or `None` when `TEST_DATABASE_URL` is unset.
///
/// Each #[tokio::test] has its own runtime, so pools are never shared
/// between tests; only the schema setup is.
pub async fn pg_service() -> Option<(FlagService<PgFlaggingStore>, PgPool)> {
    let Some(database_url) = test_database_url() else {
        eprintln!("TEST_DATABASE_URL not set, skipping postgres test");
        return None;
    };
    init_tracing();

    PG_SCHEMA
        .get_or_init(|| async { setup_schema(&database_url).await })
        .await;

    // Same code path as production: AppConfig, then Db::connect.
    let config = AppConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.clone()),
        "DB_MAX_CONNECTIONS" => Some("2".to_string()),
        "DB_CONNECT_TIMEOUT_SECONDS" => Some("30".to_string()),
        _ => None,
    })
    .expect("failed to build AppConfig");
    let db = Db::connect(&config).await.expect("Db::connect failed");

    let pool = db.pool().clone();
    let store = PgFlaggingStore::new(db);
    Some((FlagService::new(registry(), store), pool))
}

pub async fn insert_article(pool: &PgPool, article: &Article) {
    sqlx::query("INSERT INTO test_articles (id, name) VALUES ($1, $2)")
        .bind(article.id)
        .bind(&article.name)
        .execute(pool)
        .await
        .expect("failed to insert test article");
}
