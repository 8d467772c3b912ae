//! Postgres Store Tests
//!
//! Runs the flag lifecycle against a real database. Skipped unless
//! TEST_DATABASE_URL points at a Postgres instance.

mod common;

use common::{insert_article, pg_service, Article, Comment, User};
use flaggable::{FlagError, Flaggable, Flagger, FlaggingFilter, PgFlaggingStore};

#[tokio::test]
async fn favorite_round_trip() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let user = User::new("F");
    let article = Article::new("A");
    insert_article(&pool, &article).await;

    user.flag(&flags, &article, "favorite").await.unwrap();
    assert!(user
        .has_flagged(&flags, &article, Some("favorite"))
        .await
        .unwrap());
    assert!(matches!(
        user.flag(&flags, &article, "favorite").await.unwrap_err(),
        FlagError::AlreadyFlagged
    ));

    assert_eq!(user.unflag(&flags, &article, "favorite").await.unwrap(), 1);
    assert!(!user
        .has_flagged(&flags, &article, Some("favorite"))
        .await
        .unwrap());
    assert!(matches!(
        user.unflag(&flags, &article, "favorite").await.unwrap_err(),
        FlagError::NotFlagged
    ));
}

#[tokio::test]
async fn queries_order_newest_first() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let user = User::new("Flagger 1");
    let article = Article::new("Flaggable 1");
    insert_article(&pool, &article).await;

    user.flag(&flags, &article, "favorite").await.unwrap();
    user.flag(&flags, &article, "inappropriate").await.unwrap();

    let last = user
        .find_last_flag_for(&flags, &article, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.flag, "inappropriate");

    let all = user
        .find_all_flags_for(&flags, &article, None)
        .await
        .unwrap();
    let names: Vec<&str> = all.iter().map(|flagging| flagging.flag.as_str()).collect();
    assert_eq!(names, vec!["inappropriate", "favorite"]);

    let favorites = user
        .flags(&flags, FlaggingFilter::new().with_flag("favorite"))
        .await
        .unwrap();
    assert_eq!(favorites.len(), 1);
    assert!(article.is_flagged(&flags, Some("favorite")).await.unwrap());
}

#[tokio::test]
async fn toggle_flag_round_trip() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let user = User::new("Flagger 1");
    let article = Article::new("Flaggable 1");
    insert_article(&pool, &article).await;

    assert!(user
        .toggle_flag(&flags, &article, "inappropriate")
        .await
        .unwrap());
    assert!(!user
        .toggle_flag(&flags, &article, "inappropriate")
        .await
        .unwrap());
    assert!(article.flaggings(&flags).await.unwrap().is_empty());
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(0));
}

#[tokio::test]
async fn counter_cache_tracks_active_rows() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let first = User::new("Flagger 1");
    let second = User::new("Flagger 2");
    let article = Article::new("Flaggable 1");
    insert_article(&pool, &article).await;

    let flagging = first.flag(&flags, &article, "inappropriate").await.unwrap();
    second.flag(&flags, &article, "inappropriate").await.unwrap();
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(2));

    let ignored = flags.ignore(&flagging).await.unwrap();
    assert!(ignored.ignored);
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(1));

    // No second decrement for a row that is already ignored.
    flags.ignore(&flagging).await.unwrap();
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(1));

    flags.unignore(&flagging).await.unwrap();
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(2));

    let filter = FlaggingFilter::new().with_flaggable(flaggable::EntityRef::of(&article));
    assert_eq!(flags.ignore_all(Some(&filter)).await.unwrap(), 2);
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(0));

    // Deleting ignored rows leaves the counter alone.
    first.unflag(&flags, &article, "inappropriate").await.unwrap();
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(0));
}

#[tokio::test]
async fn counter_cache_is_optional() {
    let Some((flags, _pool)) = pg_service().await else {
        return;
    };
    let user = User::new("Flagger 1");
    let comment = Comment::new();

    user.flag(&flags, &comment, "spam").await.unwrap();
    assert_eq!(comment.flaggings_count(&flags).await.unwrap(), None);
    assert!(comment.is_flagged(&flags, None).await.unwrap());
}

#[tokio::test]
async fn destroying_entities_cascades() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let first = User::new("Flagger 1");
    let second = User::new("Flagger 2");
    let article = Article::new("Flaggable 1");
    let other = Article::new("Flaggable 2");
    insert_article(&pool, &article).await;
    insert_article(&pool, &other).await;

    first.flag(&flags, &article, "inappropriate").await.unwrap();
    second.flag(&flags, &article, "inappropriate").await.unwrap();
    first.flag(&flags, &other, "favorite").await.unwrap();

    assert_eq!(flags.destroy_flagger(&first).await.unwrap(), 2);
    let remaining = article.flaggings(&flags).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].flagger_id_for::<User>(), Some(second.id));
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(1));
    assert_eq!(other.flaggings_count(&flags).await.unwrap(), Some(0));

    assert_eq!(flags.destroy_flaggable(&article).await.unwrap(), 1);
    assert!(second
        .flags(&flags, FlaggingFilter::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn cascade_runs_inside_host_transaction() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let user = User::new("Flagger 1");
    let article = Article::new("Flaggable 1");
    insert_article(&pool, &article).await;
    user.flag(&flags, &article, "favorite").await.unwrap();

    let reference = flaggable::EntityRef::of(&article);

    // Rolled back: the flagging survives.
    let mut tx = pool.begin().await.unwrap();
    let removed = PgFlaggingStore::delete_referencing_in(&mut tx, flags.registry(), &reference)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    tx.rollback().await.unwrap();
    assert!(article.is_flagged(&flags, None).await.unwrap());

    // Committed together with the host row delete.
    let mut tx = pool.begin().await.unwrap();
    PgFlaggingStore::delete_referencing_in(&mut tx, flags.registry(), &reference)
        .await
        .unwrap();
    sqlx::query("DELETE FROM test_articles WHERE id = $1")
        .bind(article.id)
        .execute(&mut *tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(!article.is_flagged(&flags, None).await.unwrap());
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), None);
}

#[tokio::test]
async fn equal_timestamps_order_by_insertion() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let user = User::new("Flagger 1");
    let article = Article::new("Flaggable 1");
    insert_article(&pool, &article).await;

    // Two rows written with the same created_at, bypassing clock_timestamp().
    let created_at = time::OffsetDateTime::now_utc();
    let mut inserted = Vec::new();
    for flag in ["favorite", "inappropriate"] {
        let id: uuid::Uuid = sqlx::query_scalar(
            "INSERT INTO flaggings \
                 (flagger_type, flagger_id, flaggable_type, flaggable_id, flag, created_at) \
             VALUES ('User', $1, 'Article', $2, $3, $4) \
             RETURNING id",
        )
        .bind(user.id)
        .bind(article.id)
        .bind(flag)
        .bind(created_at)
        .fetch_one(&pool)
        .await
        .unwrap();
        inserted.push(id);
    }

    let last = user
        .find_last_flag_for(&flags, &article, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.id, inserted[1]);

    let all = user
        .find_all_flags_for(&flags, &article, None)
        .await
        .unwrap();
    let ids: Vec<uuid::Uuid> = all.iter().map(|flagging| flagging.id).collect();
    assert_eq!(ids, vec![inserted[1], inserted[0]]);
}

#[tokio::test]
async fn flagging_again_after_ignore_is_already_flagged() {
    let Some((flags, pool)) = pg_service().await else {
        return;
    };
    let user = User::new("Flagger 1");
    let article = Article::new("Flaggable 1");
    insert_article(&pool, &article).await;

    let flagging = user.flag(&flags, &article, "inappropriate").await.unwrap();
    flags.ignore(&flagging).await.unwrap();

    assert!(matches!(
        user.flag(&flags, &article, "inappropriate").await.unwrap_err(),
        FlagError::AlreadyFlagged
    ));
    assert_eq!(article.flaggings(&flags).await.unwrap().len(), 1);
    assert_eq!(article.flaggings_count(&flags).await.unwrap(), Some(0));
}
