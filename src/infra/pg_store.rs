use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::FlagRegistry;
use crate::domain::entity::EntityRef;
use crate::domain::flagging::{Flagging, FlaggingFilter, NewFlagging};
use crate::error::Result;
use crate::infra::db::Db;
use crate::infra::store::FlaggingStore;

const FLAGGING_COLUMNS: &str =
    "id, flagger_type, flagger_id, flaggable_type, flaggable_id, flag, ignored, created_at";

/// `flaggings` table in Postgres. See `migrations/` for the schema.
#[derive(Clone)]
pub struct PgFlaggingStore {
    db: Db,
}

impl PgFlaggingStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Remove every row referencing `reference` on the caller's connection,
    /// so the host can run it inside the transaction that deletes the entity.
    pub async fn delete_referencing_in(
        conn: &mut PgConnection,
        registry: &FlagRegistry,
        reference: &EntityRef,
    ) -> Result<u64> {
        let rows = sqlx::query(
            "DELETE FROM flaggings \
             WHERE (flagger_type = $1 AND flagger_id = $2) \
                OR (flaggable_type = $1 AND flaggable_id = $2) \
             RETURNING flaggable_type, flaggable_id, ignored",
        )
        .bind(&reference.entity_type)
        .bind(reference.id)
        .fetch_all(&mut *conn)
        .await?;

        let removed = rows.len() as u64;
        decrement_for_deleted(conn, registry, &rows).await?;
        Ok(removed)
    }
}

fn flagging_from_row(row: &PgRow) -> Flagging {
    Flagging {
        id: row.get("id"),
        flagger_type: row.get("flagger_type"),
        flagger_id: row.get("flagger_id"),
        flaggable_type: row.get("flaggable_type"),
        flaggable_id: row.get("flaggable_id"),
        flag: row.get("flag"),
        ignored: row.get("ignored"),
        created_at: row.get("created_at"),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &FlaggingFilter) {
    builder.push(" WHERE TRUE");
    if let Some(flagger) = &filter.flagger {
        builder
            .push(" AND flagger_type = ")
            .push_bind(flagger.entity_type.clone())
            .push(" AND flagger_id = ")
            .push_bind(flagger.id);
    }
    if let Some(flaggable) = &filter.flaggable {
        builder
            .push(" AND flaggable_type = ")
            .push_bind(flaggable.entity_type.clone())
            .push(" AND flaggable_id = ")
            .push_bind(flaggable.id);
    }
    if let Some(flag) = &filter.flag {
        builder.push(" AND flag = ").push_bind(flag.clone());
    }
    if let Some(ignored) = filter.ignored {
        builder.push(" AND ignored = ").push_bind(ignored);
    }
}

async fn adjust_counter(
    conn: &mut PgConnection,
    registry: &FlagRegistry,
    flaggable: &EntityRef,
    delta: i64,
) -> Result<()> {
    let Some(cache) = registry.counter_cache(&flaggable.entity_type) else {
        return Ok(());
    };

    // Identifiers were validated when the registry was built.
    let sql = format!(
        "UPDATE {table} SET {column} = {column} + $1 WHERE id = $2",
        table = cache.table,
        column = cache.column,
    );
    let result = sqlx::query(&sql)
        .bind(delta)
        .bind(flaggable.id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(
            flaggable = %flaggable,
            table = %cache.table,
            "counter cache row not found"
        );
    }
    Ok(())
}

/// Rows are `RETURNING flaggable_type, flaggable_id, ignored` from a delete.
async fn decrement_for_deleted(
    conn: &mut PgConnection,
    registry: &FlagRegistry,
    rows: &[PgRow],
) -> Result<()> {
    let mut deltas: HashMap<EntityRef, i64> = HashMap::new();
    for row in rows {
        let ignored: bool = row.get("ignored");
        if ignored {
            continue;
        }
        let flaggable = EntityRef::new(
            row.get::<String, _>("flaggable_type"),
            row.get::<Uuid, _>("flaggable_id"),
        );
        *deltas.entry(flaggable).or_insert(0) -= 1;
    }

    for (flaggable, delta) in deltas {
        adjust_counter(conn, registry, &flaggable, delta).await?;
    }
    Ok(())
}

#[async_trait]
impl FlaggingStore for PgFlaggingStore {
    async fn insert(&self, registry: &FlagRegistry, new: NewFlagging) -> Result<Flagging> {
        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(&format!(
            "INSERT INTO flaggings (flagger_type, flagger_id, flaggable_type, flaggable_id, flag) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {}",
            FLAGGING_COLUMNS
        ))
        .bind(&new.flagger.entity_type)
        .bind(new.flagger.id)
        .bind(&new.flaggable.entity_type)
        .bind(new.flaggable.id)
        .bind(&new.flag)
        .fetch_one(&mut *tx)
        .await?;

        adjust_counter(&mut tx, registry, &new.flaggable, 1).await?;
        tx.commit().await?;

        Ok(flagging_from_row(&row))
    }

    async fn find(&self, filter: &FlaggingFilter) -> Result<Vec<Flagging>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM flaggings",
            FLAGGING_COLUMNS
        ));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, seq DESC");

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        Ok(rows.iter().map(flagging_from_row).collect())
    }

    async fn exists(&self, filter: &FlaggingFilter) -> Result<bool> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT EXISTS (SELECT 1 FROM flaggings");
        push_filter(&mut builder, filter);
        builder.push(")");

        let exists = builder
            .build_query_scalar::<bool>()
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Flagging>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM flaggings WHERE id = $1",
            FLAGGING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(flagging_from_row))
    }

    async fn delete(&self, registry: &FlagRegistry, filter: &FlaggingFilter) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;

        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM flaggings");
        push_filter(&mut builder, filter);
        builder.push(" RETURNING flaggable_type, flaggable_id, ignored");
        let rows = builder.build().fetch_all(&mut *tx).await?;

        decrement_for_deleted(&mut tx, registry, &rows).await?;
        tx.commit().await?;

        Ok(rows.len() as u64)
    }

    async fn delete_referencing(
        &self,
        registry: &FlagRegistry,
        reference: &EntityRef,
    ) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;
        let removed = Self::delete_referencing_in(&mut tx, registry, reference).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn set_ignored(
        &self,
        registry: &FlagRegistry,
        id: Uuid,
        ignored: bool,
    ) -> Result<Option<Flagging>> {
        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(&format!(
            "UPDATE flaggings SET ignored = $2 \
             WHERE id = $1 AND ignored <> $2 \
             RETURNING {}",
            FLAGGING_COLUMNS
        ))
        .bind(id)
        .bind(ignored)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let flagging = flagging_from_row(&row);
        let delta = if ignored { -1 } else { 1 };
        adjust_counter(&mut tx, registry, &flagging.flaggable(), delta).await?;
        tx.commit().await?;

        Ok(Some(flagging))
    }

    async fn counter_value(
        &self,
        registry: &FlagRegistry,
        flaggable: &EntityRef,
    ) -> Result<Option<i64>> {
        let Some(cache) = registry.counter_cache(&flaggable.entity_type) else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {column}::BIGINT FROM {table} WHERE id = $1",
            table = cache.table,
            column = cache.column,
        );
        let value = sqlx::query_scalar::<_, i64>(&sql)
            .bind(flaggable.id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(value)
    }
}
