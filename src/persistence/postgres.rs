//! PostgreSQL implementation of the backup store and board registry.
//!
//! Every mutating operation is one statement, so per-record consistency
//! comes from the database rather than application locks. The list-patch
//! statements mirror [`crate::domain::merge`]: seed the list field, overlay
//! the event's parent snapshot, overlay the existing document, then append
//! if absent or remove.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::models::BoardRegistration;
use super::{BackupStore, BoardRegistry};
use crate::domain::entities::Comment;
use crate::domain::merge::ListPatch;
use crate::error::WardenError;

/// Shared skeleton of both list-patch statements: merge seed and existing
/// document, apply the patch expression, upsert the result.
macro_rules! patch_sql {
    ($patch_expr:literal) => {
        concat!(
            "WITH existing AS ( \
               SELECT data FROM backups WHERE id = $1 \
             ), merged AS ( \
               SELECT jsonb_build_object($4::text, '[]'::jsonb) || $3::jsonb || \
                      coalesce((SELECT data FROM existing), '{}'::jsonb) AS doc \
             ), patched AS ( \
               SELECT jsonb_set(doc, ARRAY[$4::text], ",
            $patch_expr,
            ") AS doc FROM merged \
             ) \
             INSERT INTO backups (id, board_id, data) \
             SELECT $1, $2, doc FROM patched \
             ON CONFLICT (id) DO UPDATE SET board_id = $2, data = excluded.data"
        )
    };
}

// Append-if-absent, matching the set semantics of `ListPatch::Add`.
const PATCH_ADD_SQL: &str = patch_sql!(
    "CASE WHEN coalesce(doc->$4, '[]'::jsonb) @> jsonb_build_array($5::jsonb) \
          THEN coalesce(doc->$4, '[]'::jsonb) \
          ELSE coalesce(doc->$4, '[]'::jsonb) || $5::jsonb END"
);
const PATCH_REMOVE_SQL: &str = patch_sql!("coalesce(doc->$4, '[]'::jsonb) - $5::text");

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_err(e: sqlx::Error) -> WardenError {
    WardenError::Store(e.to_string())
}

#[async_trait]
impl BackupStore for PostgresStore {
    async fn save(&self, id: &str, board_id: &str, doc: &Value) -> Result<(), WardenError> {
        sqlx::query(
            "INSERT INTO backups (id, board_id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET board_id = $2, data = backups.data || $3",
        )
        .bind(id)
        .bind(board_id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn patch_list(
        &self,
        id: &str,
        board_id: &str,
        seed: &Value,
        field: &str,
        patch: &ListPatch,
    ) -> Result<(), WardenError> {
        let query = match patch {
            ListPatch::Add(value) => sqlx::query(PATCH_ADD_SQL)
                .bind(id)
                .bind(board_id)
                .bind(seed)
                .bind(field)
                .bind(value),
            ListPatch::Remove(target) => sqlx::query(PATCH_REMOVE_SQL)
                .bind(id)
                .bind(board_id)
                .bind(seed)
                .bind(field)
                .bind(target),
        };
        query.execute(&self.pool).await.map_err(store_err)?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Value>, WardenError> {
        sqlx::query_scalar::<_, Value>("SELECT data FROM backups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn delete(&self, id: &str, board_id: &str) -> Result<(), WardenError> {
        sqlx::query("DELETE FROM backups WHERE id = $1 AND board_id = $2")
            .bind(id)
            .bind(board_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn cards_with_label(&self, label_id: &str) -> Result<Vec<String>, WardenError> {
        sqlx::query_scalar::<_, String>(
            "SELECT id FROM backups \
             WHERE data @> jsonb_build_object('idLabels', jsonb_build_array($1::text))",
        )
        .bind(label_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn find_converted_checkitem(
        &self,
        name: &str,
        checklist_id: &str,
    ) -> Result<Option<String>, WardenError> {
        sqlx::query_scalar::<_, String>(
            "WITH potential_checkitems AS ( \
               SELECT id, data->'id' AS json_id FROM backups \
               WHERE data->>'name' = $1 AND NOT data ? 'shortLink' \
             ), parent_checklist AS ( \
               SELECT data->'idCheckItems' AS id_check_items FROM backups WHERE id = $2 \
             ) \
             SELECT potential_checkitems.id \
             FROM potential_checkitems \
             INNER JOIN parent_checklist \
               ON potential_checkitems.json_id <@ parent_checklist.id_check_items \
             LIMIT 1",
        )
        .bind(name)
        .bind(checklist_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn take_comments(&self, card_id: &str) -> Result<Vec<Comment>, WardenError> {
        type Row = (
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        );
        let rows = sqlx::query_as::<_, Row>(
            "WITH comments AS ( \
               SELECT * FROM ( \
                 SELECT DISTINCT ON (id) id, date, text, user_id, username \
                 FROM ( \
                   SELECT \
                     c->>'id' AS id, \
                     c->>'date' AS date, \
                     c->>'text' AS text, \
                     c->>'userId' AS user_id, \
                     c->>'username' AS username \
                   FROM ( \
                     SELECT jsonb_array_elements(data->'comments') AS c \
                     FROM backups WHERE id = $1 \
                   ) AS elems \
                 ) AS flat \
                 ORDER BY id, date DESC \
               ) AS dedup \
               WHERE text <> '' \
               ORDER BY date \
             ), strip AS ( \
               UPDATE backups SET data = data - 'comments' WHERE id = $1 \
             ) \
             SELECT id, date, text, user_id, username FROM comments",
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, date, text, user_id, username)| Comment {
                id: id.unwrap_or_default(),
                date: date.unwrap_or_default(),
                text: text.unwrap_or_default(),
                user_id: user_id.unwrap_or_default(),
                username: username.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl BoardRegistry for PostgresStore {
    async fn lookup(&self, board_id: &str) -> Result<Option<BoardRegistration>, WardenError> {
        let row = sqlx::query_as::<_, (String, String, bool)>(
            "SELECT id, coalesce(token, '') AS token, enabled FROM boards WHERE id = $1",
        )
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|(id, token, enabled)| BoardRegistration { id, token, enabled }))
    }
}
