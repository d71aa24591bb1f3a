use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};

use crate::{
    CounterBounds, CounterKey, Document, DocumentQuery, DocumentStoreError, IndexKey, Result,
    Version,
    store::{DocumentStore, PutOptions},
};

const SELECT_DOCUMENT: &str = r#"
    SELECT d.collection, d.id, d.version, d.body, d.created_at, d.updated_at,
        COALESCE(
            (SELECT jsonb_agg(jsonb_build_object('name', k.name, 'value', k.value, 'unique', k.is_unique))
             FROM document_keys k
             WHERE k.collection = d.collection AND k.document_id = d.id),
            '[]'::jsonb
        ) AS keys
    FROM documents d
"#;

/// PostgreSQL-backed document store implementation.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let keys_json: serde_json::Value = row.try_get("keys")?;
        let keys: Vec<IndexKey> = serde_json::from_value(keys_json)?;

        Ok(Document {
            collection: row.try_get("collection")?,
            id: row.try_get("id")?,
            version: Version::new(row.try_get("version")?),
            body: row.try_get("body")?,
            keys,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a DocumentQuery) {
        builder.push(" WHERE d.collection = ");
        builder.push_bind(query.collection.as_str());

        for (name, value) in &query.keys {
            builder.push(
                " AND EXISTS (SELECT 1 FROM document_keys f WHERE f.collection = d.collection AND f.document_id = d.id AND f.name = ",
            );
            builder.push_bind(name.as_str());
            builder.push(" AND f.value = ");
            builder.push_bind(value.as_str());
            builder.push(")");
        }
        if let Some(from) = query.created_from {
            builder.push(" AND d.created_at >= ");
            builder.push_bind(from);
        }
        if let Some(to) = query.created_to {
            builder.push(" AND d.created_at <= ");
            builder.push_bind(to);
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn put(&self, document: Document, options: PutOptions) -> Result<Version> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(&document.collection)
        .bind(&document.id)
        .fetch_optional(&mut *tx)
        .await?;

        let current_version = current.map(Version::new).unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(DocumentStoreError::ConcurrencyConflict {
                collection: document.collection,
                id: document.id,
                expected,
                actual: current_version,
            });
        }

        let new_version = current_version.next();
        let now = Utc::now();

        if current.is_some() {
            sqlx::query(
                r#"
                UPDATE documents SET version = $3, body = $4, updated_at = $5
                WHERE collection = $1 AND id = $2
                "#,
            )
            .bind(&document.collection)
            .bind(&document.id)
            .bind(new_version.as_i64())
            .bind(&document.body)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, version, body, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&document.collection)
            .bind(&document.id)
            .bind(new_version.as_i64())
            .bind(&document.body)
            .bind(document.created_at)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A racing insert of the same id lost the primary key
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("documents_pkey")
                {
                    return DocumentStoreError::ConcurrencyConflict {
                        collection: document.collection.clone(),
                        id: document.id.clone(),
                        expected: options.expected_version.unwrap_or(Version::initial()),
                        actual: Version::first(),
                    };
                }
                DocumentStoreError::Database(e)
            })?;
        }

        sqlx::query("DELETE FROM document_keys WHERE collection = $1 AND document_id = $2")
            .bind(&document.collection)
            .bind(&document.id)
            .execute(&mut *tx)
            .await?;

        for key in &document.keys {
            sqlx::query(
                r#"
                INSERT INTO document_keys (collection, document_id, name, value, is_unique)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&document.collection)
            .bind(&document.id)
            .bind(&key.name)
            .bind(&key.value)
            .bind(key.unique)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("document_keys_unique")
                {
                    tracing::debug!(
                        collection = %document.collection,
                        key = %key.name,
                        "unique key already held"
                    );
                    return DocumentStoreError::UniqueViolation {
                        collection: document.collection.clone(),
                        key: key.name.clone(),
                        value: key.value.clone(),
                    };
                }
                DocumentStoreError::Database(e)
            })?;
        }

        tx.commit().await?;
        Ok(new_version)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let sql = format!("{SELECT_DOCUMENT} WHERE d.collection = $1 AND d.id = $2");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_DOCUMENT);
        Self::push_filters(&mut builder, &query);

        if query.newest_first {
            builder.push(" ORDER BY d.created_at DESC, d.id DESC");
        } else {
            builder.push(" ORDER BY d.created_at ASC, d.id ASC");
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        Self::push_filters(&mut builder, &query);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Keys go with the document through the cascading foreign key
        let deleted = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM counters WHERE collection = $1 AND document_id = $2")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn set_counter(&self, key: &CounterKey, value: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO counters (collection, document_id, name, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, document_id, name) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(&key.collection)
        .bind(&key.document_id)
        .bind(&key.name)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_counter(&self, key: &CounterKey) -> Result<Option<i64>> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT value FROM counters WHERE collection = $1 AND document_id = $2 AND name = $3",
        )
        .bind(&key.collection)
        .bind(&key.document_id)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn adjust_counter(
        &self,
        key: &CounterKey,
        delta: i64,
        bounds: CounterBounds,
    ) -> Result<Option<i64>> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE counters SET value = value + $4
            WHERE collection = $1 AND document_id = $2 AND name = $3
              AND ($5::BIGINT IS NULL OR value + $4 >= $5)
              AND ($6::BIGINT IS NULL OR value + $4 <= $6)
            RETURNING value
            "#,
        )
        .bind(&key.collection)
        .bind(&key.document_id)
        .bind(&key.name)
        .bind(delta)
        .bind(bounds.min)
        .bind(bounds.max)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(updated);
        }

        // Nothing updated: either refused by the bounds or missing entirely
        match self.get_counter(key).await? {
            Some(_) => Ok(None),
            None => Err(DocumentStoreError::CounterNotFound(key.clone())),
        }
    }
}
