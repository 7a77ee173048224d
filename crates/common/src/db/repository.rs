//! Postgres-backed phrase store
//!
//! Maps phrase records onto the `phrases` table through SeaORM.

use crate::db::models::*;
use crate::db::{DbPool, PhraseStore, PHRASES_COLLECTION};
use crate::errors::{AppError, Result};
use crate::phrase::{NewPhrase, Phrase, PhrasePatch, MAX_WINDOW};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend,
    DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Schema, Set, SqlErr, Statement,
    TransactionTrait,
};
use serde_json::Value;
use tracing::info;

/// Repository for phrase rows
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Create the `phrases` table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        let backend = self.conn().get_database_backend();
        let schema = Schema::new(backend);

        let mut table = schema.create_table_from_entity(PhraseEntity);
        table.if_not_exists();

        self.conn().execute(backend.build(&table)).await?;
        info!(table = PHRASES_COLLECTION, "Phrase table ready");
        Ok(())
    }
}

/// Lock taken before inserting a caller-chosen id. It conflicts with the
/// lock every plain INSERT takes, so no sequence-assigned insert can run
/// until the sequence has been moved past the new id.
fn lock_phrases_sql() -> String {
    format!("LOCK TABLE {} IN SHARE ROW EXCLUSIVE MODE", PHRASES_COLLECTION)
}

/// Move the key sequence past caller-chosen identifiers so generated keys
/// never collide with them. The sequence never moves backwards, and an
/// id of 0 leaves it at its starting value.
async fn sync_id_sequence<C: ConnectionTrait>(conn: &C) -> Result<()> {
    let sql = format!(
        r#"WITH seq AS (
    SELECT pg_get_serial_sequence('{table}', '_id')::regclass AS id
), top AS (
    SELECT GREATEST(
        MAX("_id"),
        COALESCE(pg_sequence_last_value((SELECT id FROM seq)), 0)
    ) AS value
    FROM {table}
)
SELECT setval((SELECT id FROM seq), GREATEST(value, 1), value >= 1) FROM top"#,
        table = PHRASES_COLLECTION
    );

    conn.execute(Statement::from_string(DbBackend::Postgres, sql)).await?;
    Ok(())
}

fn insert_error(err: DbErr, id: Option<i64>) -> AppError {
    match (err.sql_err(), id) {
        (Some(SqlErr::UniqueConstraintViolation(_)), Some(id)) => AppError::Duplicate {
            message: format!("phrase {} already exists", id),
        },
        _ => AppError::Database(err),
    }
}

impl TryFrom<PhraseRow> for Phrase {
    type Error = AppError;

    fn try_from(row: PhraseRow) -> Result<Self> {
        let match_word = serde_json::from_value(row.match_word)?;
        let topics = match row.topics {
            Value::Object(map) => map,
            other => {
                return Err(AppError::Internal {
                    message: format!("phrase {} has non-object topics: {}", row.id, other),
                })
            }
        };

        Ok(Phrase {
            id: row.id,
            txt_id: row.txt_id,
            path: row.path,
            phrase: row.phrase,
            lenght: row.lenght,
            section: row.section,
            a_id: row.a_id,
            match_word,
            topics,
        })
    }
}

/// Active model carrying only the attributes a patch supplies
fn patch_model(patch: &PhrasePatch) -> Result<PhraseActiveModel> {
    let mut model = PhraseActiveModel {
        id: ActiveValue::NotSet,
        txt_id: ActiveValue::NotSet,
        path: ActiveValue::NotSet,
        phrase: ActiveValue::NotSet,
        lenght: ActiveValue::NotSet,
        section: ActiveValue::NotSet,
        a_id: ActiveValue::NotSet,
        match_word: ActiveValue::NotSet,
        topics: ActiveValue::NotSet,
    };

    if let Some(txt_id) = patch.txt_id {
        model.txt_id = Set(txt_id);
    }
    if let Some(path) = &patch.path {
        model.path = Set(path.clone());
    }
    if let Some(phrase) = &patch.phrase {
        model.phrase = Set(phrase.clone());
    }
    if let Some(lenght) = patch.lenght {
        model.lenght = Set(lenght);
    }
    if let Some(section) = &patch.section {
        model.section = Set(section.clone());
    }
    if let Some(a_id) = patch.a_id {
        model.a_id = Set(a_id);
    }
    if let Some(match_word) = &patch.match_word {
        model.match_word = Set(serde_json::to_value(match_word)?);
    }
    if let Some(topics) = &patch.topics {
        model.topics = Set(Value::Object(topics.clone()));
    }

    Ok(model)
}

#[async_trait]
impl PhraseStore for Repository {
    async fn insert(&self, input: NewPhrase) -> Result<Phrase> {
        let explicit_id = input.id;

        let model = PhraseActiveModel {
            id: match explicit_id {
                Some(id) => Set(id),
                None => ActiveValue::NotSet,
            },
            txt_id: Set(input.txt_id),
            path: Set(input.path),
            phrase: Set(input.phrase),
            lenght: Set(input.lenght),
            section: Set(input.section),
            a_id: Set(input.a_id),
            match_word: Set(serde_json::to_value(&input.match_word)?),
            topics: Set(Value::Object(input.topics)),
        };

        let row = match explicit_id {
            None => model
                .insert(self.conn())
                .await
                .map_err(|e| insert_error(e, None))?,
            Some(id) => {
                // Row and sequence move together or not at all
                let txn = self.conn().begin().await?;
                txn.execute_unprepared(&lock_phrases_sql()).await?;

                let row = model
                    .insert(&txn)
                    .await
                    .map_err(|e| insert_error(e, Some(id)))?;
                sync_id_sequence(&txn).await?;

                txn.commit().await?;
                row
            }
        };

        Phrase::try_from(row)
    }

    async fn list(&self, skip: u64, limit: u64) -> Result<Vec<Phrase>> {
        PhraseEntity::find()
            .order_by_asc(PhraseColumn::Id)
            .offset(skip.min(MAX_WINDOW))
            .limit(limit.min(MAX_WINDOW))
            .all(self.conn())
            .await?
            .into_iter()
            .map(Phrase::try_from)
            .collect()
    }

    async fn find(&self, id: i64) -> Result<Option<Phrase>> {
        PhraseEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(Phrase::try_from)
            .transpose()
    }

    async fn update(&self, id: i64, patch: &PhrasePatch) -> Result<u64> {
        if patch.is_empty() {
            return Ok(0);
        }

        let result = PhraseEntity::update_many()
            .set(patch_model(patch)?)
            .filter(PhraseColumn::Id.eq(id))
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected)
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        let result = PhraseEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::phrase::fixtures::example_new_phrase;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    /// Postgres used by the store tests below; they return early without it
    const TEST_DATABASE_URL_VAR: &str = "TEST_DATABASE_URL";

    async fn test_repository() -> Option<Repository> {
        let url = std::env::var(TEST_DATABASE_URL_VAR).ok()?;
        let config = AppConfig::with_database_url(url);

        let repo = Repository::new(DbPool::new(&config.database).await.unwrap());
        repo.ensure_schema().await.unwrap();
        Some(repo)
    }

    fn row(topics: Value) -> PhraseRow {
        PhraseRow {
            id: 3,
            txt_id: 6,
            path: "./pdf/0001/0001008v3.tei.xml".into(),
            phrase: "this is the traditional machine learning problem.".into(),
            lenght: 49,
            section: "text".into(),
            a_id: 885,
            match_word: json!(["machine learning"]),
            topics,
        }
    }

    #[test]
    fn test_row_converts_to_phrase() {
        let topics = Value::Object(example_new_phrase().topics);
        let phrase = Phrase::try_from(row(topics)).unwrap();
        assert_eq!(phrase, example_new_phrase().into_phrase(3));
    }

    #[test]
    fn test_row_with_scalar_topics_is_rejected() {
        let err = Phrase::try_from(row(json!(1))).unwrap_err();
        assert!(err.is_server_error());
    }

    #[test]
    fn test_patch_model_sets_only_supplied_columns() {
        let patch = PhrasePatch {
            section: Some("abstract".into()),
            match_word: Some(vec!["topic model".into()]),
            ..Default::default()
        };
        let model = patch_model(&patch).unwrap();

        assert!(matches!(&model.section, ActiveValue::Set(s) if s == "abstract"));
        assert!(matches!(&model.match_word, ActiveValue::Set(v) if *v == json!(["topic model"])));
        assert!(matches!(model.phrase, ActiveValue::NotSet));
        assert!(matches!(model.id, ActiveValue::NotSet));
    }

    #[test]
    fn test_other_insert_errors_stay_database_errors() {
        let err = insert_error(DbErr::Custom("boom".into()), Some(1));
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_postgres_store_lifecycle() {
        let Some(repo) = test_repository().await else {
            return;
        };

        let created = assert_ok!(repo.insert(example_new_phrase()).await);
        assert_eq!(created, example_new_phrase().into_phrase(created.id));
        assert_eq!(repo.find(created.id).await.unwrap(), Some(created.clone()));

        let patch = PhrasePatch {
            section: Some("abstract".into()),
            ..Default::default()
        };
        assert_eq!(repo.update(created.id, &patch).await.unwrap(), 1);
        let updated = repo.find(created.id).await.unwrap().unwrap();
        assert_eq!(updated.section, "abstract");
        assert_eq!(updated.phrase, created.phrase);
        assert_eq!(updated.topics, created.topics);

        assert_eq!(repo.update(created.id, &PhrasePatch::default()).await.unwrap(), 0);
        assert_eq!(repo.update(-1, &patch).await.unwrap(), 0);

        assert_eq!(repo.delete(created.id).await.unwrap(), 1);
        assert_eq!(repo.delete(created.id).await.unwrap(), 0);
        assert!(repo.find(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_postgres_list_bounds() {
        let Some(repo) = test_repository().await else {
            return;
        };

        let first = repo.insert(example_new_phrase()).await.unwrap();
        let second = repo.insert(example_new_phrase()).await.unwrap();

        let listed = repo.list(0, MAX_WINDOW).await.unwrap();
        assert!(listed.windows(2).all(|pair| pair[0].id < pair[1].id));
        assert!(listed.iter().any(|phrase| phrase.id == second.id));

        assert!(repo.list(0, 0).await.unwrap().is_empty());
        assert!(assert_ok!(repo.list(u64::MAX, u64::MAX).await).is_empty());

        repo.delete(first.id).await.unwrap();
        repo.delete(second.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_postgres_caller_ids_keep_sequence_ahead() {
        let Some(repo) = test_repository().await else {
            return;
        };
        repo.delete(0).await.unwrap();

        let first = repo.insert(example_new_phrase()).await.unwrap();

        let mut high = example_new_phrase();
        high.id = Some(first.id + 1000);
        let high = assert_ok!(repo.insert(high).await);

        let mut zero = example_new_phrase();
        zero.id = Some(0);
        assert_eq!(assert_ok!(repo.insert(zero.clone()).await).id, 0);

        let err = assert_err!(repo.insert(zero).await);
        assert!(matches!(err, AppError::Duplicate { .. }));
        assert!(repo.find(0).await.unwrap().is_some());

        // An id of 0 must not pull the sequence back below `high`
        let next = repo.insert(example_new_phrase()).await.unwrap();
        assert!(next.id > high.id);

        for id in [0, first.id, high.id, next.id] {
            repo.delete(id).await.unwrap();
        }
    }
}
