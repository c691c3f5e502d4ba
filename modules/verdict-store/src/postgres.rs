// Postgres persistence. The unique index on decisions.content_hash backs
// insert_if_absent; resolutions.decision_id and the data point primary key back
// the two upserts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use verdict_common::{
    Decision, DecisionPatch, Indicator, IndicatorDataPoint, Resolution, ResolutionDetails,
    Variation,
};

use crate::error::{Result, StoreError};
use crate::traits::{DecisionStore, IndicatorStore, InsertOutcome, ResolutionStore};

const DECISION_COLUMNS: &str = "id, title, summary, content_hash, source_url, status, \
     indicator_ids, main_topic, date, created_at";

const RESOLUTION_COLUMNS: &str =
    "id, decision_id, issue, confidence, details, variations, method, note, resolved_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("Connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct DecisionRow {
    id: Uuid,
    title: String,
    summary: Option<String>,
    content_hash: String,
    source_url: String,
    status: String,
    indicator_ids: Vec<String>,
    main_topic: Option<String>,
    date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = StoreError;

    fn try_from(row: DecisionRow) -> Result<Self> {
        Ok(Decision {
            id: row.id,
            title: row.title,
            summary: row.summary,
            content_hash: row.content_hash,
            source_url: row.source_url,
            status: row.status.parse()?,
            indicator_ids: row.indicator_ids,
            main_topic: row.main_topic,
            date: row.date,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DataPointRow {
    decision_id: Uuid,
    indicator_id: String,
    measure_type: String,
    value: f64,
    date: DateTime<Utc>,
}

impl TryFrom<DataPointRow> for IndicatorDataPoint {
    type Error = StoreError;

    fn try_from(row: DataPointRow) -> Result<Self> {
        Ok(IndicatorDataPoint {
            decision_id: row.decision_id,
            indicator_id: row.indicator_id,
            measure_type: row.measure_type.parse()?,
            value: row.value,
            date: row.date,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResolutionRow {
    id: Uuid,
    decision_id: Uuid,
    issue: String,
    confidence: f64,
    details: Json<ResolutionDetails>,
    variations: Json<Vec<Variation>>,
    method: String,
    note: Option<String>,
    resolved_at: DateTime<Utc>,
}

impl TryFrom<ResolutionRow> for Resolution {
    type Error = StoreError;

    fn try_from(row: ResolutionRow) -> Result<Self> {
        Ok(Resolution {
            id: row.id,
            decision_id: row.decision_id,
            issue: row.issue.parse()?,
            confidence: row.confidence,
            details: row.details.0,
            variations: row.variations.0,
            method: row.method.parse()?,
            note: row.note,
            resolved_at: row.resolved_at,
        })
    }
}

fn decisions(rows: Vec<DecisionRow>) -> Result<Vec<Decision>> {
    rows.into_iter().map(Decision::try_from).collect()
}

// ---------------------------------------------------------------------------
// DecisionStore
// ---------------------------------------------------------------------------

#[async_trait]
impl DecisionStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<Decision>> {
        let row = sqlx::query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Decision::try_from).transpose()
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Decision>> {
        let row = sqlx::query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions WHERE content_hash = $1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Decision::try_from).transpose()
    }

    async fn recent_since(&self, since: DateTime<Utc>) -> Result<Vec<Decision>> {
        let rows = sqlx::query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions \
             WHERE created_at >= $1 \
             ORDER BY created_at DESC, id ASC"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        decisions(rows)
    }

    async fn insert_if_absent(&self, decision: Decision) -> Result<InsertOutcome> {
        let inserted = sqlx::query_as::<_, DecisionRow>(&format!(
            r#"
            INSERT INTO decisions ({DECISION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (content_hash) DO NOTHING
            RETURNING {DECISION_COLUMNS}
            "#
        ))
        .bind(decision.id)
        .bind(&decision.title)
        .bind(&decision.summary)
        .bind(&decision.content_hash)
        .bind(&decision.source_url)
        .bind(decision.status.as_str())
        .bind(&decision.indicator_ids)
        .bind(&decision.main_topic)
        .bind(decision.date)
        .bind(decision.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row.try_into()?));
        }

        // Lost the race (or re-run): the winner is already committed.
        let existing = self.get_by_hash(&decision.content_hash).await?.ok_or_else(|| {
            StoreError::Corrupt(format!(
                "insert conflicted on {} but no row is visible",
                decision.content_hash
            ))
        })?;
        Ok(InsertOutcome::Existing(existing))
    }

    async fn patch(&self, id: Uuid, patch: &DecisionPatch) -> Result<Decision> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::DecisionNotFound(id))?;

        let mut decision = Decision::try_from(row)?;
        patch.apply(&mut decision);

        sqlx::query("UPDATE decisions SET status = $2, indicator_ids = $3 WHERE id = $1")
            .bind(id)
            .bind(decision.status.as_str())
            .bind(&decision.indicator_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(decision)
    }

    async fn list_unresolved(&self) -> Result<Vec<Decision>> {
        let rows = sqlx::query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions \
             WHERE status <> 'resolved' \
             ORDER BY date ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        decisions(rows)
    }
}

// ---------------------------------------------------------------------------
// IndicatorStore
// ---------------------------------------------------------------------------

#[async_trait]
impl IndicatorStore for PgStore {
    async fn get_indicator(&self, id: &str) -> Result<Option<Indicator>> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, name, source_kind FROM indicators WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, name, source_kind)| Indicator {
            id,
            name,
            source_kind,
        }))
    }

    async fn upsert_indicator(&self, indicator: &Indicator) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indicators (id, name, source_kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, source_kind = EXCLUDED.source_kind
            "#,
        )
        .bind(&indicator.id)
        .bind(&indicator.name)
        .bind(&indicator.source_kind)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn data_points(&self, decision_id: Uuid) -> Result<Vec<IndicatorDataPoint>> {
        let rows = sqlx::query_as::<_, DataPointRow>(
            r#"
            SELECT decision_id, indicator_id, measure_type, value, date
            FROM indicator_data_points
            WHERE decision_id = $1
            ORDER BY indicator_id ASC, date ASC
            "#,
        )
        .bind(decision_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IndicatorDataPoint::try_from).collect()
    }

    async fn upsert_data_point(&self, point: &IndicatorDataPoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indicator_data_points (decision_id, indicator_id, measure_type, value, date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (decision_id, indicator_id, measure_type)
            DO UPDATE SET value = EXCLUDED.value, date = EXCLUDED.date
            "#,
        )
        .bind(point.decision_id)
        .bind(&point.indicator_id)
        .bind(point.measure_type.as_str())
        .bind(point.value)
        .bind(point.date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ResolutionStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ResolutionStore for PgStore {
    async fn get_by_decision(&self, decision_id: Uuid) -> Result<Option<Resolution>> {
        let row = sqlx::query_as::<_, ResolutionRow>(&format!(
            "SELECT {RESOLUTION_COLUMNS} FROM resolutions WHERE decision_id = $1"
        ))
        .bind(decision_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Resolution::try_from).transpose()
    }

    async fn upsert(&self, resolution: &Resolution) -> Result<Resolution> {
        let row = sqlx::query_as::<_, ResolutionRow>(&format!(
            r#"
            INSERT INTO resolutions ({RESOLUTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (decision_id) DO UPDATE SET
                issue = EXCLUDED.issue,
                confidence = EXCLUDED.confidence,
                details = EXCLUDED.details,
                variations = EXCLUDED.variations,
                method = EXCLUDED.method,
                note = EXCLUDED.note,
                resolved_at = EXCLUDED.resolved_at
            RETURNING {RESOLUTION_COLUMNS}
            "#
        ))
        .bind(resolution.id)
        .bind(resolution.decision_id)
        .bind(resolution.issue.as_str())
        .bind(resolution.confidence)
        .bind(Json(&resolution.details))
        .bind(Json(&resolution.variations))
        .bind(resolution.method.as_str())
        .bind(&resolution.note)
        .bind(resolution.resolved_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn count_for_decision(&self, decision_id: Uuid) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM resolutions WHERE decision_id = $1")
                .bind(decision_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }
}
