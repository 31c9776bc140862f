use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{AgentId, AggregateId, InstanceId};

use crate::{
    DomainEvent, EventId, EventStoreError, Result, SequenceNumber, Snapshot, SnapshotStore,
    event::{META_AGENT_ID, META_INSTANCE_ID},
    store::{EventStore, group_for_append},
};

/// Name of the unique index guarding per-stream sequence numbers.
const STREAM_SEQUENCE_CONSTRAINT: &str = "uq_stream_sequence";

/// PostgreSQL-backed event store.
///
/// The unique constraint on `(aggregate_id, aggregate_type, sequence_number)`
/// is the sole concurrency control: two writers that loaded the same stream
/// head both stamp `max + 1`, and the second insert fails at commit.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: PgRow) -> Result<DomainEvent> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: BTreeMap<String, String> = serde_json::from_value(metadata_json)?;

        Ok(DomainEvent {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            event_type: row.try_get("event_type")?,
            timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            sequence_number: SequenceNumber::new(row.try_get("sequence_number")?),
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    /// Extracts the instance/agent routing columns from event metadata.
    ///
    /// The `"system"` sentinel (and anything unparsable) maps to the nil
    /// UUID so system events still satisfy referential integrity.
    fn routing_columns(event: &DomainEvent) -> (Option<Uuid>, Option<Uuid>) {
        let instance = event
            .metadata
            .get(META_INSTANCE_ID)
            .map(|v| Uuid::parse_str(v).unwrap_or_else(|_| Uuid::nil()));
        let agent = event
            .metadata
            .get(META_AGENT_ID)
            .map(|v| AgentId::parse_meta(v).as_uuid());
        (instance, agent)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<DomainEvent>) -> Result<()> {
        let groups = group_for_append(&events)?;

        let mut tx = self.pool.begin().await?;

        // Continuity check per stream. The unique index still arbitrates the
        // race between this read and the inserts below.
        for ((aggregate_id, aggregate_type), group) in &groups {
            let current_max: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(sequence_number) FROM domain_events \
                 WHERE aggregate_id = $1 AND aggregate_type = $2",
            )
            .bind(aggregate_id.as_uuid())
            .bind(aggregate_type)
            .fetch_one(&mut *tx)
            .await?;

            let current_max = SequenceNumber::new(current_max.unwrap_or(0));
            let first = group[0].sequence_number;
            if first <= current_max {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: *aggregate_id,
                    aggregate_type: aggregate_type.clone(),
                    sequence: first,
                });
            }
            if first != current_max.next() {
                return Err(EventStoreError::InvalidBatch(format!(
                    "stream {aggregate_type}/{aggregate_id} would gap: head is {current_max}, batch starts at {first}"
                )));
            }
        }

        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;
            let (instance_id, agent_id) = Self::routing_columns(event);

            sqlx::query(
                r#"
                INSERT INTO domain_events (
                    event_id, event_type, aggregate_id, aggregate_type,
                    instance_id, agent_id, sequence_number, timestamp,
                    payload, metadata
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(instance_id)
            .bind(agent_id)
            .bind(event.sequence_number.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some(STREAM_SEQUENCE_CONSTRAINT)
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id: event.aggregate_id,
                        aggregate_type: event.aggregate_type.clone(),
                        sequence: event.sequence_number,
                    };
                }
                EventStoreError::Database(e)
            })?;
        }

        tx.commit().await?;
        metrics::counter!("events_appended_total").increment(events.len() as u64);
        Ok(())
    }

    async fn events_for(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        from: SequenceNumber,
    ) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, event_type, aggregate_id, aggregate_type,
                   sequence_number, timestamp, payload, metadata
            FROM domain_events
            WHERE aggregate_id = $1 AND aggregate_type = $2 AND sequence_number > $3
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .bind(aggregate_type)
        .bind(from.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn has_events(&self, aggregate_id: AggregateId, aggregate_type: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM domain_events WHERE aggregate_id = $1 AND aggregate_type = $2)",
        )
        .bind(aggregate_id.as_uuid())
        .bind(aggregate_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn latest_event_id(&self, instance_id: InstanceId) -> Result<Option<EventId>> {
        let event_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT event_id
            FROM domain_events
            WHERE instance_id = $1
            ORDER BY timestamp DESC, sequence_number DESC
            LIMIT 1
            "#,
        )
        .bind(instance_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(event_id.map(EventId::from_uuid))
    }
}

/// PostgreSQL-backed snapshot store.
#[derive(Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Creates a new PostgreSQL snapshot store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_id, aggregate_type, sequence_number, snapshot_data, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_id, aggregate_type) DO UPDATE SET
                sequence_number = EXCLUDED.sequence_number,
                snapshot_data = EXCLUDED.snapshot_data,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(snapshot.aggregate_id.as_uuid())
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.sequence_number.as_i64())
        .bind(&snapshot.state)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        metrics::counter!("snapshots_written_total").increment(1);
        Ok(())
    }

    async fn find_latest(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT aggregate_id, aggregate_type, sequence_number, snapshot_data, created_at
            FROM snapshots
            WHERE aggregate_id = $1 AND aggregate_type = $2
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .bind(aggregate_type)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                sequence_number: SequenceNumber::new(row.try_get("sequence_number")?),
                state: row.try_get("snapshot_data")?,
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            })),
            None => Ok(None),
        }
    }
}
