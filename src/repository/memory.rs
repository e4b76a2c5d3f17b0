//! In-process storage backend (`STORAGE_BACKEND=memory`, tests).

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use chrono::{DateTime, Utc};

use super::{QualityAggregates, ReadingFilter, ReadingRepository};
use crate::error::Result;
use crate::models::{EnrichedReading, StoredReading};

/// Readings held in a vector kept sorted by `recorded_at`.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    readings: RwLock<Vec<StoredReading>>,
}

impl MemoryRepository {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }
}

#[async_trait]
impl ReadingRepository for MemoryRepository {
    // ---
    async fn save(&self, reading: &EnrichedReading) -> Result<Uuid> {
        // ---
        let id = Uuid::new_v4();
        let mut readings = self.readings.write().await;

        // after any equal timestamps, so insertion order breaks ties
        let pos = readings.partition_point(|r| r.reading.recorded_at <= reading.recorded_at);
        readings.insert(
            pos,
            StoredReading {
                id,
                reading: reading.clone(),
            },
        );

        tracing::debug!("memory store: saved {} ({} total)", id, readings.len());
        Ok(id)
    }

    async fn query(&self, filter: &ReadingFilter) -> Result<Vec<StoredReading>> {
        // ---
        let readings = self.readings.read().await;
        let mut matched: Vec<StoredReading> = readings
            .iter()
            .filter(|r| filter.matches(&r.reading))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            let skip = matched.len().saturating_sub(limit);
            matched.drain(..skip);
        }

        Ok(matched)
    }

    async fn quality_aggregates(
        &self,
        recent_since: DateTime<Utc>,
        top_errors: usize,
    ) -> Result<QualityAggregates> {
        // ---
        let readings = self.readings.read().await;
        Ok(QualityAggregates::from_readings(
            readings.iter().map(|r| &r.reading),
            recent_since,
            top_errors,
        ))
    }
}
