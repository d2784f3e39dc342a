pub mod error;
pub mod queries;

mod aggregator;
mod writer;

use chrono::Utc;
use tracing::{error, info};

use crate::es_client::EsClient;
use crate::window::RunWindow;
use error::Error;
use queries::{CardinalityRequest, CardinalityResponse, PurgeRequest, WindowQuery};
pub use writer::WriteSummary;

/// Runs the full identity pipeline against one document store:
/// purge stale identities, estimate cardinality, plan partitions, aggregate,
/// bulk-upsert. Strictly sequential; the only state carried across steps is
/// the in-memory record list.
pub struct PipelineService {
    es: EsClient,
    index_datastream: String,
    index_identities: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub deleted: u64,
    pub estimated_cardinality: u64,
    pub partitions: u32,
    pub records_aggregated: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
}

impl PipelineService {
    pub fn new(es: EsClient, index_datastream: String, index_identities: String) -> Self {
        Self {
            es,
            index_datastream,
            index_identities,
        }
    }

    pub async fn run(
        &self,
        window: &RunWindow,
        skip_purge: bool,
        dry_run: bool,
    ) -> Result<RunReport, Error> {
        let mut report = RunReport::default();

        if skip_purge {
            info!("retention purge skipped");
        } else {
            report.deleted = self.purge_stale(&window.purge_cutoff_rfc3339()).await;
        }

        let query = WindowQuery::new(&window.start_rfc3339(), &window.end_rfc3339());
        info!(
            window_start = %window.start_rfc3339(),
            window_end = %window.end_rfc3339(),
            "counting pseudonym identities"
        );

        report.estimated_cardinality = self.estimate_cardinality(&query).await?;
        report.partitions = partition_count(report.estimated_cardinality);
        info!(
            cardinality = report.estimated_cardinality,
            partitions = report.partitions,
            "pulling aggregations"
        );

        let now_epoch = Utc::now().timestamp();
        let records = aggregator::aggregate_partitions(
            &self.es,
            &self.index_datastream,
            &query,
            report.partitions,
            now_epoch,
        )
        .await?;
        report.records_aggregated = records.len();
        info!(records = records.len(), "aggregation complete");

        if dry_run {
            info!(records = records.len(), "dry run, skipping bulk writes");
            return Ok(report);
        }

        let summary = writer::write_records(&self.es, &self.index_identities, &records).await?;
        report.batches_sent = summary.batches_sent;
        report.batches_failed = summary.batches_failed;
        Ok(report)
    }

    /// Deletes identity records whose `last_activity` is before the cutoff.
    /// Best-effort: a failure here cannot corrupt the aggregation, so it is
    /// logged and the run continues. Returns the deleted count, 0 on failure.
    async fn purge_stale(&self, cutoff: &str) -> u64 {
        let body = PurgeRequest::new(cutoff);
        match self.es.delete_by_query(&self.index_identities, &body).await {
            Ok(response) => {
                info!(deleted = response.deleted, cutoff, "purged stale identity records");
                response.deleted
            }
            Err(err) => {
                error!(error = %err, "retention purge failed, continuing with aggregation");
                0
            }
        }
    }

    /// Approximate distinct grouping-identifier count within the window.
    /// Fatal on any failure: without it there is no partition plan.
    async fn estimate_cardinality(&self, query: &WindowQuery) -> Result<u64, Error> {
        let body = CardinalityRequest::new(query);
        let response: CardinalityResponse = self
            .es
            .search(&self.index_datastream, &body)
            .await
            .map_err(Error::Cardinality)?;
        Ok(response.value())
    }
}

/// Number of partition queries for an estimated distinct count:
/// `round(c/5000) + round(c/50000)`. The first term keeps expected buckets
/// per partition under the 6000-bucket request cap; the second adds headroom
/// at very large cardinalities. Zero cardinality plans zero partitions.
pub fn partition_count(cardinality: u64) -> u32 {
    let c = cardinality as f64;
    ((c / 5000.0).round() + (c / 50_000.0).round()) as u32
}
