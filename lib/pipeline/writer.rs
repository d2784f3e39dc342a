use serde::Serialize;
use tracing::{info, warn};

use super::error::Error;
use crate::es_client::EsClient;
use crate::model::{IdentityRecord, UpdateView, UpsertView};

/// Records per bulk request; each record contributes two NDJSON lines.
const FLUSH_THRESHOLD: usize = 500;

#[derive(Debug, Serialize)]
struct BulkHeader<'a> {
    update: UpdateAction<'a>,
}

#[derive(Debug, Serialize)]
struct UpdateAction<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: String,
}

/// The upsert shape: `doc` updates an existing document without touching its
/// `createdon`; `upsert` is inserted whole when the id does not exist yet.
#[derive(Debug, Serialize)]
struct BulkOp<'a> {
    doc: UpdateView<'a>,
    upsert: UpsertView<'a>,
}

#[derive(Debug, Default)]
pub struct WriteSummary {
    pub batches_sent: usize,
    pub batches_failed: usize,
    pub records_flushed: usize,
}

/// Sends all records as fixed-size bulk upsert batches. A failed batch is
/// logged and skipped; later batches still go out, so partial writes across
/// batches are possible.
pub async fn write_records(
    es: &EsClient,
    index: &str,
    records: &[IdentityRecord],
) -> Result<WriteSummary, Error> {
    let mut summary = WriteSummary::default();

    for chunk in records.chunks(FLUSH_THRESHOLD) {
        let body = build_bulk_body(index, chunk)?;
        match es.bulk(index, body).await {
            Ok(response) => {
                if response.errors {
                    warn!(
                        records = chunk.len(),
                        "bulk response reported item-level errors"
                    );
                }
                summary.batches_sent += 1;
                summary.records_flushed += chunk.len();
            }
            Err(err) => {
                warn!(
                    error = %err,
                    records = chunk.len(),
                    "bulk write failed, records in this batch are unwritten"
                );
                summary.batches_failed += 1;
            }
        }
    }

    info!(
        batches_sent = summary.batches_sent,
        batches_failed = summary.batches_failed,
        records_flushed = summary.records_flushed,
        "bulk writes finished"
    );
    Ok(summary)
}

/// One newline-delimited bulk request: alternating header/document lines, one
/// pair per record, with a trailing newline.
fn build_bulk_body(index: &str, records: &[IdentityRecord]) -> Result<String, Error> {
    let mut body = String::new();
    for record in records {
        let header = BulkHeader {
            update: UpdateAction {
                index,
                id: record.document_id(),
            },
        };
        let op = BulkOp {
            doc: record.update_view(),
            upsert: record.upsert_view(),
        };
        body.push_str(&serde_json::to_string(&header)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&op)?);
        body.push('\n');
    }
    Ok(body)
}
