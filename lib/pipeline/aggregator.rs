use tracing::info;

use super::error::Error;
use super::queries::{AggregationRequest, AggregationResponse, IdBucket, WindowQuery};
use crate::es_client::EsClient;
use crate::model::IdentityRecord;

/// Runs one terms-aggregation query per partition, sequentially, and reduces
/// every bucket tree into flat identity records. Any failed partition aborts
/// the run: a partial result set would silently under-report identifiers with
/// no way to detect the gap afterwards.
pub async fn aggregate_partitions(
    es: &EsClient,
    index: &str,
    query: &WindowQuery,
    partitions: u32,
    now_epoch: i64,
) -> Result<Vec<IdentityRecord>, Error> {
    let mut records: Vec<IdentityRecord> = Vec::new();

    for partition in 0..partitions {
        let body = AggregationRequest::new(query, partition, partitions);
        let response: AggregationResponse = es
            .search(index, &body)
            .await
            .map_err(|source| Error::Aggregation { partition, source })?;

        for bucket in &response.aggregations.adswizz_ids.buckets {
            reduce_bucket(bucket, now_epoch, &mut records);
        }
        info!(
            partition,
            total_records = records.len(),
            "partition aggregated"
        );
    }

    Ok(records)
}

/// Flattens one grouping-identifier bucket into one record per partner.
///
/// Buckets whose key is empty after lower-casing represent events with no
/// identifier set and produce nothing. The global count is the sum of the
/// per-partner distinct CMP-user-id counts within this bucket; partitions are
/// disjoint, so each identifier is fully visible in exactly one bucket and the
/// sum is already global.
fn reduce_bucket(bucket: &IdBucket, now_epoch: i64, out: &mut Vec<IdentityRecord>) {
    let adswizz_id = bucket.key.to_lowercase();
    if adswizz_id.trim().is_empty() {
        return;
    }

    let total_cmp_userids_global: u64 = bucket
        .partnerkeys
        .buckets
        .iter()
        .map(|partner| partner.cmp_userids.buckets.len() as u64)
        .sum();

    for partner in &bucket.partnerkeys.buckets {
        let total_cmp_userids = partner.cmp_userids.buckets.len() as u64;

        let mut record = IdentityRecord {
            adswizz_id: adswizz_id.clone(),
            partnerkey: partner.key.clone(),
            last_activity: partner
                .last_activity
                .value_as_string
                .clone()
                .unwrap_or_default(),
            total_cmp_userids,
            total_cmp_userids_global,
            unique_adswizzid_partner: total_cmp_userids == 1,
            unique_adswizzid_global: total_cmp_userids_global == 1,
            cmp_userid: None,
            tc_string_exists: false,
            tc_string: None,
            uuid: None,
            createdon: now_epoch,
            updatedon: now_epoch,
        };

        if let Some(hit) = partner.latest.hits.hits.first() {
            record.uuid = hit.source.uuid.clone();
            record.tc_string = hit.source.payload.tc_string.clone();
            record.tc_string_exists = record.tc_string.is_some();
            record.cmp_userid = hit.source.identifiers_flat.cmp_userid.first().cloned();
        }

        out.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const NOW: i64 = 1_700_000_000;

    fn bucket_from(value: Value) -> IdBucket {
        serde_json::from_value(value).unwrap()
    }

    fn partner_bucket(key: &str, cmp_userids: &[&str], source: Value) -> Value {
        json!({
            "key": key,
            "last_activity": {"value": 1.7e12, "value_as_string": "2024-01-01T00:00:00+00:00"},
            "cmp-userids": {"buckets": cmp_userids.iter().map(|u| json!({"key": u, "doc_count": 1})).collect::<Vec<_>>()},
            "latest": {"hits": {"hits": [{"_source": source}]}}
        })
    }

    fn reduce(value: Value) -> Vec<IdentityRecord> {
        let mut out = Vec::new();
        reduce_bucket(&bucket_from(value), NOW, &mut out);
        out
    }

    #[test]
    fn empty_and_whitespace_keys_yield_no_records() {
        for key in ["", "   ", "\t"] {
            let records = reduce(json!({
                "key": key,
                "partnerkeys": {"buckets": [
                    partner_bucket("p1", &["u1"], json!({"identifiers_flat": {"cmp-userid": ["u1"]}}))
                ]}
            }));
            assert!(records.is_empty(), "key {key:?} must produce nothing");
        }
    }

    #[test]
    fn sample_bucket_yields_one_unique_record() {
        let records = reduce(json!({
            "key": "ABC123",
            "partnerkeys": {"buckets": [
                partner_bucket("p1", &["u1"], json!({"identifiers_flat": {"cmp-userid": ["u1"]}}))
            ]}
        }));

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.adswizz_id, "abc123");
        assert_eq!(record.partnerkey, "p1");
        assert_eq!(record.total_cmp_userids, 1);
        assert_eq!(record.total_cmp_userids_global, 1);
        assert!(record.unique_adswizzid_partner);
        assert!(record.unique_adswizzid_global);
        assert_eq!(record.cmp_userid.as_deref(), Some("u1"));
        assert_eq!(record.last_activity, "2024-01-01T00:00:00+00:00");
        assert_eq!(record.createdon, NOW);
        assert_eq!(record.updatedon, NOW);
    }

    #[test]
    fn global_count_sums_across_partners() {
        let records = reduce(json!({
            "key": "XYZ",
            "partnerkeys": {"buckets": [
                partner_bucket("p1", &["u1", "u2"], json!({})),
                partner_bucket("p2", &["u3"], json!({})),
            ]}
        }));

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.total_cmp_userids_global, 3);
            assert!(!record.unique_adswizzid_global);
        }
        assert_eq!(records[0].total_cmp_userids, 2);
        assert!(!records[0].unique_adswizzid_partner);
        assert_eq!(records[1].total_cmp_userids, 1);
        assert!(records[1].unique_adswizzid_partner);
    }

    #[test]
    fn summing_emitted_records_reproduces_the_global_count() {
        let records = reduce(json!({
            "key": "ROUNDTRIP",
            "partnerkeys": {"buckets": [
                partner_bucket("p1", &["u1", "u2"], json!({})),
                partner_bucket("p2", &["u3", "u4", "u5"], json!({})),
                partner_bucket("p3", &["u6"], json!({})),
            ]}
        }));

        let mut by_id: HashMap<&str, u64> = HashMap::new();
        for record in &records {
            *by_id.entry(record.adswizz_id.as_str()).or_default() += record.total_cmp_userids;
        }
        for record in &records {
            assert_eq!(by_id[record.adswizz_id.as_str()], record.total_cmp_userids_global);
        }
    }

    #[test]
    fn uniqueness_flags_follow_counts_exactly() {
        let records = reduce(json!({
            "key": "FLAGS",
            "partnerkeys": {"buckets": [
                partner_bucket("solo", &["u1"], json!({})),
                partner_bucket("multi", &["u2", "u3"], json!({})),
            ]}
        }));

        for record in &records {
            assert_eq!(record.unique_adswizzid_partner, record.total_cmp_userids == 1);
            assert_eq!(
                record.unique_adswizzid_global,
                record.total_cmp_userids_global == 1
            );
        }
    }

    #[test]
    fn optional_fields_come_from_the_top_hit_when_present() {
        let records = reduce(json!({
            "key": "OPT",
            "partnerkeys": {"buckets": [
                partner_bucket("p1", &["u1"], json!({
                    "uuid": "11111111-2222-3333-4444-555555555555",
                    "payload": {"tc_string": "CO-consent", "occurredon": "2024-01-01T00:00:00+00:00"},
                    "identifiers_flat": {"cmp-userid": ["u1", "u9"]}
                }))
            ]}
        }));

        let record = &records[0];
        assert_eq!(
            record.uuid.as_deref(),
            Some("11111111-2222-3333-4444-555555555555")
        );
        assert_eq!(record.tc_string.as_deref(), Some("CO-consent"));
        assert!(record.tc_string_exists);
        // first element of the secondary-identifier list
        assert_eq!(record.cmp_userid.as_deref(), Some("u1"));
    }

    #[test]
    fn missing_top_hit_fields_leave_optionals_unset() {
        let records = reduce(json!({
            "key": "BARE",
            "partnerkeys": {"buckets": [
                partner_bucket("p1", &["u1"], json!({"identifiers_flat": {"cmp-userid": []}}))
            ]}
        }));

        let record = &records[0];
        assert!(record.uuid.is_none());
        assert!(record.tc_string.is_none());
        assert!(!record.tc_string_exists);
        assert!(record.cmp_userid.is_none());
    }
}
