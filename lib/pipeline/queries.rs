//! Typed request bodies and response shapes for the three store calls.
//!
//! Field names on the wire are fixed by the datastream mapping
//! (`identifiers_flat.*`, `payload.*`) and the identities index schema, so
//! every struct here serializes/deserializes to exactly those names.

use serde::{Deserialize, Serialize};

pub const GROUPING_ID_FIELD: &str = "identifiers_flat.adswizz-listenerid";
pub const SECONDARY_ID_FIELD: &str = "identifiers_flat.cmp-userid";
pub const PARTNER_FIELD: &str = "partnerkey";
pub const OCCURRED_ON_FIELD: &str = "payload.occurredon";
const TC_STRING_FIELD: &str = "payload.tc_string";
const UUID_FIELD: &str = "uuid";

/// Per-request bucket cap for the grouping-identifier terms aggregation; the
/// partition planner sizes partitions so estimated buckets stay under this.
const MAX_ID_BUCKETS: u32 = 6000;
const MAX_PARTNER_BUCKETS: u32 = 500;
const LAST_ACTIVITY_FORMAT: &str = "YYYY-MM-dd'T'HH:mm:ssZZZZZ";

// ---------------------------------------------------------------------------
// Shared window filter

/// The bool/range filter every search in one run shares:
/// `createdon` within `[start, end)`.
#[derive(Debug, Clone, Serialize)]
pub struct WindowQuery {
    bool: BoolMust,
}

#[derive(Debug, Clone, Serialize)]
struct BoolMust {
    must: Vec<CreatedOnClause>,
}

#[derive(Debug, Clone, Serialize)]
struct CreatedOnClause {
    range: CreatedOnRange,
}

#[derive(Debug, Clone, Serialize)]
struct CreatedOnRange {
    createdon: TimeRange,
}

#[derive(Debug, Clone, Serialize)]
struct TimeRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    gte: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lt: Option<String>,
}

impl WindowQuery {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            bool: BoolMust {
                must: vec![CreatedOnClause {
                    range: CreatedOnRange {
                        createdon: TimeRange {
                            gte: Some(start.to_string()),
                            lt: Some(end.to_string()),
                        },
                    },
                }],
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Retention purge

/// Delete-by-query body for the identities index. Filters on `last_activity`,
/// not `createdon`: identities go stale by actual activity, not by when their
/// record was created.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeRequest {
    query: PurgeQuery,
}

#[derive(Debug, Clone, Serialize)]
struct PurgeQuery {
    bool: PurgeFilter,
}

#[derive(Debug, Clone, Serialize)]
struct PurgeFilter {
    filter: Vec<LastActivityClause>,
}

#[derive(Debug, Clone, Serialize)]
struct LastActivityClause {
    range: LastActivityRange,
}

#[derive(Debug, Clone, Serialize)]
struct LastActivityRange {
    last_activity: CutoffBound,
}

#[derive(Debug, Clone, Serialize)]
struct CutoffBound {
    lt: String,
}

impl PurgeRequest {
    pub fn new(cutoff: &str) -> Self {
        Self {
            query: PurgeQuery {
                bool: PurgeFilter {
                    filter: vec![LastActivityClause {
                        range: LastActivityRange {
                            last_activity: CutoffBound {
                                lt: cutoff.to_string(),
                            },
                        },
                    }],
                },
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Cardinality estimate

#[derive(Debug, Serialize)]
pub struct CardinalityRequest<'a> {
    size: u32,
    query: &'a WindowQuery,
    aggs: CardinalityAggs,
}

#[derive(Debug, Serialize)]
struct CardinalityAggs {
    adswizz_ids: CardinalityAgg,
}

#[derive(Debug, Serialize)]
struct CardinalityAgg {
    cardinality: FieldRef,
}

#[derive(Debug, Serialize)]
struct FieldRef {
    field: &'static str,
}

impl<'a> CardinalityRequest<'a> {
    pub fn new(query: &'a WindowQuery) -> Self {
        Self {
            size: 0,
            query,
            aggs: CardinalityAggs {
                adswizz_ids: CardinalityAgg {
                    cardinality: FieldRef {
                        field: GROUPING_ID_FIELD,
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CardinalityResponse {
    aggregations: CardinalityValueAggs,
}

#[derive(Debug, Deserialize)]
struct CardinalityValueAggs {
    adswizz_ids: CardinalityValue,
}

#[derive(Debug, Deserialize)]
struct CardinalityValue {
    value: f64,
}

impl CardinalityResponse {
    /// Approximate distinct count. The store's cardinality aggregation is
    /// inexact above its precision threshold, which is fine here: the value
    /// only sizes partitions.
    pub fn value(&self) -> u64 {
        self.aggregations.adswizz_ids.value.max(0.0) as u64
    }
}

// ---------------------------------------------------------------------------
// Partitioned nested terms aggregation

#[derive(Debug, Serialize)]
pub struct AggregationRequest<'a> {
    size: u32,
    query: &'a WindowQuery,
    aggs: GroupingAggs,
}

#[derive(Debug, Serialize)]
struct GroupingAggs {
    adswizz_ids: GroupingTermsAgg,
}

#[derive(Debug, Serialize)]
struct GroupingTermsAgg {
    terms: PartitionedTerms,
    aggs: PartnerAggsWrapper,
}

#[derive(Debug, Serialize)]
struct PartitionedTerms {
    field: &'static str,
    include: PartitionInclude,
    size: u32,
}

/// One shard of the logical terms aggregation. The store hashes bucket keys
/// into `num_partitions` disjoint sets and returns only set `partition`.
#[derive(Debug, Serialize)]
pub struct PartitionInclude {
    pub partition: u32,
    pub num_partitions: u32,
}

#[derive(Debug, Serialize)]
struct PartnerAggsWrapper {
    partnerkeys: PartnerTermsAgg,
}

#[derive(Debug, Serialize)]
struct PartnerTermsAgg {
    terms: SimpleTerms,
    aggs: PartnerSubAggs,
}

#[derive(Debug, Serialize)]
struct SimpleTerms {
    field: &'static str,
    size: u32,
}

#[derive(Debug, Serialize)]
struct PartnerSubAggs {
    last_activity: MaxAgg,
    #[serde(rename = "cmp-userids")]
    cmp_userids: TermsOnly,
    latest: TopHitsAgg,
}

#[derive(Debug, Serialize)]
struct MaxAgg {
    max: FormattedField,
}

#[derive(Debug, Serialize)]
struct FormattedField {
    field: &'static str,
    format: &'static str,
}

#[derive(Debug, Serialize)]
struct TermsOnly {
    terms: FieldRef,
}

#[derive(Debug, Serialize)]
struct TopHitsAgg {
    top_hits: TopHits,
}

#[derive(Debug, Serialize)]
struct TopHits {
    size: u32,
    #[serde(rename = "_source")]
    source: SourceIncludes,
    sort: SortByOccurredOn,
}

#[derive(Debug, Serialize)]
struct SourceIncludes {
    includes: [&'static str; 5],
}

#[derive(Debug, Serialize)]
struct SortByOccurredOn {
    #[serde(rename = "payload.occurredon")]
    occurredon: &'static str,
}

impl<'a> AggregationRequest<'a> {
    pub fn new(query: &'a WindowQuery, partition: u32, num_partitions: u32) -> Self {
        Self {
            size: 0,
            query,
            aggs: GroupingAggs {
                adswizz_ids: GroupingTermsAgg {
                    terms: PartitionedTerms {
                        field: GROUPING_ID_FIELD,
                        include: PartitionInclude {
                            partition,
                            num_partitions,
                        },
                        size: MAX_ID_BUCKETS,
                    },
                    aggs: PartnerAggsWrapper {
                        partnerkeys: PartnerTermsAgg {
                            terms: SimpleTerms {
                                field: PARTNER_FIELD,
                                size: MAX_PARTNER_BUCKETS,
                            },
                            aggs: PartnerSubAggs {
                                last_activity: MaxAgg {
                                    max: FormattedField {
                                        field: OCCURRED_ON_FIELD,
                                        format: LAST_ACTIVITY_FORMAT,
                                    },
                                },
                                cmp_userids: TermsOnly {
                                    terms: FieldRef {
                                        field: SECONDARY_ID_FIELD,
                                    },
                                },
                                latest: TopHitsAgg {
                                    top_hits: TopHits {
                                        size: 1,
                                        source: SourceIncludes {
                                            includes: [
                                                SECONDARY_ID_FIELD,
                                                UUID_FIELD,
                                                OCCURRED_ON_FIELD,
                                                PARTNER_FIELD,
                                                TC_STRING_FIELD,
                                            ],
                                        },
                                        sort: SortByOccurredOn { occurredon: "desc" },
                                    },
                                },
                            },
                        },
                    },
                },
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation response bucket tree

#[derive(Debug, Deserialize)]
pub struct AggregationResponse {
    pub aggregations: GroupingBuckets,
}

#[derive(Debug, Deserialize)]
pub struct GroupingBuckets {
    pub adswizz_ids: Buckets<IdBucket>,
}

#[derive(Debug, Deserialize)]
pub struct Buckets<T> {
    #[serde(default = "Vec::new")]
    pub buckets: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct IdBucket {
    pub key: String,
    pub partnerkeys: Buckets<PartnerBucket>,
}

#[derive(Debug, Deserialize)]
pub struct PartnerBucket {
    pub key: String,
    pub last_activity: MaxValue,
    #[serde(rename = "cmp-userids")]
    pub cmp_userids: Buckets<KeyOnlyBucket>,
    pub latest: TopHitsResult,
}

#[derive(Debug, Deserialize)]
pub struct KeyOnlyBucket {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct MaxValue {
    pub value_as_string: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopHitsResult {
    pub hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default = "Vec::new")]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
pub struct Hit {
    #[serde(rename = "_source")]
    pub source: LatestSource,
}

/// `_source` of the most recent event in a partner bucket, filtered down to
/// the fields the top-hits aggregation requests.
#[derive(Debug, Default, Deserialize)]
pub struct LatestSource {
    pub uuid: Option<String>,
    #[serde(default)]
    pub payload: LatestPayload,
    #[serde(default)]
    pub identifiers_flat: LatestIdentifiers,
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestPayload {
    pub tc_string: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestIdentifiers {
    #[serde(rename = "cmp-userid", default = "Vec::new")]
    pub cmp_userid: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn window_query_matches_store_syntax() {
        let query = WindowQuery::new("2024-03-14T00:00:00Z", "2024-03-15T00:00:00Z");
        assert_eq!(
            to_value(&query).unwrap(),
            json!({
                "bool": {
                    "must": [
                        {"range": {"createdon": {
                            "gte": "2024-03-14T00:00:00Z",
                            "lt": "2024-03-15T00:00:00Z"
                        }}}
                    ]
                }
            })
        );
    }

    #[test]
    fn purge_request_filters_on_last_activity() {
        let body = to_value(PurgeRequest::new("2024-02-14T00:00:00Z")).unwrap();
        assert_eq!(
            body,
            json!({
                "query": {
                    "bool": {
                        "filter": [
                            {"range": {"last_activity": {"lt": "2024-02-14T00:00:00Z"}}}
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn cardinality_request_is_zero_hit() {
        let query = WindowQuery::new("a", "b");
        let body = to_value(CardinalityRequest::new(&query)).unwrap();
        assert_eq!(body["size"], json!(0));
        assert_eq!(
            body["aggs"]["adswizz_ids"]["cardinality"]["field"],
            json!(GROUPING_ID_FIELD)
        );
    }

    #[test]
    fn aggregation_request_carries_partition_and_caps() {
        let query = WindowQuery::new("a", "b");
        let body = to_value(AggregationRequest::new(&query, 3, 26)).unwrap();

        let terms = &body["aggs"]["adswizz_ids"]["terms"];
        assert_eq!(terms["field"], json!(GROUPING_ID_FIELD));
        assert_eq!(terms["size"], json!(6000));
        assert_eq!(terms["include"], json!({"partition": 3, "num_partitions": 26}));

        let partners = &body["aggs"]["adswizz_ids"]["aggs"]["partnerkeys"];
        assert_eq!(partners["terms"]["size"], json!(500));

        let subs = &partners["aggs"];
        assert_eq!(subs["last_activity"]["max"]["field"], json!(OCCURRED_ON_FIELD));
        assert_eq!(subs["cmp-userids"]["terms"]["field"], json!(SECONDARY_ID_FIELD));

        let top = &subs["latest"]["top_hits"];
        assert_eq!(top["size"], json!(1));
        assert_eq!(top["sort"], json!({"payload.occurredon": "desc"}));
        assert_eq!(
            top["_source"]["includes"],
            json!([
                "identifiers_flat.cmp-userid",
                "uuid",
                "payload.occurredon",
                "partnerkey",
                "payload.tc_string"
            ])
        );
    }

    #[test]
    fn cardinality_response_truncates_toward_zero() {
        let response: CardinalityResponse = serde_json::from_value(json!({
            "aggregations": {"adswizz_ids": {"value": 119999.7}}
        }))
        .unwrap();
        assert_eq!(response.value(), 119_999);
    }
}
