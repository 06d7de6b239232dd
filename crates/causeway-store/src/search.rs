//! Typed search model
//!
//! Covers the query shapes the engines actually issue: a bool filter of
//! time range + term filters + an optional phrase group, with nested
//! aggregations (terms, date histogram, top hits). Responses carry the
//! total hit count plus a parsed aggregation tree.

use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// Build a single-key JSON object (for dynamic field names)
fn obj(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Search request builder
///
/// All filters combine under a `bool.must`; message phrases form a
/// `should` group with `minimum_should_match: 1` inside it.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    size: usize,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    levels: Vec<String>,
    terms: Vec<(String, Value)>,
    phrases: Vec<String>,
    sort_desc: Option<String>,
    aggs: IndexMap<String, Aggregation>,
}

impl SearchRequest {
    /// Create a request that returns up to `size` hits
    #[inline]
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Create an aggregation-only request (no hits returned)
    #[inline]
    #[must_use]
    pub fn counts() -> Self {
        Self::new(0)
    }

    /// Restrict to `[start, end)` on the `timestamp` field
    #[must_use]
    pub fn window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window = Some((start, end));
        self
    }

    /// Restrict to the given log levels (terms filter on `level`)
    #[must_use]
    pub fn levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.levels = levels.into_iter().map(Into::into).collect();
        self
    }

    /// Add an exact term filter on an arbitrary field
    #[must_use]
    pub fn term(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    /// Match any of the given phrases on the `message` field
    #[must_use]
    pub fn phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    /// Sort hits by a field, newest first
    #[must_use]
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort_desc = Some(field.into());
        self
    }

    /// Attach a named aggregation
    #[must_use]
    pub fn agg(mut self, name: impl Into<String>, agg: Aggregation) -> Self {
        self.aggs.insert(name.into(), agg);
        self
    }

    /// Render the request as a query-DSL body
    #[must_use]
    pub fn to_body(&self) -> Value {
        let mut must: Vec<Value> = Vec::new();

        if let Some((start, end)) = self.window {
            must.push(obj(
                "range",
                obj(
                    "timestamp",
                    json!({
                        "gte": format_timestamp(start),
                        "lt": format_timestamp(end),
                    }),
                ),
            ));
        }
        if !self.levels.is_empty() {
            must.push(obj("terms", obj("level", json!(self.levels))));
        }
        for (field, value) in &self.terms {
            must.push(obj("term", obj(field, value.clone())));
        }
        if !self.phrases.is_empty() {
            let should: Vec<Value> = self
                .phrases
                .iter()
                .map(|p| obj("match_phrase", obj("message", json!(p))))
                .collect();
            must.push(json!({
                "bool": {
                    "should": should,
                    "minimum_should_match": 1,
                }
            }));
        }

        let mut body = json!({
            "size": self.size,
            "query": {
                "bool": {
                    "must": must,
                }
            }
        });

        if let Some(field) = &self.sort_desc {
            body["sort"] = json!([obj(field, json!({"order": "desc"}))]);
        }
        if !self.aggs.is_empty() {
            let mut aggs = Map::new();
            for (name, agg) in &self.aggs {
                aggs.insert(name.clone(), agg.to_body());
            }
            body["aggs"] = Value::Object(aggs);
        }

        body
    }
}

/// Aggregation kinds the engines use
#[derive(Debug, Clone)]
enum AggKind {
    Terms {
        field: String,
        size: usize,
        missing: Option<String>,
    },
    DateHistogram {
        field: String,
        fixed_interval: Option<String>,
        calendar_interval: Option<String>,
    },
    TopHits {
        size: usize,
        source: Vec<String>,
        sort_desc: Option<String>,
    },
}

/// A named aggregation with optional nested sub-aggregations
#[derive(Debug, Clone)]
pub struct Aggregation {
    kind: AggKind,
    subs: IndexMap<String, Aggregation>,
}

impl Aggregation {
    /// Group by the distinct values of a field
    #[must_use]
    pub fn terms(field: impl Into<String>, size: usize) -> Self {
        Self {
            kind: AggKind::Terms {
                field: field.into(),
                size,
                missing: None,
            },
            subs: IndexMap::new(),
        }
    }

    /// Bucket key used for documents missing the terms field
    #[must_use]
    pub fn missing(mut self, value: impl Into<String>) -> Self {
        if let AggKind::Terms { missing, .. } = &mut self.kind {
            *missing = Some(value.into());
        }
        self
    }

    /// Fixed-width time buckets (e.g. `"1m"`)
    #[must_use]
    pub fn date_histogram(field: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            kind: AggKind::DateHistogram {
                field: field.into(),
                fixed_interval: Some(interval.into()),
                calendar_interval: None,
            },
            subs: IndexMap::new(),
        }
    }

    /// Calendar-aligned time buckets (e.g. `"day"`)
    #[must_use]
    pub fn calendar_histogram(field: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            kind: AggKind::DateHistogram {
                field: field.into(),
                fixed_interval: None,
                calendar_interval: Some(interval.into()),
            },
            subs: IndexMap::new(),
        }
    }

    /// Sample the top `size` documents per bucket, newest first
    #[must_use]
    pub fn top_hits<I, S>(size: usize, source: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: AggKind::TopHits {
                size,
                source: source.into_iter().map(Into::into).collect(),
                sort_desc: Some("timestamp".to_string()),
            },
            subs: IndexMap::new(),
        }
    }

    /// Attach a nested sub-aggregation
    #[must_use]
    pub fn sub(mut self, name: impl Into<String>, agg: Aggregation) -> Self {
        self.subs.insert(name.into(), agg);
        self
    }

    fn to_body(&self) -> Value {
        let mut body = match &self.kind {
            AggKind::Terms { field, size, missing } => {
                let mut terms = json!({"field": field, "size": size});
                if let Some(m) = missing {
                    terms["missing"] = json!(m);
                }
                obj("terms", terms)
            }
            AggKind::DateHistogram {
                field,
                fixed_interval,
                calendar_interval,
            } => {
                let mut histogram = json!({"field": field});
                if let Some(i) = fixed_interval {
                    histogram["fixed_interval"] = json!(i);
                }
                if let Some(i) = calendar_interval {
                    histogram["calendar_interval"] = json!(i);
                }
                obj("date_histogram", histogram)
            }
            AggKind::TopHits { size, source, sort_desc } => {
                let mut hits = json!({"size": size, "_source": source});
                if let Some(field) = sort_desc {
                    hits["sort"] = json!([obj(field, json!({"order": "desc"}))]);
                }
                obj("top_hits", hits)
            }
        };

        if !self.subs.is_empty() {
            let mut aggs = Map::new();
            for (name, agg) in &self.subs {
                aggs.insert(name.clone(), agg.to_body());
            }
            body["aggs"] = Value::Object(aggs);
        }

        body
    }
}

/// One bucket of a terms or date-histogram aggregation
#[derive(Debug, Clone, Default)]
pub struct AggBucket {
    /// Display key of the bucket
    pub key: String,
    /// Parsed timestamp, when the key is a date-histogram boundary
    pub timestamp: Option<DateTime<Utc>>,
    /// Number of documents in the bucket
    pub doc_count: u64,
    /// Nested aggregation results
    pub aggregations: IndexMap<String, AggResult>,
}

impl AggBucket {
    /// Create a plain bucket
    #[must_use]
    pub fn new(key: impl Into<String>, doc_count: u64) -> Self {
        Self {
            key: key.into(),
            doc_count,
            ..Self::default()
        }
    }

    /// Look up a nested aggregation by name
    #[inline]
    #[must_use]
    pub fn agg(&self, name: &str) -> Option<&AggResult> {
        self.aggregations.get(name)
    }
}

/// Parsed result of one named aggregation
#[derive(Debug, Clone)]
pub enum AggResult {
    /// Bucketed result (terms, date histogram)
    Buckets(Vec<AggBucket>),
    /// Sampled documents (top hits)
    Hits(Vec<Value>),
}

impl AggResult {
    /// Buckets of this result (empty for a hits result)
    #[must_use]
    pub fn buckets(&self) -> &[AggBucket] {
        match self {
            AggResult::Buckets(buckets) => buckets,
            AggResult::Hits(_) => &[],
        }
    }

    /// Sampled documents of this result (empty for a bucketed result)
    #[must_use]
    pub fn hits(&self) -> &[Value] {
        match self {
            AggResult::Hits(hits) => hits,
            AggResult::Buckets(_) => &[],
        }
    }

    /// `(key, doc_count)` pairs of a bucketed result
    #[must_use]
    pub fn bucket_counts(&self) -> Vec<(String, u64)> {
        self.buckets()
            .iter()
            .map(|b| (b.key.clone(), b.doc_count))
            .collect()
    }
}

/// Parsed search response
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    /// Total matching document count
    pub total: u64,
    /// Returned hit sources (up to the request's `size`)
    pub hits: Vec<Value>,
    /// Named aggregation results
    pub aggregations: IndexMap<String, AggResult>,
}

impl SearchResponse {
    /// Empty response (zero hits, no aggregations)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up an aggregation result by name
    #[inline]
    #[must_use]
    pub fn agg(&self, name: &str) -> Option<&AggResult> {
        self.aggregations.get(name)
    }

    /// Parse a response body returned by the store
    pub fn from_body(body: &Value) -> Result<Self, StoreError> {
        let total = body
            .pointer("/hits/total/value")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::MalformedResponse("missing hits.total.value".to_string()))?;

        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .filter_map(|h| h.get("_source").cloned())
                    .collect()
            })
            .unwrap_or_default();

        let mut aggregations = IndexMap::new();
        if let Some(aggs) = body.get("aggregations").and_then(Value::as_object) {
            for (name, node) in aggs {
                if let Some(result) = parse_agg_result(node) {
                    aggregations.insert(name.clone(), result);
                }
            }
        }

        Ok(Self {
            total,
            hits,
            aggregations,
        })
    }
}

fn parse_agg_result(node: &Value) -> Option<AggResult> {
    if let Some(buckets) = node.get("buckets").and_then(Value::as_array) {
        return Some(AggResult::Buckets(
            buckets.iter().filter_map(parse_bucket).collect(),
        ));
    }
    if let Some(hits) = node.pointer("/hits/hits").and_then(Value::as_array) {
        return Some(AggResult::Hits(
            hits.iter().filter_map(|h| h.get("_source").cloned()).collect(),
        ));
    }
    None
}

fn parse_bucket(node: &Value) -> Option<AggBucket> {
    let doc_count = node.get("doc_count").and_then(Value::as_u64)?;

    let key_as_string = node.get("key_as_string").and_then(Value::as_str);
    let key = match (key_as_string, node.get("key")) {
        (Some(s), _) => s.to_string(),
        (None, Some(Value::String(s))) => s.clone(),
        (None, Some(other)) => other.to_string(),
        (None, None) => return None,
    };
    let timestamp = key_as_string
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));

    let mut aggregations = IndexMap::new();
    if let Some(fields) = node.as_object() {
        for (name, sub) in fields {
            if matches!(name.as_str(), "key" | "key_as_string" | "doc_count") {
                continue;
            }
            if let Some(result) = parse_agg_result(sub) {
                aggregations.insert(name.clone(), result);
            }
        }
    }

    Some(AggBucket {
        key,
        timestamp,
        doc_count,
        aggregations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 1, 0, 0).unwrap(),
        )
    }

    #[test]
    fn request_body_combines_filters() {
        let (start, end) = window();
        let body = SearchRequest::counts()
            .window(start, end)
            .levels(["ERROR", "WARN"])
            .term("service", "api-gateway")
            .to_body();

        assert_eq!(body["size"], json!(0));
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 3);
        assert_eq!(must[0]["range"]["timestamp"]["gte"], json!("2024-04-01T00:00:00.000Z"));
        assert_eq!(must[0]["range"]["timestamp"]["lt"], json!("2024-04-01T01:00:00.000Z"));
        assert_eq!(must[1]["terms"]["level"], json!(["ERROR", "WARN"]));
        assert_eq!(must[2]["term"]["service"], json!("api-gateway"));
    }

    #[test]
    fn phrase_group_requires_one_match() {
        let body = SearchRequest::new(100)
            .phrases(["deployment", "rollout"])
            .sort_desc("timestamp")
            .to_body();

        let group = &body["query"]["bool"]["must"][0]["bool"];
        assert_eq!(group["minimum_should_match"], json!(1));
        assert_eq!(
            group["should"][0]["match_phrase"]["message"],
            json!("deployment")
        );
        assert_eq!(body["sort"][0]["timestamp"]["order"], json!("desc"));
    }

    #[test]
    fn nested_aggregations_render() {
        let body = SearchRequest::counts()
            .agg(
                "by_service",
                Aggregation::terms("service", 100)
                    .sub("by_error_type", Aggregation::terms("error_type", 10).missing("Unknown"))
                    .sub("error_timeline", Aggregation::date_histogram("timestamp", "1m")),
            )
            .to_body();

        let by_service = &body["aggs"]["by_service"];
        assert_eq!(by_service["terms"]["field"], json!("service"));
        assert_eq!(
            by_service["aggs"]["by_error_type"]["terms"]["missing"],
            json!("Unknown")
        );
        assert_eq!(
            by_service["aggs"]["error_timeline"]["date_histogram"]["fixed_interval"],
            json!("1m")
        );
    }

    #[test]
    fn calendar_histogram_renders_calendar_interval() {
        let body = SearchRequest::counts()
            .agg("errors_per_day", Aggregation::calendar_histogram("timestamp", "day"))
            .to_body();

        let histogram = &body["aggs"]["errors_per_day"]["date_histogram"];
        assert_eq!(histogram["calendar_interval"], json!("day"));
        assert!(histogram.get("fixed_interval").is_none());
    }

    #[test]
    fn response_parses_nested_buckets() {
        let body = json!({
            "hits": {"total": {"value": 17}, "hits": []},
            "aggregations": {
                "by_service": {
                    "buckets": [
                        {
                            "key": "auth-service",
                            "doc_count": 12,
                            "by_error_type": {
                                "buckets": [
                                    {"key": "Timeout", "doc_count": 9},
                                    {"key": "Unknown", "doc_count": 3}
                                ]
                            },
                            "error_timeline": {
                                "buckets": [
                                    {
                                        "key": 1712102400000i64,
                                        "key_as_string": "2024-04-03T00:00:00.000Z",
                                        "doc_count": 12
                                    }
                                ]
                            }
                        }
                    ]
                }
            }
        });

        let response = SearchResponse::from_body(&body).unwrap();
        assert_eq!(response.total, 17);

        let services = response.agg("by_service").unwrap().buckets();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].key, "auth-service");
        assert_eq!(services[0].doc_count, 12);

        let types = services[0].agg("by_error_type").unwrap().bucket_counts();
        assert_eq!(types, vec![("Timeout".to_string(), 9), ("Unknown".to_string(), 3)]);

        let timeline = services[0].agg("error_timeline").unwrap().buckets();
        assert!(timeline[0].timestamp.is_some());
    }

    #[test]
    fn response_parses_top_hits() {
        let body = json!({
            "hits": {"total": {"value": 3}, "hits": []},
            "aggregations": {
                "samples": {
                    "hits": {
                        "hits": [
                            {"_source": {"message": "connection refused"}},
                            {"_source": {"message": "pool exhausted"}}
                        ]
                    }
                }
            }
        });

        let response = SearchResponse::from_body(&body).unwrap();
        let samples = response.agg("samples").unwrap().hits();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0]["message"], json!("connection refused"));
    }

    #[test]
    fn numeric_bucket_keys_become_strings() {
        let body = json!({
            "hits": {"total": {"value": 5}, "hits": []},
            "aggregations": {
                "status_codes": {
                    "buckets": [
                        {"key": 500, "doc_count": 4},
                        {"key": 503, "doc_count": 1}
                    ]
                }
            }
        });

        let response = SearchResponse::from_body(&body).unwrap();
        let codes = response.agg("status_codes").unwrap().bucket_counts();
        assert_eq!(codes, vec![("500".to_string(), 4), ("503".to_string(), 1)]);
    }

    #[test]
    fn missing_total_is_malformed() {
        let body = json!({"hits": {}});
        let err = SearchResponse::from_body(&body).unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse(_)));
    }
}
