//! Prometheus HTTP API client
//!
//! Issues instant and range queries against `/api/v1/query` and
//! `/api/v1/query_range` and converts the `vector`/`matrix` payloads into
//! per-pod samples. Values that do not parse as finite numbers become absent
//! samples; series without a `pod` label are skipped.

use super::{QueryError, QuerySource, RangeWindow};
use crate::models::{InstantEntry, InstantResult, RangeResult, Sample, SeriesEntry};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const INSTANT_QUERY_PATH: &str = "api/v1/query";
pub const RANGE_QUERY_PATH: &str = "api/v1/query_range";

/// Label carrying the pod identifier in every result series
const POD_LABEL: &str = "pod";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    data: Option<ResponseData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum ResponseData {
    Vector(Vec<VectorSeries>),
    Matrix(Vec<MatrixSeries>),
    Scalar(IgnoredAny),
    String(IgnoredAny),
}

impl ResponseData {
    fn name(&self) -> &'static str {
        match self {
            ResponseData::Vector(_) => "vector",
            ResponseData::Matrix(_) => "matrix",
            ResponseData::Scalar(_) => "scalar",
            ResponseData::String(_) => "string",
        }
    }
}

#[derive(Debug, Deserialize)]
struct VectorSeries {
    metric: HashMap<String, String>,
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    metric: HashMap<String, String>,
    values: Vec<(f64, String)>,
}

fn to_sample((timestamp, raw): (f64, String)) -> Sample {
    Sample {
        timestamp,
        value: raw.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

fn pod_name(mut metric: HashMap<String, String>) -> Option<String> {
    let pod = metric.remove(POD_LABEL);
    if pod.is_none() {
        debug!(labels = ?metric, "Skipping series without pod label");
    }
    pod
}

/// Query client for the Prometheus HTTP API
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    base_url: Url,
}

impl PrometheusClient {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(timeout).build()?;

        let mut base_url = Url::parse(base_url)?;
        // Keep any path prefix when joining the API paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<ResponseData, QueryError> {
        let url = self.base_url.join(path)?;

        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed = serde_json::from_str::<ApiResponse>(&body);

        if !status.is_success() {
            return Err(match parsed {
                Ok(ApiResponse {
                    error_type: Some(error_type),
                    error: Some(message),
                    ..
                }) => QueryError::Backend {
                    error_type,
                    message,
                },
                _ => QueryError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let api = parsed?;
        if api.status != "success" {
            return Err(QueryError::Backend {
                error_type: api.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: api.error.unwrap_or_default(),
            });
        }

        api.data.ok_or(QueryError::UnexpectedResultType {
            expected: "vector or matrix",
            actual: "none",
        })
    }
}

#[async_trait]
impl QuerySource for PrometheusClient {
    async fn instant(&self, query: &str, time: f64) -> Result<InstantResult, QueryError> {
        let params = [
            ("query", query.to_string()),
            ("time", format!("{:.3}", time)),
        ];

        match self.fetch(INSTANT_QUERY_PATH, &params).await? {
            ResponseData::Vector(series) => Ok(series
                .into_iter()
                .filter_map(|s| {
                    Some(InstantEntry {
                        pod: pod_name(s.metric)?,
                        sample: to_sample(s.value),
                    })
                })
                .collect()),
            other => Err(QueryError::UnexpectedResultType {
                expected: "vector",
                actual: other.name(),
            }),
        }
    }

    async fn range(&self, query: &str, window: RangeWindow) -> Result<RangeResult, QueryError> {
        let params = [
            ("query", query.to_string()),
            ("start", format!("{:.3}", window.start)),
            ("end", format!("{:.3}", window.end)),
            ("step", window.step.as_secs_f64().to_string()),
        ];

        match self.fetch(RANGE_QUERY_PATH, &params).await? {
            ResponseData::Matrix(series) => Ok(series
                .into_iter()
                .filter_map(|s| {
                    Some(SeriesEntry {
                        pod: pod_name(s.metric)?,
                        samples: s.values.into_iter().map(to_sample).collect(),
                    })
                })
                .collect()),
            other => Err(QueryError::UnexpectedResultType {
                expected: "matrix",
                actual: other.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{MEMORY_USAGE_QUERY, CPU_USAGE_QUERY};
    use mockito::Matcher;

    const VECTOR_BODY: &str = r#"{
        "status": "success",
        "data": {
            "resultType": "vector",
            "result": [
                {"metric": {"pod": "api-7d9f"}, "value": [1700000000.0, "200000000"]},
                {"metric": {"pod": "worker-1"}, "value": [1700000000.0, "NaN"]},
                {"metric": {}, "value": [1700000000.0, "5"]}
            ]
        }
    }"#;

    const MATRIX_BODY: &str = r#"{
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [
                {"metric": {"pod": "api-7d9f"}, "values": [
                    [1699913600.0, "0.25"],
                    [1699913960.0, "+Inf"],
                    [1699914320.0, "0.5"]
                ]}
            ]
        }
    }"#;

    fn client(url: &str) -> PrometheusClient {
        PrometheusClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_instant_query_parses_vector() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), MEMORY_USAGE_QUERY.into()),
                Matcher::UrlEncoded("time".into(), "1700000000.000".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(VECTOR_BODY)
            .create_async()
            .await;

        let result = client(&server.url())
            .instant(MEMORY_USAGE_QUERY, 1_700_000_000.0)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].pod, "api-7d9f");
        assert_eq!(result[0].sample.value, Some(200_000_000.0));
        assert_eq!(result[1].pod, "worker-1");
        assert_eq!(result[1].sample.value, None);
    }

    #[tokio::test]
    async fn test_range_query_parses_matrix() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query_range")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), CPU_USAGE_QUERY.into()),
                Matcher::UrlEncoded("start".into(), "1699913600.000".into()),
                Matcher::UrlEncoded("end".into(), "1700000000.000".into()),
                Matcher::UrlEncoded("step".into(), "360".into()),
            ]))
            .with_status(200)
            .with_body(MATRIX_BODY)
            .create_async()
            .await;

        let window = RangeWindow::ending_at(
            1_700_000_000.0,
            Duration::from_secs(86_400),
            Duration::from_secs(360),
        );
        let result = client(&server.url())
            .range(CPU_USAGE_QUERY, window)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.len(), 1);
        let values: Vec<_> = result[0].samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![Some(0.25), None, Some(0.5)]);
    }

    #[tokio::test]
    async fn test_base_url_path_prefix_is_kept() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/prometheus/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#)
            .create_async()
            .await;

        let url = format!("{}/prometheus", server.url());
        let result = client(&url).instant(MEMORY_USAGE_QUERY, 0.0).await.unwrap();

        mock.assert_async().await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .instant("sum(", 0.0)
            .await
            .unwrap_err();

        match err {
            QueryError::Backend {
                error_type,
                message,
            } => {
                assert_eq!(error_type, "bad_data");
                assert_eq!(message, "parse error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_without_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client(&server.url())
            .instant(MEMORY_USAGE_QUERY, 0.0)
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Status { status: 502, .. }));
        assert_eq!(err.kind(), "http_status");
    }

    #[tokio::test]
    async fn test_scalar_result_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000,"42"]}}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .instant(MEMORY_USAGE_QUERY, 0.0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QueryError::UnexpectedResultType {
                expected: "vector",
                actual: "scalar"
            }
        ));
    }

    #[tokio::test]
    async fn test_wrong_result_type() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(MATRIX_BODY)
            .create_async()
            .await;

        let err = client(&server.url())
            .instant(MEMORY_USAGE_QUERY, 0.0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QueryError::UnexpectedResultType {
                expected: "vector",
                actual: "matrix"
            }
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = PrometheusClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, QueryError::InvalidUrl(_)));
    }
}
