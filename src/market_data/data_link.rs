// =============================================================================
// Nasdaq Data Link (formerly Quandl) datatable client
// =============================================================================
//
// Reads daily closes from a datatable such as WIKI/PRICES:
//
//   GET {base}/datatables/{table}.json?ticker=FB&qopts.columns=date,close
//       &date.gte=2014-01-02&date.lte=2014-12-31&api_key=...
//
// Large ranges are paged; `meta.next_cursor_id` is passed back as
// `qopts.cursor_id` until it comes back null.
//
// SECURITY: the API key travels as a query parameter, so transport errors are
// stripped of their URL before they are surfaced or logged.
// =============================================================================

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::source::{finish_series, FetchError, PriceSeriesSource, SourceFailure};
use crate::date_range::DateRange;
use crate::runtime_config::RuntimeConfig;
use crate::types::{PricePoint, PriceSeries, Ticker};

const DATE_COLUMN: &str = "date";
const CLOSE_COLUMN: &str = "close";
const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Provider API key. Never logged or printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from `NASDAQ_DATA_LINK_API_KEY`, falling back to the
    /// legacy `QUANDL_API_KEY`.
    pub fn from_env() -> Option<Self> {
        ["NASDAQ_DATA_LINK_API_KEY", "QUANDL_API_KEY"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .map(Self)
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DatatableResponse {
    datatable: Datatable,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Datatable {
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    columns: Vec<Column>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    next_cursor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    quandl_error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// One decoded page of rows.
#[derive(Debug)]
struct Page {
    points: Vec<PricePoint>,
    next_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Datatable client implementing [`PriceSeriesSource`].
#[derive(Clone)]
pub struct DataLinkClient {
    api_key: ApiKey,
    base_url: String,
    datatable: String,
    max_pages: u32,
    client: reqwest::Client,
}

impl DataLinkClient {
    /// Build a client for the endpoint and table named in `config`.
    pub fn new(api_key: ApiKey, config: &RuntimeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        debug!(base_url = %base_url, datatable = %config.datatable, "DataLinkClient initialised");

        Ok(Self {
            api_key,
            base_url,
            datatable: config.datatable.clone(),
            max_pages: config.max_pages.max(1),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/datatables/{}.json", self.base_url, self.datatable)
    }

    /// Fetch every page of closes for `ticker` within `range`.
    #[instrument(
        skip_all,
        fields(ticker = %ticker, range = %range),
        name = "data_link::fetch_closes"
    )]
    async fn fetch_closes(
        &self,
        ticker: &Ticker,
        range: &DateRange,
    ) -> Result<PriceSeries, FetchError> {
        let url = self.endpoint();
        let mut points = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 1..=self.max_pages {
            let mut query: Vec<(&str, String)> = vec![
                ("ticker", ticker.as_str().to_string()),
                ("qopts.columns", format!("{DATE_COLUMN},{CLOSE_COLUMN}")),
                ("date.gte", range.start().format(QUERY_DATE_FORMAT).to_string()),
                ("date.lte", range.end().format(QUERY_DATE_FORMAT).to_string()),
                ("api_key", self.api_key.expose().to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("qopts.cursor_id", c.clone()));
            }

            let resp = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| SourceFailure::Request(e.without_url().to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!(error = %e.without_url(), "failed to read error body");
                        String::new()
                    }
                };
                let failure = failure_for_status(status.as_u16(), &body);
                warn!(status = status.as_u16(), error = %failure, "datatable request rejected");
                return Err(failure.into());
            }

            let body: DatatableResponse = resp
                .json()
                .await
                .map_err(|e| SourceFailure::Malformed(e.without_url().to_string()))?;

            let page = decode_page(body)?;
            debug!(page = page_no, rows = page.points.len(), "datatable page received");
            points.extend(page.points);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return finish_series(PriceSeries::from_points(points), ticker, range),
            }
        }

        Err(SourceFailure::Malformed(format!(
            "pagination did not finish within {} pages",
            self.max_pages
        ))
        .into())
    }
}

impl PriceSeriesSource for DataLinkClient {
    async fn fetch(&self, ticker: &Ticker, range: &DateRange) -> Result<PriceSeries, FetchError> {
        self.fetch_closes(ticker, range).await
    }
}

impl std::fmt::Debug for DataLinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLinkClient")
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .field("datatable", &self.datatable)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

/// Map a non-success status and its body to a [`SourceFailure`].
fn failure_for_status(status: u16, body: &str) -> SourceFailure {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => format!("{} {}", err.quandl_error.code, err.quandl_error.message)
            .trim()
            .to_string(),
        Err(_) => body.trim().to_string(),
    };

    match status {
        401 | 403 => SourceFailure::Unauthorized(message),
        404 => SourceFailure::NotFound(message),
        429 => SourceFailure::RateLimited(message),
        500..=599 => SourceFailure::Server { status, message },
        _ => SourceFailure::Http { status, message },
    }
}

/// Decode one page. Rows with a null or non-finite close are skipped; any
/// other structural problem fails the whole fetch.
fn decode_page(body: DatatableResponse) -> Result<Page, SourceFailure> {
    let column = |name: &str| {
        body.datatable
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SourceFailure::Malformed(format!("response has no '{name}' column")))
    };
    let date_idx = column(DATE_COLUMN)?;
    let close_idx = column(CLOSE_COLUMN)?;

    let mut points = Vec::with_capacity(body.datatable.data.len());
    for row in &body.datatable.data {
        let (Some(date_val), Some(close_val)) = (row.get(date_idx), row.get(close_idx)) else {
            return Err(SourceFailure::Malformed(format!(
                "row has {} values, expected at least {}",
                row.len(),
                date_idx.max(close_idx) + 1
            )));
        };

        let date = date_val
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, QUERY_DATE_FORMAT).ok())
            .ok_or_else(|| SourceFailure::Malformed(format!("unparseable date: {date_val}")))?;

        match parse_close(close_val) {
            Some(close) => points.push(PricePoint::new(date, close)),
            None => warn!(%date, value = %close_val, "skipping row without a usable close"),
        }
    }

    Ok(Page {
        points,
        next_cursor: body.meta.next_cursor_id,
    })
}

/// Accept a JSON number or numeric string.
fn parse_close(val: &serde_json::Value) -> Option<f64> {
    let close = match val {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    close.is_finite().then_some(close)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn response(value: serde_json::Value) -> DatatableResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_rows_by_column_name() {
        let body = response(json!({
            "datatable": {
                "data": [[54.71, "2014-01-02"], [54.56, "2014-01-03"]],
                "columns": [
                    {"name": "close", "type": "BigDecimal(34,12)"},
                    {"name": "date", "type": "Date"}
                ]
            },
            "meta": {"next_cursor_id": null}
        }));
        let page = decode_page(body).unwrap();
        assert_eq!(
            page.points,
            vec![
                PricePoint::new(d(2014, 1, 2), 54.71),
                PricePoint::new(d(2014, 1, 3), 54.56),
            ]
        );
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn cursor_is_returned() {
        let body = response(json!({
            "datatable": {
                "data": [["2014-01-02", 1.0]],
                "columns": [{"name": "date"}, {"name": "close"}]
            },
            "meta": {"next_cursor_id": "abc123"}
        }));
        assert_eq!(decode_page(body).unwrap().next_cursor.as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_meta_means_last_page() {
        let body = response(json!({
            "datatable": {"data": [], "columns": [{"name": "date"}, {"name": "close"}]}
        }));
        let page = decode_page(body).unwrap();
        assert!(page.points.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn null_and_string_closes() {
        let body = response(json!({
            "datatable": {
                "data": [
                    ["2014-01-02", null],
                    ["2014-01-03", "55.25"],
                    ["2014-01-06", "NaN"]
                ],
                "columns": [{"name": "date"}, {"name": "close"}]
            }
        }));
        let page = decode_page(body).unwrap();
        assert_eq!(page.points, vec![PricePoint::new(d(2014, 1, 3), 55.25)]);
    }

    #[test]
    fn missing_close_column_is_malformed() {
        let body = response(json!({
            "datatable": {"data": [["2014-01-02"]], "columns": [{"name": "date"}]}
        }));
        assert!(matches!(decode_page(body), Err(SourceFailure::Malformed(_))));
    }

    #[test]
    fn bad_date_is_malformed() {
        let body = response(json!({
            "datatable": {
                "data": [["01/02/2014", 1.0]],
                "columns": [{"name": "date"}, {"name": "close"}]
            }
        }));
        assert!(matches!(decode_page(body), Err(SourceFailure::Malformed(_))));
    }

    #[test]
    fn short_row_is_malformed() {
        let body = response(json!({
            "datatable": {
                "data": [["2014-01-02"]],
                "columns": [{"name": "date"}, {"name": "close"}]
            }
        }));
        assert!(matches!(decode_page(body), Err(SourceFailure::Malformed(_))));
    }

    #[test]
    fn status_mapping() {
        let provider =
            r#"{"quandl_error":{"code":"QEAx01","message":"We could not recognize your API key."}}"#;
        assert_eq!(
            failure_for_status(400, provider),
            SourceFailure::Http {
                status: 400,
                message: "QEAx01 We could not recognize your API key.".into()
            }
        );
        assert!(matches!(failure_for_status(401, provider), SourceFailure::Unauthorized(_)));
        assert!(matches!(failure_for_status(403, ""), SourceFailure::Unauthorized(_)));
        assert!(matches!(
            failure_for_status(404, "nope"),
            SourceFailure::NotFound(m) if m == "nope"
        ));
        assert!(matches!(failure_for_status(429, ""), SourceFailure::RateLimited(_)));
        assert!(matches!(
            failure_for_status(503, "down"),
            SourceFailure::Server { status: 503, .. }
        ));
    }

    #[test]
    fn api_key_is_redacted() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");

        let client = DataLinkClient::new(key, &RuntimeConfig::default()).unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("WIKI/PRICES"));
    }

    #[test]
    fn endpoint_joins_base_and_table() {
        let mut cfg = RuntimeConfig::default();
        cfg.api_base_url = "http://localhost:8080/api/v3/".into();
        let client = DataLinkClient::new(ApiKey::new("k"), &cfg).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:8080/api/v3/datatables/WIKI/PRICES.json"
        );
    }

    // ---- request loop against a loopback server ----------------------------

    fn json_response(status: u16, body: serde_json::Value) -> String {
        let body = body.to_string();
        format!(
            "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn page(rows: serde_json::Value, cursor: Option<&str>) -> String {
        json_response(
            200,
            json!({
                "datatable": {"data": rows, "columns": [{"name": "date"}, {"name": "close"}]},
                "meta": {"next_cursor_id": cursor}
            }),
        )
    }

    /// Serve `responses` in order, one per connection, repeating the last one.
    /// Returns the base URL and the request lines received.
    async fn serve(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            let mut hit = 0;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let text = String::from_utf8_lossy(&request);
                log.lock().unwrap().push(text.lines().next().unwrap_or_default().to_string());

                let reply = &responses[hit.min(responses.len() - 1)];
                hit += 1;
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/api/v3"), seen)
    }

    fn client_for(base_url: String, max_pages: u32) -> DataLinkClient {
        let mut cfg = RuntimeConfig::default();
        cfg.api_base_url = base_url;
        cfg.max_pages = max_pages;
        cfg.request_timeout_secs = 5;
        DataLinkClient::new(ApiKey::new("test-key"), &cfg).unwrap()
    }

    fn january() -> (Ticker, DateRange) {
        (
            Ticker::parse("fb").unwrap(),
            DateRange::new(d(2014, 1, 1), d(2014, 1, 31)).unwrap(),
        )
    }

    #[tokio::test]
    async fn follows_cursor_and_merges_pages() {
        let (base, seen) = serve(vec![
            page(json!([["2014-01-03", 2.0]]), Some("c1")),
            page(json!([["2014-01-02", 1.0]]), None),
        ])
        .await;
        let client = client_for(base, 10);
        let (ticker, range) = january();

        let series = client.fetch(&ticker, &range).await.unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("/api/v3/datatables/WIKI/PRICES.json?"));
        assert!(seen[0].contains("ticker=FB"));
        assert!(seen[0].contains("date.gte=2014-01-01"));
        assert!(seen[0].contains("date.lte=2014-01-31"));
        assert!(!seen[0].contains("qopts.cursor_id"));
        assert!(seen[1].contains("qopts.cursor_id=c1"));
    }

    #[tokio::test]
    async fn endless_cursor_stops_at_page_limit() {
        let (base, seen) = serve(vec![page(json!([["2014-01-02", 1.0]]), Some("again"))]).await;
        let client = client_for(base, 3);
        let (ticker, range) = january();

        let err = client.fetch(&ticker, &range).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::DataSourceUnavailable(SourceFailure::Malformed(
                "pagination did not finish within 3 pages".into()
            ))
        );
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rejected_key_is_unavailable() {
        let (base, seen) = serve(vec![json_response(
            401,
            json!({"quandl_error": {"code": "QEAx01", "message": "bad key"}}),
        )])
        .await;
        let client = client_for(base, 10);
        let (ticker, range) = january();

        let err = client.fetch(&ticker, &range).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::DataSourceUnavailable(SourceFailure::Unauthorized("QEAx01 bad key".into()))
        );
        assert_eq!(err.to_string(), "data source unavailable: unauthorized: QEAx01 bad key");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn truncated_error_body_keeps_status() {
        let truncated = "HTTP/1.1 500 Canned\r\nContent-Length: 100\r\n\
                         Connection: close\r\n\r\n{\"quandl_error\"";
        let (base, _) = serve(vec![truncated.to_string()]).await;
        let client = client_for(base, 10);
        let (ticker, range) = january();

        let err = client.fetch(&ticker, &range).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::DataSourceUnavailable(SourceFailure::Server {
                status: 500,
                message: String::new()
            })
        );
    }

    #[tokio::test]
    async fn rows_outside_range_leave_empty_series() {
        let (base, _) = serve(vec![page(json!([["2013-12-31", 1.0]]), None)]).await;
        let client = client_for(base, 10);
        let (ticker, range) = january();

        let err = client.fetch(&ticker, &range).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptySeries { .. }));
    }
}
