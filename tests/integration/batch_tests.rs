//! Integration tests for batch enrichment
//!
//! These tests use wiremock to stand in for the vendor's token, options and
//! price endpoints and drive full invocations against a SQLite catalog.

use price_scout::batch::{BatchRequest, Orchestrator, STATUS_ERROR, STATUS_OK};
use price_scout::config::parse_config;
use price_scout::pricing::variant_key;
use price_scout::storage::{CredentialMode, NewProduct, RunStatus, SqliteStorage, Storage};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TOKEN: &str = "test-token";

/// Answers price requests from a table keyed by the sorted option ids
struct PriceTable {
    prices: HashMap<Vec<u64>, Value>,
    fallback: Option<Value>,
}

impl PriceTable {
    fn new(prices: Vec<(Vec<u64>, Value)>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(mut ids, body)| {
                    ids.sort_unstable();
                    (ids, body)
                })
                .collect(),
            fallback: None,
        }
    }

    fn always(body: Value) -> Self {
        Self {
            prices: HashMap::new(),
            fallback: Some(body),
        }
    }
}

impl Respond for PriceTable {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(mut ids) = submitted_options(request) else {
            return ResponseTemplate::new(400);
        };
        ids.sort_unstable();

        match self.prices.get(&ids).or(self.fallback.as_ref()) {
            Some(body) => ResponseTemplate::new(200).set_body_json(body.clone()),
            None => ResponseTemplate::new(404).set_body_json(json!({"error": "no price"})),
        }
    }
}

fn submitted_options(request: &Request) -> Option<Vec<u64>> {
    let body: Value = serde_json::from_slice(&request.body).ok()?;
    body.get("productOptions")?
        .as_array()?
        .iter()
        .map(Value::as_u64)
        .collect()
}

struct Harness {
    server: MockServer,
    orchestrator: Orchestrator<SqliteStorage>,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        Self::with_settings(50, 30).await
    }

    async fn with_settings(combination_cap: usize, product_timeout_secs: u64) -> Self {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("catalog.db");

        let toml = format!(
            r#"
[vendor]
default-mode = "test"
request-timeout-secs = 10

[credentials.test]
client-id = "test-client"
client-secret = "test-secret"
auth-url = "{uri}/oauth/token"
api-base-url = "{uri}"
audience = "https://vendor.example.com"

[prober]
combination-cap = {cap}
wave-width = 4
wave-timeout-secs = 10
sample-seed = 42

[batch]
product-timeout-secs = {timeout}

[output]
database-path = '{db}'
"#,
            uri = server.uri(),
            cap = combination_cap,
            timeout = product_timeout_secs,
            db = db_path.display()
        );
        let config = parse_config(&toml).expect("Failed to parse test config");
        let storage = SqliteStorage::new(&db_path).expect("Failed to open test DB");
        let orchestrator = Orchestrator::new(config, "test-hash", storage).with_env(|_| None);

        Self {
            server,
            orchestrator,
            _dir: dir,
        }
    }

    async fn mount_token(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": TOKEN, "token_type": "Bearer"})),
            )
            .mount(&self.server)
            .await;
    }

    async fn mount_options(&self, vendor_id: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/product/{}/9", vendor_id)))
            .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    async fn mount_prices(&self, vendor_id: &str, table: PriceTable) {
        Mock::given(method("POST"))
            .and(path(format!("/price/{}/9", vendor_id)))
            .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
            .respond_with(table)
            .mount(&self.server)
            .await;
    }

    fn add_product(&mut self, vendor_id: Option<&str>, name: &str, price: Option<i64>) -> i64 {
        self.orchestrator
            .storage_mut()
            .upsert_product(&NewProduct {
                vendor_product_id: vendor_id.map(str::to_string),
                name: name.to_string(),
                min_price_cents: price,
                base_cost_cents: price,
            })
            .expect("Failed to insert product")
    }

    async fn requests_to(&self, prefix: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().starts_with(prefix))
            .collect()
    }
}

fn descriptor(id: u64, name: &str, group: &str) -> Value {
    json!({"id": id, "name": name, "group": group})
}

/// qty 10/50/100 (baseline id 2), size S/M/L, color red/blue
fn poster_options() -> Value {
    json!([[
        descriptor(1, "100", "qty"),
        descriptor(2, "10", "qty"),
        descriptor(3, "50", "qty"),
        descriptor(11, "S", "size"),
        descriptor(12, "M", "size"),
        descriptor(13, "L", "size"),
        descriptor(21, "Red", "Color"),
        descriptor(22, "Blue", "Color"),
    ]])
}

fn poster_prices() -> PriceTable {
    let mut prices = Vec::new();
    for size in [11, 12, 13] {
        for color in [21, 22] {
            let dollars = if size == 12 && color == 22 {
                "4.25".to_string()
            } else {
                format!("{}.00", 5 + size - 11)
            };
            prices.push((vec![2, size, color], json!({ "price": dollars })));
        }
    }
    PriceTable::new(prices)
}

fn simple_options(size_id: u64) -> Value {
    json!([[descriptor(1, "10", "qty"), descriptor(size_id, "S", "size")]])
}

#[tokio::test]
async fn test_enriches_product_with_lowest_combination() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    h.mount_options("P-1", poster_options()).await;
    h.mount_prices("P-1", poster_prices()).await;
    let id = h.add_product(Some("P-1"), "Poster", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;

    assert!(response.success, "unexpected failure: {:?}", response.error);
    assert_eq!(response.status, STATUS_OK);
    let summary = response.summary.expect("summary missing");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.remaining, 0);
    assert_eq!(summary.total, 1);

    let product = h.orchestrator.storage().get_product(id).expect("product");
    assert_eq!(product.min_price_cents, Some(425));
    assert_eq!(product.base_cost_cents, Some(425));
    assert_eq!(product.min_price_variant_key.as_deref(), Some("2-12-22"));
    assert_eq!(
        product.min_price_variant_key,
        Some(variant_key(&[22, 12, 2]))
    );

    // Size and color are both varied; quantity is pinned to the smallest
    let price_requests = h.requests_to("/price/").await;
    assert_eq!(price_requests.len(), 6);
    for request in &price_requests {
        let ids = submitted_options(request).expect("price body");
        assert_eq!(ids[0], 2);
        assert_eq!(ids.len(), 3);
    }
}

#[tokio::test]
async fn test_rerun_on_enriched_catalog_processes_nothing() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    h.mount_options("P-1", poster_options()).await;
    h.mount_prices("P-1", poster_prices()).await;
    h.add_product(Some("P-1"), "Poster", None);

    let first = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    assert_eq!(first.summary.map(|s| s.updated), Some(1));

    let second = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    let summary = second.summary.expect("summary missing");
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.remaining, 0);
    assert_eq!(h.requests_to("/product/").await.len(), 1);
    assert_eq!(h.requests_to("/oauth/token").await.len(), 1);
}

#[tokio::test]
async fn test_nothing_to_do_succeeds_without_token_request() {
    let mut h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    h.add_product(Some("P-1"), "Poster", Some(1200));

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;

    assert!(response.success);
    assert_eq!(response.status, STATUS_OK);
    let summary = response.summary.expect("summary missing");
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.remaining, 0);
    assert_eq!(summary.total, 1);
    assert!(h.requests_to("/oauth/token").await.is_empty());

    let run = h
        .orchestrator
        .storage()
        .get_latest_run()
        .expect("runs")
        .expect("run recorded");
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_refresh_offsets_cover_catalog_without_overlap() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    for i in 0..5u64 {
        let vendor_id = format!("V-{}", i);
        h.mount_options(&vendor_id, simple_options(100 + i)).await;
        h.mount_prices(
            &vendor_id,
            PriceTable::new(vec![(vec![1, 100 + i], json!({"price": 10 + i}))]),
        )
        .await;
        // Already priced rows are still revisited in refresh mode
        h.add_product(Some(&vendor_id), &format!("Product {}", i), Some(99_999));
    }

    let mut request = BatchRequest {
        batch_size: Some(2),
        force_refresh: Some(true),
        offset: Some(0),
        ..Default::default()
    };
    let mut seen = Vec::new();

    for (expected_processed, expected_next, expected_remaining) in [(2, 2, 3), (2, 4, 1), (1, 5, 0)] {
        let response = h.orchestrator.invoke(&request, CredentialMode::Test).await;
        let summary = response.summary.expect("summary missing");

        assert_eq!(summary.processed, expected_processed);
        assert_eq!(summary.next_offset, expected_next);
        assert_eq!(summary.remaining, expected_remaining);
        assert_eq!(summary.total, 5);
        assert_eq!(
            summary.next_offset,
            request.offset.unwrap_or(0) + summary.processed
        );

        seen.push(summary);
        request.offset = Some(summary.next_offset);
    }

    let option_paths: Vec<String> = h
        .requests_to("/product/")
        .await
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    let expected: Vec<String> = (0..5).map(|i| format!("/product/V-{}/9", i)).collect();
    assert_eq!(option_paths, expected);

    let all = h
        .orchestrator
        .storage()
        .select_range(0, 10)
        .expect("select");
    for (i, product) in all.iter().enumerate() {
        assert_eq!(product.min_price_cents, Some(1000 + 100 * i as i64));
    }
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn test_empty_options_counts_error_and_skips_product() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    h.mount_options("EMPTY", json!([[]])).await;
    h.mount_options("GOOD", simple_options(11)).await;
    h.mount_prices(
        "GOOD",
        PriceTable::new(vec![(vec![1, 11], json!({"unit_price": "3.10"}))]),
    )
    .await;
    let empty_id = h.add_product(Some("EMPTY"), "Nothing to configure", None);
    let good_id = h.add_product(Some("GOOD"), "Sticker", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    let summary = response.summary.expect("summary missing");

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.remaining, 1);

    let storage = h.orchestrator.storage();
    assert_eq!(storage.get_product(empty_id).expect("p").min_price_cents, None);
    assert_eq!(storage.get_product(good_id).expect("p").min_price_cents, Some(310));
    assert_eq!(
        storage.enrichment_errors_by_stage(None).expect("errors"),
        vec![("options".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_zero_prices_leave_product_unresolved() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    h.mount_options("P-1", poster_options()).await;
    h.mount_prices("P-1", PriceTable::always(json!({"price": 0}))).await;
    let id = h.add_product(Some("P-1"), "Poster", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    let summary = response.summary.expect("summary missing");

    assert_eq!(summary.updated, 0);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.remaining, 1);

    let product = h.orchestrator.storage().get_product(id).expect("product");
    assert_eq!(product.min_price_cents, None);
    assert_eq!(product.min_price_variant_key, None);

    // Six wave probes plus one fallback probe of baseline + first size
    let price_requests = h.requests_to("/price/").await;
    assert_eq!(price_requests.len(), 7);
    assert_eq!(
        submitted_options(&price_requests[6]).expect("body"),
        vec![2, 11]
    );
}

#[tokio::test]
async fn test_fallback_probe_resolves_product() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    h.mount_options("P-1", poster_options()).await;
    // Only the baseline + first size combination has a price
    h.mount_prices(
        "P-1",
        PriceTable::new(vec![(vec![2, 11], json!({"total_price": 12.5}))]),
    )
    .await;
    let id = h.add_product(Some("P-1"), "Poster", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    assert_eq!(response.summary.map(|s| s.updated), Some(1));

    let product = h.orchestrator.storage().get_product(id).expect("product");
    assert_eq!(product.min_price_cents, Some(1250));
    assert_eq!(product.min_price_variant_key.as_deref(), Some("2-11"));
}

#[tokio::test]
async fn test_sentinel_rows_selected_and_non_vendor_rows_ignored() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    h.mount_options("SENTINEL", simple_options(11)).await;
    h.mount_prices(
        "SENTINEL",
        PriceTable::new(vec![(vec![1, 11], json!({"price": 8}))]),
    )
    .await;
    let sentinel_id = h.add_product(Some("SENTINEL"), "Placeholder price", Some(0));
    h.add_product(Some("DONE"), "Already priced", Some(700));
    h.add_product(None, "House gift card", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    let summary = response.summary.expect("summary missing");

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.remaining, 0);
    assert_eq!(
        h.orchestrator
            .storage()
            .get_product(sentinel_id)
            .expect("product")
            .min_price_cents,
        Some(800)
    );
    assert_eq!(h.requests_to("/product/").await.len(), 1);
}

#[tokio::test]
async fn test_large_space_is_sampled_to_cap() {
    let mut h = Harness::with_settings(10, 30).await;
    h.mount_token().await;

    let mut descriptors = Vec::new();
    for i in 0..6 {
        descriptors.push(descriptor(100 + i, "paper", "material"));
    }
    for i in 0..5 {
        descriptors.push(descriptor(200 + i, "finish", "finish"));
    }
    h.mount_options("BIG", json!([descriptors])).await;
    h.mount_prices("BIG", PriceTable::always(json!({"price": "1.00"})))
        .await;
    h.add_product(Some("BIG"), "Notebook", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    assert_eq!(response.summary.map(|s| s.updated), Some(1));

    let combinations: Vec<Vec<u64>> = h
        .requests_to("/price/")
        .await
        .iter()
        .map(|r| submitted_options(r).expect("body"))
        .collect();
    assert_eq!(combinations.len(), 10);

    let distinct: HashSet<&Vec<u64>> = combinations.iter().collect();
    assert_eq!(distinct.len(), 10);
    for combination in &combinations {
        assert_eq!(combination.len(), 2);
        assert!(combination.iter().any(|id| (200..205).contains(id)));
        assert!(combination.iter().any(|id| (100..106).contains(id)));
    }
}

#[tokio::test]
async fn test_missing_credentials_is_soft_failure_without_network() {
    let mut h = Harness::new().await;
    h.add_product(Some("P-1"), "Poster", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Live)
        .await;

    assert!(!response.success);
    assert_eq!(response.status, STATUS_OK);
    assert!(response.summary.is_none());
    let error = response.error.expect("error message");
    assert!(error.contains("live"), "unexpected error: {}", error);

    let received = h.server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
    assert!(h
        .orchestrator
        .storage()
        .get_latest_run()
        .expect("runs")
        .is_none());
}

#[tokio::test]
async fn test_auth_failure_is_error_status() {
    let mut h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})))
        .mount(&h.server)
        .await;
    h.add_product(Some("P-1"), "Poster", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;

    assert!(!response.success);
    assert_eq!(response.status, STATUS_ERROR);
    assert!(response.is_error_status());
    assert!(h.requests_to("/product/").await.is_empty());

    let run = h
        .orchestrator
        .storage()
        .get_latest_run()
        .expect("runs")
        .expect("run recorded");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());
}

#[tokio::test]
async fn test_token_without_access_token_is_error_status() {
    let mut h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&h.server)
        .await;
    h.add_product(Some("P-1"), "Poster", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;

    assert_eq!(response.status, STATUS_ERROR);
}

#[tokio::test]
async fn test_options_server_error_does_not_abort_batch() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    Mock::given(method("GET"))
        .and(path("/product/BROKEN/9"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    h.mount_options("GOOD", simple_options(11)).await;
    h.mount_prices(
        "GOOD",
        PriceTable::new(vec![(vec![1, 11], json!({"price": 2}))]),
    )
    .await;
    h.add_product(Some("BROKEN"), "Broken", None);
    h.add_product(Some("GOOD"), "Good", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    let summary = response.summary.expect("summary missing");

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.errors, 1);

    let run = h
        .orchestrator
        .storage()
        .get_latest_run()
        .expect("runs")
        .expect("run recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counts.errors, 1);
    assert_eq!(run.config_hash, "test-hash");
}

#[tokio::test]
async fn test_slow_product_times_out() {
    let mut h = Harness::with_settings(50, 1).await;
    h.mount_token().await;
    Mock::given(method("GET"))
        .and(path("/product/SLOW/9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(simple_options(11))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&h.server)
        .await;
    let id = h.add_product(Some("SLOW"), "Slow", None);

    let response = h
        .orchestrator
        .invoke(&BatchRequest::default(), CredentialMode::Test)
        .await;
    let summary = response.summary.expect("summary missing");

    assert_eq!(summary.errors, 1);
    assert_eq!(
        h.orchestrator.storage().get_product(id).expect("p").min_price_cents,
        None
    );
    assert_eq!(
        h.orchestrator
            .storage()
            .enrichment_errors_by_stage(None)
            .expect("errors"),
        vec![("timeout".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_follow_up_requests_drain_unenriched_catalog() {
    let mut h = Harness::new().await;
    h.mount_token().await;
    for i in 0..3u64 {
        let vendor_id = format!("D-{}", i);
        h.mount_options(&vendor_id, simple_options(50 + i)).await;
        h.mount_prices(
            &vendor_id,
            PriceTable::new(vec![(vec![1, 50 + i], json!({"price": 1}))]),
        )
        .await;
        h.add_product(Some(&vendor_id), "Card", None);
    }

    let mut request = Some(BatchRequest {
        limit: Some(2),
        ..Default::default()
    });
    let mut invocations = 0;
    while let Some(current) = request {
        let response = h.orchestrator.invoke(&current, CredentialMode::Test).await;
        let summary = response.summary.expect("summary missing");
        invocations += 1;
        request = current.follow_up(&summary);
    }

    assert_eq!(invocations, 2);
    assert_eq!(h.orchestrator.storage().count_unenriched(0).expect("count"), 0);
}
