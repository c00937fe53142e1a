//! Integration tests: FilterRegistry → FilterManager → AccessLogHandle →
//! record queue → writer → sink.

use async_trait::async_trait;
use bytes::Bytes;
use portico_core::config::{FilterSpec, OverflowPolicy};
use portico_core::constant::HTTP_ACCESS_LOG_FILTER;
use portico_observability::{Enqueued, LogRecord, LogSink, QueueStats};
use portico_plugin::context::HttpContext;
use portico_plugin::filter::{Endpoint, HttpFilterFactory};
use portico_plugin::manager::FilterManager;
use portico_plugin::registry::FilterRegistry;
use portico_plugins::accesslog::AccessLogFilter;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct MemorySink(Arc<Mutex<Vec<String>>>);

impl MemorySink {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn write(&mut self, record: &LogRecord) -> io::Result<()> {
        self.0.lock().unwrap().push(record.msg().to_string());
        Ok(())
    }
}

fn make_ctx(uri: &str, host: &str, peer: &str) -> HttpContext {
    let req = http::Request::builder()
        .uri(uri)
        .header("host", host)
        .body(Bytes::new())
        .expect("valid request");
    HttpContext::new(req, peer.parse().expect("valid peer"))
}

fn memory_filter(buffer: usize) -> (AccessLogFilter, MemorySink) {
    let sink = MemorySink::default();
    let filter = AccessLogFilter::new("it", buffer, Box::new(sink.clone())).unwrap();
    (filter, sink)
}

async fn wait_written(stats: &QueueStats, n: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while stats.written() < n {
        assert!(Instant::now() < deadline, "writer stalled: {stats:?}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_file_lines(path: &Path, n: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let lines: Vec<String> = std::fs::read_to_string(path)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default();
        if lines.len() >= n {
            return lines;
        }
        assert!(Instant::now() < deadline, "only {} lines in {}", lines.len(), path.display());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn cost_nanos(line: &str) -> u64 {
    let start = line.find("cost time [ ").expect("cost segment") + "cost time [ ".len();
    let end = start + line[start..].find(" ]").expect("cost end");
    line[start..end].parse().expect("integer nanos")
}

/// Downstream service that takes `delay` and answers `{"ok":true}`.
struct JsonService {
    delay: Duration,
}

#[async_trait]
impl Endpoint for JsonService {
    async fn call(&self, ctx: &mut HttpContext) {
        tokio::time::sleep(self.delay).await;
        ctx.response_status = Some(200);
        ctx.set_response(serde_json::json!({ "ok": true }));
    }
}

/// Downstream service that fails.
struct FailingService;

#[async_trait]
impl Endpoint for FailingService {
    async fn call(&self, ctx: &mut HttpContext) {
        ctx.response_status = Some(502);
        ctx.set_error(anyhow::anyhow!("upstream connect timeout"));
    }
}

// ── End-to-end through the manager ───────────────────────────────────────────

#[tokio::test]
async fn logs_request_through_chain() {
    let (mut filter, sink) = memory_filter(16);
    filter.apply().unwrap();
    let stats = Arc::clone(filter.writer().stats());
    let mut manager = FilterManager::new();
    manager.push("access", Box::new(filter));

    let mut ctx = make_ctx("/v1/items?a=1&b=2", "api.example.com", "10.0.0.5:1234");
    let service = JsonService {
        delay: Duration::from_millis(3),
    };
    manager.dispatch(&mut ctx, &service).await;
    assert_eq!(ctx.response_status, Some(200));

    wait_written(&stats, 1).await;
    let lines = sink.lines();
    let line = &lines[0];
    assert!(line.contains("] 10.0.0.5:1234 -> api.example.com - "));
    assert!(line.contains("request params: [a=1,b=2] "));
    assert!(line.contains(r#" response [ {"ok":true} ]"#));
    assert!(!line.contains("invoke err"));
    assert!(cost_nanos(line) >= 3_000_000, "cost must span the downstream call: {line}");
}

#[tokio::test]
async fn downstream_error_is_logged_not_propagated() {
    let (mut filter, sink) = memory_filter(16);
    filter.apply().unwrap();
    let stats = Arc::clone(filter.writer().stats());
    let mut manager = FilterManager::new();
    manager.push("access", Box::new(filter));

    let mut ctx = make_ctx("/pay", "pay.example.com", "192.168.1.9:5000");
    manager.dispatch(&mut ctx, &FailingService).await;
    assert_eq!(ctx.response_status, Some(502));

    wait_written(&stats, 1).await;
    let line = &sink.lines()[0];
    assert!(line.contains(" invoke err [ upstream connect timeout ]"));
    assert!(line.ends_with(" response can not convert to string"));
    assert!(!line.contains("request params"));
}

#[tokio::test]
async fn configured_instance_writes_to_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("access.log");

    let mut registry = FilterRegistry::new();
    portico_plugins::register_all(&mut registry);
    let specs = vec![FilterSpec {
        kind: HTTP_ACCESS_LOG_FILTER.into(),
        name: Some("edge".into()),
        config: serde_json::json!({ "outputpath": path }),
    }];
    let manager = FilterManager::from_specs(&registry, &specs).unwrap();
    assert_eq!(manager.get("edge").unwrap().config()["output_path"], serde_json::json!(path));

    for i in 0..3 {
        let mut ctx = make_ctx(&format!("/r?n={i}"), "files.example.com", "10.1.1.1:4000");
        let service = |ctx: &mut HttpContext| ctx.set_response(String::from("done"));
        manager.dispatch(&mut ctx, &service).await;
    }

    let lines = wait_file_lines(&path, 3).await;
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(&format!("request params: [n={i}] ")), "{line}");
        assert!(line.ends_with(" response [ done ]"));
    }
}

#[tokio::test]
async fn metrics_are_exported_per_instance() {
    let metrics = prometheus::Registry::new();
    let mut registry = FilterRegistry::new();
    portico_plugins::register_all_with(&mut registry, 8, Some(metrics.clone()));
    let specs = vec![FilterSpec {
        kind: HTTP_ACCESS_LOG_FILTER.into(),
        name: Some("metered".into()),
        config: serde_json::json!({ "enabled": false }),
    }];
    let _manager = FilterManager::from_specs(&registry, &specs).unwrap();

    let output = portico_observability::render_metrics(&metrics);
    assert!(output.contains("portico_access_log_enqueued_total"));
    assert!(output.contains(r#"filter="metered""#));
}

#[tokio::test]
async fn metered_instances_need_distinct_names() {
    let metrics = prometheus::Registry::new();
    let mut registry = FilterRegistry::new();
    portico_plugins::register_all_with(&mut registry, 8, Some(metrics.clone()));
    let unnamed = FilterSpec {
        kind: HTTP_ACCESS_LOG_FILTER.into(),
        name: None,
        config: serde_json::Value::Null,
    };

    let err = FilterManager::from_specs(&registry, &[unnamed.clone(), unnamed.clone()])
        .err()
        .expect("second unnamed instance must be refused");
    assert!(err.is_config_error(), "{err}");

    let named = FilterSpec {
        name: Some("internal".into()),
        ..unnamed.clone()
    };
    let manager = FilterManager::from_specs(&registry, &[unnamed, named]).unwrap();
    assert_eq!(manager.names(), vec![HTTP_ACCESS_LOG_FILTER, "internal"]);

    let output = portico_observability::render_metrics(&metrics);
    assert!(output.contains(r#"filter="internal""#));
    assert!(output.contains(&format!(r#"filter="{HTTP_ACCESS_LOG_FILTER}""#)));
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writer_preserves_enqueue_completion_order() {
    let (mut filter, sink) = memory_filter(64);
    filter.apply().unwrap();
    let stats = Arc::clone(filter.writer().stats());

    // The lock serializes the enqueue step, giving a known completion order.
    let gate = Arc::new(tokio::sync::Mutex::new(Vec::<String>::new()));
    let mut tasks = Vec::new();
    for i in 0..32 {
        let hook = filter.handle();
        let gate = Arc::clone(&gate);
        tasks.push(tokio::spawn(async move {
            let ctx = make_ctx(&format!("/o?id={i}"), "order.example.com", "10.0.0.1:1");
            let mut order = gate.lock().await;
            let outcome = hook.log_exchange(&ctx, Duration::from_nanos(i)).await;
            assert_eq!(outcome, Some(Enqueued::Accepted));
            order.push(format!("id={i}"));
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    wait_written(&stats, 32).await;
    let expected = gate.lock().await.clone();
    let seen: Vec<String> = sink
        .lines()
        .iter()
        .map(|l| {
            let start = l.find("[id=").unwrap() + 1;
            let end = start + l[start..].find(']').unwrap();
            l[start..end].to_string()
        })
        .collect();
    assert_eq!(seen, expected);
}

// ── Backpressure ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn block_policy_holds_second_record_until_drained() {
    let (mut filter, sink) = memory_filter(1);
    let stats = Arc::clone(filter.writer().stats());
    let hook = filter.handle();
    let ctx = make_ctx("/", "a.example.com", "10.0.0.2:2");

    // Writer not started yet: the queue absorbs exactly one record.
    assert_eq!(
        hook.log_exchange(&ctx, Duration::ZERO).await,
        Some(Enqueued::Accepted)
    );
    let blocked = tokio::time::timeout(
        Duration::from_millis(50),
        hook.log_exchange(&ctx, Duration::ZERO),
    )
    .await;
    assert!(blocked.is_err(), "second enqueue must wait while the queue is full");

    filter.apply().unwrap();
    let resumed = tokio::time::timeout(Duration::from_secs(5), hook.log_exchange(&ctx, Duration::ZERO))
        .await
        .expect("enqueue resumes once the writer drains");
    assert_eq!(resumed, Some(Enqueued::Accepted));

    wait_written(&stats, 2).await;
    assert_eq!(stats.dropped(), 0);
    assert_eq!(sink.lines().len(), 2);
}

#[tokio::test]
async fn drop_policy_returns_immediately_and_counts() {
    let (mut filter, sink) = memory_filter(1);
    filter.access_log_config_mut().overflow = OverflowPolicy::Drop;
    let stats = Arc::clone(filter.writer().stats());
    let hook = filter.handle();
    let ctx = make_ctx("/", "b.example.com", "10.0.0.3:3");

    assert_eq!(
        hook.log_exchange(&ctx, Duration::ZERO).await,
        Some(Enqueued::Accepted)
    );
    let second = tokio::time::timeout(
        Duration::from_millis(50),
        hook.log_exchange(&ctx, Duration::ZERO),
    )
    .await
    .expect("drop policy never waits");
    assert_eq!(second, Some(Enqueued::Dropped));
    assert_eq!(stats.dropped(), 1);
    assert_eq!(stats.enqueued(), 1);

    filter.apply().unwrap();
    wait_written(&stats, 1).await;
    assert_eq!(sink.lines().len(), 1);
}
