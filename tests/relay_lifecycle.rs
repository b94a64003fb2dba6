//! End-to-end tests for the relay: seed, poll, deliver, reconnect, shut down.
//!
//! Each test serves feeds from its own wiremock server and records what the
//! relay hands to the transport. Intervals are one second, so these run on
//! the real clock (paused time would fire the HTTP timeout while a request
//! is in flight).

use async_trait::async_trait;
use feedrelay::feed::HttpFetcher;
use feedrelay::transport::{
    error_channel, liveness_channel, ErrorSink, Transport, TransportError,
};
use feedrelay::{Config, Relay};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct FakeChat {
    connects: Mutex<usize>,
    disconnects: Mutex<usize>,
    joins: Mutex<Vec<Vec<String>>>,
    lines: Mutex<Vec<(Vec<String>, String)>>,
}

impl FakeChat {
    fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }

    fn disconnects(&self) -> usize {
        *self.disconnects.lock().unwrap()
    }

    fn joins(&self) -> Vec<Vec<String>> {
        self.joins.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeChat {
    async fn connect(&self) {
        *self.connects.lock().unwrap() += 1;
    }

    async fn disconnect(&self) {
        *self.disconnects.lock().unwrap() += 1;
    }

    async fn join(&self, channels: &[String]) {
        self.joins.lock().unwrap().push(channels.to_vec());
    }

    async fn send_bulk(&self, channels: &[String], message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((channels.to_vec(), message.to_string()));
    }

    async fn ping(&self) {}
}

fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(guid, title)| format!("<item><guid>{guid}</guid><title>{title}</title></item>"))
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{body}</channel></rss>"#)
}

fn config(server: &MockServer, tweak: impl FnOnce(&mut Config)) -> Config {
    let content = format!(
        r##"
channels = ["#one", "#two"]
sources = ["/r/foo/new"]
base_url = "{}"
poll_interval_secs = 1
send_delay_ms = 0
first_run_retry_secs = 1
reconnect_cooldown_secs = 1
liveness_interval_secs = 0
"##,
        server.uri()
    );
    let mut config = Config::from_toml(&content).unwrap();
    tweak(&mut config);
    config
}

struct Running {
    chat: Arc<FakeChat>,
    sink: ErrorSink,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<Result<feedrelay::RelaySummary, feedrelay::relay::Cancelled>>,
}

fn start(config: Config) -> Running {
    let chat = Arc::new(FakeChat::default());
    let (sink, errors) = error_channel();
    let (_notifier, probe) = liveness_channel();
    let fetcher = HttpFetcher::from_config(reqwest::Client::new(), &config);
    let relay = Relay::new(config, fetcher, chat.clone(), errors, probe);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(relay.run(cancel.clone()));
    Running {
        chat,
        sink,
        cancel,
        handle,
    }
}

#[tokio::test]
async fn test_only_posts_newer_than_baseline_are_relayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/foo/new.rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[("t3_AA", "Old")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/foo/new.rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
            ("t3_AB", "Fresh"),
            ("t1_ZZ", "Comment"),
            ("t3_AA", "Old"),
        ])))
        .mount(&server)
        .await;

    let running = start(config(&server, |_| {}));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    running.cancel.cancel();
    let summary = running.handle.await.unwrap().unwrap();

    let messages = running.chat.messages();
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(messages[0].contains("Fresh"));
    assert!(messages[0].ends_with("https://redd.it/AB"));
    assert_eq!(summary.delivered, 1);

    let lines = running.chat.lines.lock().unwrap().clone();
    assert_eq!(lines[0].0, vec!["#one".to_string(), "#two".to_string()]);

    assert_eq!(running.chat.connects(), 1);
    assert_eq!(running.chat.joins(), vec![lines[0].0.clone()]);
    assert_eq!(running.chat.disconnects(), 1);
}

#[tokio::test]
async fn test_failed_first_run_retries_and_never_replays_backlog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
            ("t3_AC", "Backlog 1"),
            ("t3_AB", "Backlog 2"),
        ])))
        .mount(&server)
        .await;

    let running = start(config(&server, |_| {}));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    running.cancel.cancel();
    running.handle.await.unwrap().unwrap();

    assert!(running.chat.messages().is_empty());
    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() >= 2, "first run was not retried");
}

#[tokio::test]
async fn test_cancel_before_seed_reports_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let running = start(config(&server, |c| c.first_run_retry_secs = 600));
    tokio::time::sleep(Duration::from_millis(300)).await;
    running.cancel.cancel();

    let result = running.handle.await.unwrap();
    assert!(result.is_err());
    assert!(running.chat.messages().is_empty());
    assert_eq!(running.chat.disconnects(), 1);
}

#[tokio::test]
async fn test_transport_error_triggers_reconnect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[("t3_AA", "Old")])))
        .mount(&server)
        .await;

    let running = start(config(&server, |c| c.poll_interval_secs = 60));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(running.chat.connects(), 1);

    running
        .sink
        .report(TransportError::Disconnected("connection reset".into()));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(running.chat.disconnects(), 1);
    assert_eq!(running.chat.connects(), 2);

    running
        .sink
        .report(TransportError::Connect("refused".into()));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(running.chat.connects(), 3);
    assert_eq!(running.chat.joins().len(), 3, "every reconnect must rejoin");

    running.cancel.cancel();
    running.handle.await.unwrap().unwrap();
}
