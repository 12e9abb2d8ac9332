//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock stages injected, so the HTTP surface can be exercised without
//! network access or an ffmpeg binary.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tower::ServiceExt;

use tapefetch_core::{
    create_authenticator,
    testing::{MockFetcher, MockTranscoder},
    AuthConfig, AuthMethod, Config, JobEvent, Orchestrator, PipelineConfig, TranscodeSpec,
};
use tapefetch_server::api::{create_router, WsBroadcaster};
use tapefetch_server::state::AppState;

/// Test fixture wiring mock stages into the real router.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/jobs", json!({
///         "url": "https://example.test/video",
///         "destination": "a.mp4"
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock fetcher - control downloads
    pub fetcher: Arc<MockFetcher>,
    /// Mock transcoder - control conversions
    pub transcoder: Arc<MockTranscoder>,
    /// Broadcaster feeding the event stream
    pub broadcaster: WsBroadcaster,
    /// Download directory for relative paths
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_auth(AuthConfig::default())
    }

    /// Fixture whose API requires `key`.
    pub fn with_api_key(key: &str) -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some(key.to_string()),
        })
    }

    fn with_auth(auth: AuthConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let fetcher = Arc::new(MockFetcher::new());
        let transcoder = Arc::new(MockTranscoder::new());
        let broadcaster = WsBroadcaster::default();

        let mut config = Config::default();
        config.auth = auth;
        config.server.host = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        config.server.port = 0;
        config.pipeline = PipelineConfig {
            download_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };

        let orchestrator = Orchestrator::new(
            config.pipeline.clone(),
            TranscodeSpec::default(),
            fetcher.clone(),
            transcoder.clone(),
            Arc::new(broadcaster.clone()),
        );

        let authenticator =
            create_authenticator(&config.auth).expect("Failed to create authenticator");
        let state = Arc::new(AppState::new(
            config,
            Arc::from(authenticator),
            orchestrator,
            broadcaster.clone(),
        ));
        let router = create_router(state);

        Self {
            router,
            fetcher,
            transcoder,
            broadcaster,
            temp_dir,
        }
    }

    /// Subscribe to job events; call before submitting.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.broadcaster.subscribe()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send("GET", path, None, &[]).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.send("POST", path, Some(body), &[]).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send("DELETE", path, None, &[]).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request with extra headers.
    pub async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Receive events until the terminal one for `job_id`.
pub async fn wait_for_terminal(
    rx: &mut broadcast::Receiver<JobEvent>,
    job_id: &str,
) -> Vec<JobEvent> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if event.job_id() == job_id => {
                    let done = event.is_terminal();
                    seen.push(event);
                    if done {
                        return;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    assert!(result.is_ok(), "job {} did not finish in time", job_id);
    seen
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
