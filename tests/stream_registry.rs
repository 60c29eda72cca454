//! Integration tests for the stream registry client with thin HTTP servers
//!
//! A thin axum server plays the registry so the reqwest client, status
//! mapping and the synthesizer's broker lookup run over a real socket.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

use firehose_orchestrator::client::{
    HttpStreamRegistry, RegistryError, RpcError, SchemaCatalog, SchemaQuery, SchemaRef,
    StreamRegistry,
};
use firehose_orchestrator::config::{SinkDefaults, StencilSettings};
use firehose_orchestrator::firehose::{ConfigSynthesizer, EnvVars, SynthesisOptions};
use firehose_orchestrator::{Caller, Error, ErrorKind, RequestContext};

/// Find an available port for testing
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to address")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

#[derive(Clone)]
struct RegistryState {
    hits: Arc<AtomicUsize>,
    delay: Duration,
}

async fn stream_handler(State(state): State<RegistryState>, Path(urn): Path<String>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !state.delay.is_zero() {
        sleep(state.delay).await;
    }
    match urn.as_str() {
        "main:data-platform" => {
            Json(json!({"url": "broker-1:6668,broker-2:6668", "name": "main"})).into_response()
        }
        "broken:data-platform" => {
            (StatusCode::INTERNAL_SERVER_ERROR, "registry exploded").into_response()
        }
        "garbled:data-platform" => (StatusCode::OK, "not json").into_response(),
        _ => (StatusCode::NOT_FOUND, "no such stream").into_response(),
    }
}

/// Start a thin registry server; returns its base URL and hit counter
async fn start_registry(delay: Duration) -> (String, Arc<AtomicUsize>) {
    let port = find_available_port();
    let hits = Arc::new(AtomicUsize::new(0));
    let state = RegistryState {
        hits: hits.clone(),
        delay,
    };

    let app = Router::new()
        .route("/streams/{urn}", get(stream_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .expect("Failed to bind registry server");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    sleep(Duration::from_millis(50)).await;
    (format!("http://127.0.0.1:{}", port), hits)
}

/// Catalog answering every topic with the same schema
struct StaticCatalog;

#[async_trait]
impl SchemaCatalog for StaticCatalog {
    async fn search_schema(&self, query: &SchemaQuery) -> Result<SchemaRef, RpcError> {
        Ok(SchemaRef {
            name: format!("{}-proto", query.topic),
            namespace: "gojek".into(),
            id: "1".into(),
            version: 2,
        })
    }
}

fn registry(base_url: &str) -> HttpStreamRegistry {
    HttpStreamRegistry::new(base_url, Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn test_get_stream_ok() {
    let (base_url, hits) = start_registry(Duration::ZERO).await;
    let stream = assert_ok!(registry(&base_url).get_stream("main:data-platform").await);
    assert_eq!(stream.url, "broker-1:6668,broker-2:6668");
    assert_eq!(stream.name.as_deref(), Some("main"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_stream_status_mapping() {
    let (base_url, _) = start_registry(Duration::ZERO).await;
    let client = registry(&base_url);

    let err = assert_err!(client.get_stream("unknown:data-platform").await);
    assert!(matches!(err, RegistryError::NotFound));

    let err = assert_err!(client.get_stream("broken:data-platform").await);
    match err {
        RegistryError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "registry exploded");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = assert_err!(client.get_stream("garbled:data-platform").await);
    assert!(matches!(err, RegistryError::Parse(_)));
}

#[tokio::test]
async fn test_unreachable_registry_is_http_error() {
    let port = find_available_port();
    let client = registry(&format!("http://127.0.0.1:{}", port));
    let err = assert_err!(client.get_stream("main:data-platform").await);
    assert!(matches!(err, RegistryError::Http(_)));
}

fn env(stream: &str) -> EnvVars {
    [
        ("SINK_TYPE", "LOG"),
        ("STREAM_NAME", stream),
        ("SOURCE_KAFKA_TOPIC", "orders"),
    ]
    .into_iter()
    .collect()
}

fn stencil() -> StencilSettings {
    StencilSettings {
        base_url: "http://stencil".into(),
    }
}

fn opts() -> SynthesisOptions {
    SynthesisOptions {
        project: "data-platform".into(),
        force_stencil_refresh: false,
    }
}

#[tokio::test]
async fn test_synthesizer_resolves_brokers_over_http() {
    let (base_url, _) = start_registry(Duration::ZERO).await;
    let registry = registry(&base_url);
    let stencil = stencil();
    let defaults = SinkDefaults::default();
    let synth = ConfigSynthesizer::new(&registry, &StaticCatalog, &stencil, &defaults);

    let ctx = RequestContext::new(Caller::new("u1", "u1@example.com"));
    let out = assert_ok!(synth.synthesize(&ctx, &env("main"), &opts()).await);
    assert_eq!(out.brokers(), Some("broker-1:6668,broker-2:6668"));
    assert_eq!(
        out.stencil_urls(),
        Some("http://stencil/v1beta1/namespaces/gojek/schemas/orders-proto/versions/2")
    );
}

#[tokio::test]
async fn test_synthesizer_lookup_errors_over_http() {
    let (base_url, _) = start_registry(Duration::ZERO).await;
    let registry = registry(&base_url);
    let stencil = stencil();
    let defaults = SinkDefaults::default();
    let synth = ConfigSynthesizer::new(&registry, &StaticCatalog, &stencil, &defaults);
    let ctx = RequestContext::new(Caller::default());

    let err = assert_err!(synth.synthesize(&ctx, &env("unknown"), &opts()).await);
    assert!(matches!(err, Error::Lookup(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = assert_err!(synth.synthesize(&ctx, &env("broken"), &opts()).await);
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn test_deadline_aborts_slow_registry() {
    let (base_url, _) = start_registry(Duration::from_secs(3)).await;
    let registry = registry(&base_url);
    let stencil = stencil();
    let defaults = SinkDefaults::default();
    let synth = ConfigSynthesizer::new(&registry, &StaticCatalog, &stencil, &defaults);

    let ctx = RequestContext::new(Caller::default()).with_timeout(Duration::from_millis(200));
    let err = assert_err!(synth.synthesize(&ctx, &env("main"), &opts()).await);
    assert_eq!(err, Error::internal("deadline exceeded"));
}
