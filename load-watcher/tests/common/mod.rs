//! In-process mock of the Prometheus HTTP API for integration tests

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::serve::Listener;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::crypto::ring::default_provider;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

/// CA that signed the mock's TLS certificate (valid for 127.0.0.1 and localhost)
pub const TLS_CA_PEM: &str = include_str!("../fixtures/tls/ca.pem");

/// Canned answer for one query
#[derive(Clone, Debug)]
pub struct Reply {
    status: StatusCode,
    body: String,
    content_type: &'static str,
    delay: Duration,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            content_type: "application/json",
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            content_type: "text/plain",
            delay: Duration::ZERO,
        }
    }

    /// Successful instant vector made of the given samples.
    pub fn vector(samples: Vec<Value>) -> Self {
        Self::json(
            StatusCode::OK,
            json!({
                "status": "success",
                "data": {"resultType": "vector", "result": samples}
            }),
        )
    }

    pub fn scalar(value: &str) -> Self {
        Self::json(
            StatusCode::OK,
            json!({
                "status": "success",
                "data": {"resultType": "scalar", "result": [1700000000.0, value]}
            }),
        )
    }

    pub fn bad_data(message: &str) -> Self {
        Self::json(
            StatusCode::BAD_REQUEST,
            json!({"status": "error", "errorType": "bad_data", "error": message}),
        )
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One vector sample with the given labels
pub fn sample(labels: &[(&str, &str)], value: &str) -> Value {
    let metric: serde_json::Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    json!({"metric": metric, "value": [1700000000.0, value]})
}

/// Replies by exact query string; unknown queries get an empty vector
#[derive(Clone, Debug)]
pub struct Script {
    replies: HashMap<String, Reply>,
    health: StatusCode,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            replies: HashMap::new(),
            health: StatusCode::OK,
        }
    }
}

impl Script {
    pub fn reply(mut self, query: impl Into<String>, reply: Reply) -> Self {
        self.replies.insert(query.into(), reply);
        self
    }

    pub fn health(mut self, status: StatusCode) -> Self {
        self.health = status;
        self
    }
}

#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub query: String,
    pub authorization: Option<String>,
}

struct MockState {
    script: Script,
    seen: Mutex<Vec<SeenRequest>>,
}

pub struct MockPrometheus {
    pub address: String,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockPrometheus {
    /// Plain HTTP mock on an ephemeral port.
    pub async fn start(script: Script) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = format!("http://{}", listener.local_addr()?);
        Ok(Self::serve(listener, address, script))
    }

    /// HTTPS mock presenting a certificate signed by [`TLS_CA_PEM`].
    pub async fn start_tls(script: Script) -> Result<Self, Box<dyn std::error::Error>> {
        let tcp = TcpListener::bind("127.0.0.1:0").await?;
        let address = format!("https://{}", tcp.local_addr()?);
        let listener = TlsListener {
            tcp,
            acceptor: tls_acceptor()?,
        };
        Ok(Self::serve(listener, address, script))
    }

    fn serve<L>(listener: L, address: String, script: Script) -> Self
    where
        L: Listener,
        L::Addr: std::fmt::Debug,
    {
        let state = Arc::new(MockState {
            script,
            seen: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", get(health))
            .route("/api/v1/query", get(query))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            address,
            state,
            handle,
        }
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }

    pub fn seen_queries(&self) -> Vec<String> {
        self.seen().into_iter().map(|r| r.query).collect()
    }
}

impl Drop for MockPrometheus {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// TCP listener that terminates TLS before handing streams to axum
struct TlsListener {
    tcp: TcpListener,
    acceptor: TlsAcceptor,
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let Ok((stream, addr)) = self.tcp.accept().await else {
                continue;
            };
            // clients refusing the certificate abort the handshake
            if let Ok(tls) = self.acceptor.accept(stream).await {
                return (tls, addr);
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}

fn tls_acceptor() -> Result<TlsAcceptor, Box<dyn std::error::Error>> {
    let cert = include_bytes!("../fixtures/tls/server.crt.der").to_vec();
    let key = include_bytes!("../fixtures/tls/server.key.der").to_vec();
    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(cert)],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key)),
        )?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

async fn health(State(state): State<Arc<MockState>>) -> StatusCode {
    state.script.health
}

async fn query(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("query").cloned().unwrap_or_default();
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen.lock().unwrap().push(SeenRequest {
        query: query.clone(),
        authorization,
    });

    let reply = state
        .script
        .replies
        .get(&query)
        .cloned()
        .unwrap_or_else(|| Reply::vector(Vec::new()));
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let headers = [(CONTENT_TYPE, reply.content_type)];
    (reply.status, headers, reply.body).into_response()
}
