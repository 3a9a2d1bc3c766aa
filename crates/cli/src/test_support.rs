// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a fake backend and assertion helpers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Assert that `$expr` is an `Err` whose message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = format!("{err:#}");
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

struct FakeState {
    login_url: Mutex<Option<String>>,
    valid_tokens: Mutex<Vec<String>>,
    frames: broadcast::Sender<String>,
    connects: Mutex<usize>,
}

/// In-process stand-in for the login backend and identity API.
///
/// Serves `GET /login-url`, `GET /users/@me` and the `/ws` push socket. Frames
/// passed to [`FakeBackend::push`] go to every connected socket.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<FakeState>,
    shutdown: CancellationToken,
}

impl FakeBackend {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_at(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    /// Start on a specific address (port 0 picks a free one).
    pub async fn start_at(addr: SocketAddr) -> anyhow::Result<Self> {
        let (frames, _) = broadcast::channel(64);
        let state = Arc::new(FakeState {
            login_url: Mutex::new(Some("https://login.example/authorize".to_owned())),
            valid_tokens: Mutex::new(Vec::new()),
            frames,
            connects: Mutex::new(0),
        });
        let router = Router::new()
            .route("/login-url", get(login_url))
            .route("/users/@me", get(users_me))
            .route("/ws", get(push_socket))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).with_graceful_shutdown(sd.cancelled_owned()).await;
        });
        Ok(Self { addr, state, shutdown })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make `/login-url` fail with 503.
    pub fn fail_login_url(&self) {
        *self.state.login_url.lock() = None;
    }

    pub fn accept_token(&self, token: &str) {
        self.state.valid_tokens.lock().push(token.to_owned());
    }

    /// Send a raw text frame to every connected push socket.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.state.frames.send(frame.into());
    }

    /// Number of push sockets currently open.
    pub fn listeners(&self) -> usize {
        self.state.frames.receiver_count()
    }

    /// Total push socket connections accepted so far.
    pub fn connects(&self) -> usize {
        *self.state.connects.lock()
    }

    /// Wait until at least `n` push sockets are open.
    pub async fn wait_listeners(&self, n: usize) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while self.listeners() < n {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("timed out waiting for {n} push listeners");
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn login_url(State(state): State<Arc<FakeState>>) -> impl IntoResponse {
    match state.login_url.lock().clone() {
        Some(url) => (StatusCode::OK, url),
        None => (StatusCode::SERVICE_UNAVAILABLE, "login unavailable".to_owned()),
    }
}

async fn users_me(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> StatusCode {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(t) if state.valid_tokens.lock().iter().any(|v| v == t) => StatusCode::OK,
        Some(_) => StatusCode::UNAUTHORIZED,
        None => StatusCode::BAD_REQUEST,
    }
}

async fn push_socket(
    State(state): State<Arc<FakeState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_push(state, socket))
}

async fn serve_push(state: Arc<FakeState>, mut socket: WebSocket) {
    let mut rx = state.frames.subscribe();
    *state.connects.lock() += 1;
    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
