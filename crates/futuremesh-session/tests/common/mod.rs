//! Shared fixtures for the session integration tests.
//!
//! [`ScriptedHttp`] replays canned responses in order and records every
//! request it was sent. A reply can be held back behind a gate, which is
//! how the tests line up a logout in the middle of an in-flight call.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futuremesh_protocol::{Role, UserProfile};
use futuremesh_session::{
    InvalidationBus, MemoryBackend, MemoryNavigator, SessionConfig, SessionManager, SessionStore,
};
use futuremesh_transport::{HttpClient, HttpRequest, HttpResponse, TransportError};
use tokio::sync::oneshot;

pub const BASE: &str = "http://api.test";

struct Reply {
    result: Result<HttpResponse, TransportError>,
    gate: Option<oneshot::Receiver<()>>,
}

/// An `HttpClient` that answers from a script.
#[derive(Default)]
pub struct ScriptedHttp {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a response with a JSON body.
    pub fn reply(&self, status: u16, body: serde_json::Value) {
        self.push(Ok(HttpResponse::new(status, body.to_string().into_bytes())), None);
    }

    /// Queues a response with a raw body.
    pub fn reply_raw(&self, status: u16, body: &str) {
        self.push(Ok(HttpResponse::new(status, body.as_bytes().to_vec())), None);
    }

    /// Queues a transport failure.
    pub fn fail(&self) {
        self.push(Err(TransportError::Network("connection refused".into())), None);
    }

    /// Queues a response that is only delivered once the returned sender
    /// fires (or is dropped).
    pub fn reply_gated(&self, status: u16, body: serde_json::Value) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(
            Ok(HttpResponse::new(status, body.to_string().into_bytes())),
            Some(rx),
        );
        tx
    }

    fn push(&self, result: Result<HttpResponse, TransportError>, gate: Option<oneshot::Receiver<()>>) {
        self.replies.lock().unwrap().push_back(Reply { result, gate });
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl HttpClient for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        let Some(reply) = reply else {
            return Err(TransportError::Network("no scripted reply".into()));
        };
        if let Some(gate) = reply.gate {
            let _ = gate.await;
        }
        reply.result
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn user_json(id: u64, role: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "email": "a@b.com",
        "role": role,
        "first_name": "Ada",
    })
}

pub fn auth_json(token: &str, role: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": token,
        "user": user_json(1, role),
    })
}

pub fn profile(role: Role) -> UserProfile {
    UserProfile::new(1u64, "a@b.com", role)
}

/// Everything a test needs to drive and inspect one manager.
pub struct Harness {
    pub http: Arc<ScriptedHttp>,
    pub backend: MemoryBackend,
    pub navigator: Arc<MemoryNavigator>,
    pub manager: SessionManager<Arc<ScriptedHttp>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MemoryBackend::new(), InvalidationBus::default(), SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with(MemoryBackend::new(), InvalidationBus::default(), config)
    }

    /// A manager over `backend` on `bus`, starting on `/dashboard`.
    pub fn with(backend: MemoryBackend, bus: InvalidationBus, config: SessionConfig) -> Self {
        let http = ScriptedHttp::new();
        let navigator = Arc::new(MemoryNavigator::new("/dashboard"));
        let store = SessionStore::new(backend.clone(), &config.namespace);
        let manager = SessionManager::builder(Arc::clone(&http), BASE)
            .store(store)
            .config(config)
            .navigator(navigator.clone())
            .bus(bus)
            .build();
        Self {
            http,
            backend,
            navigator,
            manager,
        }
    }

    /// Logs in as `role` with token `token` through a scripted reply.
    pub async fn logged_in(self, token: &str, role: &str) -> Self {
        self.http.reply(200, auth_json(token, role));
        self.manager
            .login("a@b.com", "secret1")
            .await
            .expect("scripted login should succeed");
        self
    }
}
