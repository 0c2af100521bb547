//! Fakes for the pipeline's injected collaborators.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{
    navigation::Navigator,
    notify::{BroadcastNotifier, Notification},
    pipeline::{PipelineOptions, RequestPipeline},
    session::MemorySessionStore,
    transport::{Transport, TransportError, TransportRequest, TransportResponse},
};

pub(crate) const TEST_REDIRECT_DELAY: Duration = Duration::from_millis(20);

pub(crate) struct Scripted {
    pub delay: Duration,
    pub outcome: Result<TransportResponse, TransportError>,
}

impl Scripted {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(TransportResponse {
                status,
                body: serde_json::to_vec(&body).expect("encode body"),
            }),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(TransportResponse {
                status,
                body: body.as_bytes().to_vec(),
            }),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(TransportError::Connect("connection refused".to_string())),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = dyn Fn(&TransportRequest) -> Scripted + Send + Sync;

pub(crate) struct FakeTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    pub fn new(handler: impl Fn(&TransportRequest) -> Scripted + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(status: u16, body: Value) -> Self {
        Self::new(move |_| Scripted::json(status, body.clone()))
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let scripted = (self.handler)(&request);
        self.requests.lock().expect("requests lock").push(request);
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.outcome
    }
}

pub(crate) struct RecordingNavigator {
    location: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            location: Mutex::new(path.to_string()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().expect("redirects lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.location.lock().expect("location lock").clone()
    }

    fn redirect_to(&self, path: &str) {
        *self.location.lock().expect("location lock") = path.to_string();
        self.redirects
            .lock()
            .expect("redirects lock")
            .push(path.to_string());
    }
}

pub(crate) struct Harness {
    pub pipeline: Arc<RequestPipeline>,
    pub transport: Arc<FakeTransport>,
    pub store: Arc<MemorySessionStore>,
    pub notifications: broadcast::Receiver<Notification>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub fn new(transport: FakeTransport) -> Self {
        Self::with_store(transport, MemorySessionStore::new())
    }

    pub fn signed_in(transport: FakeTransport, token: &str) -> Self {
        Self::with_store(transport, MemorySessionStore::with_token(token))
    }

    fn with_store(transport: FakeTransport, store: MemorySessionStore) -> Self {
        let transport = Arc::new(transport);
        let store = Arc::new(store);
        let notifier = Arc::new(BroadcastNotifier::default());
        let notifications = notifier.subscribe();
        let navigator = Arc::new(RecordingNavigator::at("/config/token"));
        let pipeline = RequestPipeline::new_with_dependencies(
            PipelineOptions {
                base_url: "http://console.test/".to_string(),
                timeout: Duration::from_secs(5),
                login_path: "/login".to_string(),
                redirect_delay: TEST_REDIRECT_DELAY,
            },
            transport.clone(),
            store.clone(),
            notifier,
            navigator.clone(),
        )
        .expect("pipeline");

        Self {
            pipeline: Arc::new(pipeline),
            transport,
            store,
            notifications,
            navigator,
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            seen.push(notification);
        }
        seen
    }
}

/// Value of query parameter `key` on a recorded request.
pub(crate) fn query_param<'a>(request: &'a TransportRequest, key: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
