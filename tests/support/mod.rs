#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use admin_console::error::{ConsoleError, ConsoleResult};
use admin_console::notify::NoticeLog;
use admin_console::resource::{Resource, ResourceController};
use admin_console::session::{MemoryTokenStore, SessionContext, StoredToken};
use admin_console::transport::{ApiRequest, ApiTransport, Endpoint, Envelope};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

pub const TEST_TOKEN: &str = "test-token";

/// One scripted reply, optionally held back until a gate fires or a delay passes.
struct Reply {
    result: ConsoleResult<Envelope>,
    gate: Option<oneshot::Receiver<()>>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct Route {
    queued: VecDeque<Reply>,
    fallback: Option<ConsoleResult<Envelope>>,
}

/// In-process stand-in for the REST API.
///
/// Replies are keyed by `"METHOD /path"`. Queued replies are consumed in
/// order; once a route's queue is empty its fallback (if any) is repeated.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a single reply.
    pub fn respond(&self, endpoint: Endpoint, result: ConsoleResult<Envelope>) {
        self.push(endpoint, Reply {
            result,
            gate: None,
            delay: None,
        });
    }

    /// Queues a reply that is only delivered after `gate` fires.
    pub fn respond_when(
        &self,
        endpoint: Endpoint,
        result: ConsoleResult<Envelope>,
        gate: oneshot::Receiver<()>,
    ) {
        self.push(endpoint, Reply {
            result,
            gate: Some(gate),
            delay: None,
        });
    }

    pub fn respond_after(&self, endpoint: Endpoint, result: ConsoleResult<Envelope>, delay: Duration) {
        self.push(endpoint, Reply {
            result,
            gate: None,
            delay: Some(delay),
        });
    }

    /// Reply used whenever the route's queue is empty.
    pub fn always(&self, endpoint: Endpoint, result: ConsoleResult<Envelope>) {
        self.routes
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .fallback = Some(result);
    }

    fn push(&self, endpoint: Endpoint, reply: Reply) {
        self.routes
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .queued
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls made to one endpoint, in order.
    pub fn calls_to(&self, endpoint: &Endpoint) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|call| &call.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// `"METHOD /path"` of every call, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.endpoint.to_string())
            .collect()
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> ConsoleResult<Envelope> {
        let key = request.endpoint.to_string();
        self.calls.lock().push(request);

        let reply = {
            let mut routes = self.routes.lock();
            let route = routes.get_mut(&key);
            match route {
                Some(route) => match route.queued.pop_front() {
                    Some(reply) => reply,
                    None => match &route.fallback {
                        Some(result) => Reply {
                            result: result.clone(),
                            gate: None,
                            delay: None,
                        },
                        None => Reply {
                            result: Err(ConsoleError::Transport(format!("no reply scripted for {key}"))),
                            gate: None,
                            delay: None,
                        },
                    },
                },
                None => Reply {
                    result: Err(ConsoleError::Transport(format!("no route for {key}"))),
                    gate: None,
                    delay: None,
                },
            }
        };

        if let Some(gate) = reply.gate {
            let _ = gate.await;
        }
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.result
    }
}

pub fn ok_with(key: &str, value: Value) -> ConsoleResult<Envelope> {
    Ok(Envelope::ok().with(key, value))
}

pub fn ok_message(message: &str) -> ConsoleResult<Envelope> {
    let mut envelope = Envelope::ok();
    envelope.message = Some(message.to_string());
    Ok(envelope)
}

/// `{"success": false, "message": ...}` with a 2xx status.
pub fn rejected(message: &str) -> ConsoleResult<Envelope> {
    Ok(Envelope::failure(message))
}

pub fn network_down() -> ConsoleResult<Envelope> {
    Err(ConsoleError::Transport("connection refused".to_string()))
}

pub fn logged_in_store() -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_token(StoredToken::issue(
        TEST_TOKEN,
        Utc::now(),
    )))
}

pub fn session() -> SessionContext {
    SessionContext::new(TEST_TOKEN)
}

pub fn controller<R: Resource>(
    transport: &Arc<MockTransport>,
) -> (ResourceController<R>, NoticeLog) {
    let notices = NoticeLog::new();
    let controller = ResourceController::new(session(), transport.clone(), Arc::new(notices.clone()));
    (controller, notices)
}

pub mod fixtures {
    use serde_json::{Value, json};

    pub fn product(id: &str, name: &str, category: &str) -> Value {
        json!({
            "_id": id,
            "name": name,
            "price": 99.5,
            "stock": 4,
            "category": category,
            "description": "",
            "images": [{"url": format!("https://cdn.example.com/{id}.png"), "public_id": id}],
            "trending": "N",
        })
    }

    pub fn order(id: &str, status: &str) -> Value {
        json!({
            "_id": id,
            "user": {"_id": "u1", "name": "Asha", "email": "asha@example.com"},
            "orderItems": [{"product": "p1", "name": "Gold Band", "price": 50.0, "quantity": 2}],
            "itemsPrice": 100.0,
            "taxPrice": 18.0,
            "shippingPrice": 0.0,
            "totalPrice": 118.0,
            "orderStatus": status,
            "createdAt": "2024-05-01T12:00:00Z",
        })
    }

    pub fn user(id: &str, name: &str) -> Value {
        json!({
            "_id": id,
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "createdAt": "2024-01-15T08:30:00Z",
        })
    }

    pub fn event(id: &str, title: &str) -> Value {
        json!({
            "_id": id,
            "title": title,
            "description": "",
            "startDate": "2024-06-01T10:00:00Z",
            "endDate": "2024-06-03T18:00:00Z",
            "discount": 20,
            "images": [],
            "active": true,
        })
    }
}
