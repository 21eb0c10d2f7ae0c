//! Scripted transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::transport::{ApiRequest, Method, RawResponse, Transport, TransportError};

#[derive(Clone)]
pub(crate) enum Scripted {
    Respond(u16, String),
    /// Hold the response until the gate is notified
    Gated(Arc<Notify>, u16, String),
    Unreachable,
}

/// Responses are queued per (method, path). The last queued response
/// repeats once the queue is down to one entry.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn script(&self, method: Method, path: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub(crate) fn respond(&self, method: Method, path: &str, status: u16, body: &str) {
        self.script(method, path, Scripted::Respond(status, body.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn next(&self, request: &ApiRequest) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(request.method, request.path.clone()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.next(request) {
            Some(Scripted::Respond(status, body)) => Ok(RawResponse { status, body }),
            Some(Scripted::Gated(gate, status, body)) => {
                gate.notified().await;
                Ok(RawResponse { status, body })
            }
            Some(Scripted::Unreachable) => {
                Err(TransportError::NoResponse("connection refused".to_string()))
            }
            None => Ok(RawResponse {
                status: 404,
                body: format!(r#"{{"detail": "no script for {}"}}"#, request.path),
            }),
        }
    }
}
