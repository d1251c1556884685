//! In-process HTTP targets for probe and scheduler tests.

use axum::extract::State;
use axum::http::{header::USER_AGENT, HeaderMap, StatusCode, Uri};
use axum::Router;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Requests {
    paths: Arc<Mutex<Vec<String>>>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

/// A local server: `/down` answers 503, `/slow` stalls for 2s, anything else is 200.
pub struct TestServer {
    base: String,
    requests: Requests,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let requests = Requests::default();
        let app = Router::new().fallback(respond).with_state(requests.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            requests,
        }
    }

    /// A URL on a port nothing listens on.
    pub fn closed_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Paths requested so far, in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.requests.paths.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.paths.lock().unwrap().len()
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.requests.user_agents.lock().unwrap().clone()
    }
}

async fn respond(State(requests): State<Requests>, uri: Uri, headers: HeaderMap) -> StatusCode {
    requests.paths.lock().unwrap().push(uri.path().to_string());
    if let Some(agent) = headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
        requests.user_agents.lock().unwrap().push(agent.to_string());
    }

    match uri.path() {
        "/down" => StatusCode::SERVICE_UNAVAILABLE,
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::OK
        }
        _ => StatusCode::OK,
    }
}
