//! Test doubles shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::rules::Connectivity;
use crate::strategy::StrategyCx;
use overcast_client::{FetchResponse, Fetcher};
use overcast_core::{CacheStore, CachedResponse, Error, Generation, RequestKey};

#[derive(Clone)]
enum Canned {
    Response { status: u16, content_type: Option<String>, body: Vec<u8> },
    Transport(String),
}

/// Scripted fetcher: canned responses per URL, call counting, optional
/// latency. URLs without a script produce a transport error.
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Canned>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self { responses: Mutex::new(HashMap::new()), calls: AtomicUsize::new(0), delay: None }
    }

    pub fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.respond_with(url, status, Some("text/plain"), body.as_bytes())
    }

    pub fn respond_with(self, url: &str, status: u16, content_type: Option<&str>, body: &[u8]) -> Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Canned::Response {
                status,
                content_type: content_type.map(str::to_string),
                body: body.to_vec(),
            },
        );
        self
    }

    pub fn fail(self, url: &str, reason: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Transport(reason.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace a script after construction (e.g. to change what a refresh
    /// sees).
    pub fn set_response(&self, url: &str, status: u16, body: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Canned::Response { status, content_type: Some("text/plain".into()), body: body.as_bytes().to_vec() },
        );
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let canned = self.responses.lock().unwrap().get(url).cloned();
        match canned {
            Some(Canned::Response { status, content_type, body }) => Ok(FetchResponse {
                url: url.to_string(),
                final_url: url.to_string(),
                status,
                content_type,
                headers_json: None,
                body: Bytes::from(body),
                fetch_ms: 0,
            }),
            Some(Canned::Transport(reason)) => Err(Error::NetworkFetch(reason)),
            None => Err(Error::NetworkFetch(format!("no canned response for {url}"))),
        }
    }

    async fn fetch_no_cache(&self, url: &str) -> Result<FetchResponse, Error> {
        self.fetch(url).await
    }
}

/// Strategy context over an in-memory store with one open generation.
pub async fn test_cx(stub: Arc<StubFetcher>) -> StrategyCx {
    let store = CacheStore::open_in_memory().await.unwrap();
    let generation = Generation::new("test", "1");
    store.open_generation(&generation).await.unwrap();
    let net: Arc<dyn Fetcher> = stub;
    StrategyCx {
        store,
        net,
        generation,
        connectivity: Connectivity::assume_online(),
        ignore_query: false,
    }
}

/// Seed a 200 entry for a GET of `url`.
pub async fn seed_entry(cx: &StrategyCx, url: &str, body: &str) {
    let key = RequestKey::get(url);
    let response = CachedResponse {
        url: url.to_string(),
        status: 200,
        content_type: Some("text/plain".to_string()),
        headers_json: None,
        body: body.as_bytes().to_vec(),
        fetched_at: chrono::Utc::now().to_rfc3339(),
    };
    cx.store.put(&cx.generation, &key, &response).await.unwrap();
}
