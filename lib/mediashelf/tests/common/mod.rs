//! Shared test harness for integration tests.
//!
//! Provides [`ScriptedTransport`], an in-process [`Transport`] whose replies
//! are queued per route up front. A reply can also be held back with
//! [`ScriptedTransport::hold`] and released later, in any order, to stage
//! out-of-order responses. Every request is recorded.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use mediashelf::{ApiRequest, LibraryApi, Result, ShelfError, Transport};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::oneshot;

enum Reply {
    Ready(Result<Value>),
    Held(oneshot::Receiver<Result<Value>>),
}

#[derive(Default)]
struct Script {
    replies: HashMap<(Method, String), VecDeque<Reply>>,
    calls: Vec<ApiRequest>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

/// Releases one held reply.
pub struct Held(oneshot::Sender<Result<Value>>);

impl Held {
    pub fn reply(self, body: Value) {
        let _ = self.0.send(Ok(body));
    }

    pub fn fail(self, error: ShelfError) {
        let _ = self.0.send(Err(error));
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api(&self) -> LibraryApi {
        LibraryApi::new(self.clone())
    }

    /// Queues an envelope body for the next `method path` request.
    pub fn reply(&self, method: Method, path: &str, body: Value) {
        self.push(method, path, Reply::Ready(Ok(body)));
    }

    pub fn fail(&self, method: Method, path: &str, error: ShelfError) {
        self.push(method, path, Reply::Ready(Err(error)));
    }

    /// Queues a reply that stays pending until the returned handle is used.
    pub fn hold(&self, method: Method, path: &str) -> Held {
        let (tx, rx) = oneshot::channel();
        self.push(method, path, Reply::Held(rx));
        Held(tx)
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .replies
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(request.clone());
            script
                .replies
                .get_mut(&(request.method.clone(), request.path.clone()))
                .and_then(VecDeque::pop_front)
        };
        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Held(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ShelfError::Transport("held reply dropped".into()))),
            None => Err(ShelfError::Transport(format!(
                "no scripted reply for {} {}",
                request.method, request.path
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn ok(data: Value) -> Value {
    json!({ "code": 200, "message": "success", "data": data })
}

pub fn api_error(code: u16, message: &str) -> Value {
    json!({ "code": code, "message": message, "data": null })
}

pub fn movie(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "library_folder_id": 1,
        "media_type": "movie",
        "title": title,
        "file_path": format!("/media/movies/{title}.mkv"),
        "file_size": 4_294_967_296_i64,
        "added_at": "2024-03-01T12:00:00Z",
        "updated_at": "2024-03-01T12:00:00Z",
        "metadata": null
    })
}

pub fn identified_movie(id: i64, title: &str, release_date: &str) -> Value {
    let mut item = movie(id, title);
    item["metadata"] = json!({
        "id": id * 10,
        "media_item_id": id,
        "tmdb_id": 438631,
        "tvdb_id": null,
        "imdb_id": null,
        "overview": "Paul Atreides arrives on Arrakis.",
        "poster_path": "/d5NXSklXo0qyIYkgV94XAgMIckC.jpg",
        "backdrop_path": "/jYEW5xZkZk2WTrdbMGAPFuBqbDc.jpg",
        "release_date": release_date,
        "runtime": 155,
        "vote_average": 7.8,
        "vote_count": 9000,
        "genres": "[\"Science Fiction\",\"Adventure\"]"
    });
    item
}

pub fn page(items: Vec<Value>) -> Value {
    let total = items.len();
    ok(json!({ "items": items, "total": total }))
}

pub fn candidate(id: &str, title: &str, year: i32) -> Value {
    json!({
        "id": id,
        "title": title,
        "year": year,
        "media_type": "movie",
        "poster": "/poster.jpg",
        "provider": "tmdb",
        "score": 90,
        "confidence": "high"
    })
}
