// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory xAPI tree.
//!
//! Behaves like a device that never disconnects: reads and writes go to a JSON tree, feedback
//! is produced by [`MemoryXapi::emit`] and failures can be injected per subtree. Every request is
//! recorded so callers can assert on what was asked of the device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::path::{has_id, Namespace, Segment};
use crate::{FeedbackHandler, Path, SubscriptionId, Xapi, XapiError};

type CommandReply = Arc<dyn Fn(&Path, &Value) -> Result<Value, XapiError> + Send + Sync>;

struct Listener {
    id: SubscriptionId,
    path: Path,
    handler: FeedbackHandler,
}

#[derive(Default)]
struct Inner {
    tree: Mutex<Value>,
    failures: Mutex<Vec<(Path, XapiError)>>,
    subscribe_failures: Mutex<Vec<Path>>,
    listeners: Mutex<Vec<Listener>>,
    reads: Mutex<Vec<Path>>,
    writes: Mutex<Vec<(Path, Value)>>,
    commands: Mutex<Vec<(Path, Value)>>,
    command_reply: Mutex<Option<CommandReply>>,
    next_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct MemoryXapi {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryXapi {
    pub fn new(tree: Value) -> Self {
        let xapi = Self::default();
        *lock(&xapi.inner.tree) = tree;
        xapi
    }

    /// Sets the node at `path`, creating intermediate nodes.
    pub fn insert(&self, path: &str, value: Value) {
        let path = Path::new(path);
        insert_at(&mut lock(&self.inner.tree), path.segments(), value);
    }

    /// Makes every read or write at or below `path` fail with `error`.
    pub fn fail(&self, path: &str, error: XapiError) {
        lock(&self.inner.failures).push((Path::new(path), error));
    }

    pub fn clear_failures(&self) {
        lock(&self.inner.failures).clear();
        lock(&self.inner.subscribe_failures).clear();
    }

    /// Makes feedback registrations at or below `path` fail.
    pub fn fail_subscriptions(&self, path: &str) {
        lock(&self.inner.subscribe_failures).push(Path::new(path));
    }

    /// Replaces the default command reply (`{"StatusCode": "200"}`).
    pub fn reply_to_commands<F>(&self, reply: F)
    where
        F: Fn(&Path, &Value) -> Result<Value, XapiError> + Send + Sync + 'static,
    {
        *lock(&self.inner.command_reply) = Some(Arc::new(reply));
    }

    /// Publishes a change of the node at `path`. Status nodes are updated in the tree first.
    /// Returns the number of handlers fired.
    pub fn emit(&self, path: &str, value: Value) -> usize {
        let path = Path::new(path);
        if path.namespace() == Some(Namespace::Status) {
            insert_at(&mut lock(&self.inner.tree), path.segments(), value.clone());
        }

        let handlers: Vec<FeedbackHandler> = lock(&self.inner.listeners)
            .iter()
            .filter(|listener| listener.path.contains(&path))
            .map(|listener| Arc::clone(&listener.handler))
            .collect();

        debug!("Emitting {path} to {} listeners", handlers.len());
        for handler in &handlers {
            handler(value.clone());
        }
        handlers.len()
    }

    pub fn reads(&self) -> Vec<Path> {
        lock(&self.inner.reads).clone()
    }

    pub fn writes(&self) -> Vec<(Path, Value)> {
        lock(&self.inner.writes).clone()
    }

    pub fn commands(&self) -> Vec<(Path, Value)> {
        lock(&self.inner.commands).clone()
    }

    pub fn subscriptions(&self) -> Vec<Path> {
        lock(&self.inner.listeners)
            .iter()
            .map(|listener| listener.path.clone())
            .collect()
    }

    fn failure(&self, path: &Path) -> Option<XapiError> {
        lock(&self.inner.failures)
            .iter()
            .find(|(failing, _)| failing.contains(path))
            .map(|(_, error)| error.clone())
    }
}

#[async_trait]
impl Xapi for MemoryXapi {
    async fn get(&self, path: &Path) -> Result<Value, XapiError> {
        lock(&self.inner.reads).push(path.clone());
        if let Some(error) = self.failure(path) {
            return Err(error);
        }
        match path.lookup(&lock(&self.inner.tree)) {
            None | Some(Value::Null) => Err(XapiError::NoSuchPath(path.to_string())),
            Some(value) => Ok(value.clone()),
        }
    }

    async fn set(&self, path: &Path, value: Value) -> Result<(), XapiError> {
        if let Some(error) = self.failure(path) {
            return Err(error);
        }
        lock(&self.inner.writes).push((path.clone(), value.clone()));
        insert_at(&mut lock(&self.inner.tree), path.segments(), value);
        Ok(())
    }

    async fn on(&self, path: &Path, handler: FeedbackHandler) -> Result<SubscriptionId, XapiError> {
        if lock(&self.inner.subscribe_failures)
            .iter()
            .any(|failing| failing.contains(path))
        {
            return Err(XapiError::NoSuchPath(path.to_string()));
        }
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.inner.listeners).push(Listener {
            id,
            path: path.clone(),
            handler,
        });
        debug!("Registered feedback {id} on {path}");
        Ok(id)
    }

    async fn command(&self, path: &Path, params: Value) -> Result<Value, XapiError> {
        lock(&self.inner.commands).push((path.clone(), params.clone()));
        let reply = lock(&self.inner.command_reply).clone();
        match reply {
            Some(reply) => reply(path, &params),
            None => Ok(json!({ "StatusCode": "200" })),
        }
    }
}

fn insert_at(node: &mut Value, segments: &[Segment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    match first {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                insert_at(map.entry(key.clone()).or_insert(Value::Null), rest, value);
            }
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            if let Value::Array(items) = node {
                let position = match items.iter().position(|item| has_id(item, *index)) {
                    Some(position) => position,
                    None => {
                        items.push(json!({ "id": index.to_string() }));
                        items.len() - 1
                    }
                };
                insert_at(&mut items[position], rest, value);
            }
        }
    }
}
