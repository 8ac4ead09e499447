use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

use super::remote::{ErrorHandler, PushHandler, RemoteStore, Subscription};
use crate::core::item::{ItemFields, RemoteDocument};
use crate::error::RemoteError;

/// A write that reached the store, in commit order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Insert { token: String, id: String },
    Update { token: String, id: String },
    Delete { token: String, id: String },
}

struct Subscriber {
    id: u64,
    token: String,
    on_push: PushHandler,
    on_error: ErrorHandler,
}

enum Delivery {
    Push(PushHandler, Vec<RemoteDocument>),
    Error(ErrorHandler, RemoteError),
}

impl Delivery {
    fn run(self) {
        match self {
            Self::Push(handler, docs) => handler(docs),
            Self::Error(handler, err) => handler(err),
        }
    }
}

#[derive(Default)]
struct Inner {
    partitions: HashMap<String, BTreeMap<String, ItemFields>>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    held: Option<Vec<Delivery>>,
    subscribe_failure: Option<RemoteError>,
    read_failure: Option<RemoteError>,
    write_failure: Option<RemoteError>,
    writes: Vec<WriteRecord>,
}

impl Inner {
    fn snapshot(&self, token: &str) -> Vec<RemoteDocument> {
        self.partitions
            .get(token)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| RemoteDocument {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Queue or return a snapshot for every subscriber of `token`.
    fn notify(&mut self, token: &str) -> Vec<Delivery> {
        let snapshot = self.snapshot(token);
        let deliveries: Vec<Delivery> = self
            .subscribers
            .iter()
            .filter(|s| s.token == token)
            .map(|s| Delivery::Push(s.on_push.clone(), snapshot.clone()))
            .collect();
        self.dispatch(deliveries)
    }

    fn dispatch(&mut self, deliveries: Vec<Delivery>) -> Vec<Delivery> {
        match self.held.as_mut() {
            Some(queue) => {
                queue.extend(deliveries);
                Vec::new()
            }
            None => deliveries,
        }
    }
}

fn check_token(token: &str) -> Result<(), RemoteError> {
    if token.trim().is_empty() || token.contains('/') {
        return Err(RemoteError::Other(format!("invalid partition key: {:?}", token)));
    }
    Ok(())
}

/// In-process [`RemoteStore`]. Every committed write pushes a fresh snapshot
/// to the partition's subscribers, and subscribing pushes the current state.
///
/// Deliveries can be held back and released later to reproduce callbacks
/// that fire after their subscription was cancelled.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a document directly, as another client would.
    pub fn seed(&self, token: &str, fields: ItemFields) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let deliveries = {
            let mut inner = self.lock();
            inner
                .partitions
                .entry(token.to_string())
                .or_default()
                .insert(id.clone(), fields);
            inner.notify(token)
        };
        deliveries.into_iter().for_each(Delivery::run);
        id
    }

    pub fn documents(&self, token: &str) -> Vec<RemoteDocument> {
        self.lock().snapshot(token)
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn subscriber_count(&self, token: &str) -> usize {
        self.lock().subscribers.iter().filter(|s| s.token == token).count()
    }

    /// Queue deliveries instead of running them.
    pub fn hold_deliveries(&self) {
        let mut inner = self.lock();
        if inner.held.is_none() {
            inner.held = Some(Vec::new());
        }
    }

    /// Run every queued delivery, including those whose subscription has
    /// since been cancelled. Returns how many ran.
    pub fn release_deliveries(&self) -> usize {
        let queued = self.lock().held.take().unwrap_or_default();
        let count = queued.len();
        queued.into_iter().for_each(Delivery::run);
        count
    }

    pub fn fail_subscriptions(&self, error: Option<RemoteError>) {
        self.lock().subscribe_failure = error;
    }

    pub fn fail_reads(&self, error: Option<RemoteError>) {
        self.lock().read_failure = error;
    }

    pub fn fail_writes(&self, error: Option<RemoteError>) {
        self.lock().write_failure = error;
    }

    /// Report a stream error to every subscriber of `token`.
    pub fn push_error(&self, token: &str, error: RemoteError) {
        let deliveries = {
            let mut inner = self.lock();
            let deliveries: Vec<Delivery> = inner
                .subscribers
                .iter()
                .filter(|s| s.token == token)
                .map(|s| Delivery::Error(s.on_error.clone(), error.clone()))
                .collect();
            inner.dispatch(deliveries)
        };
        deliveries.into_iter().for_each(Delivery::run);
    }

    fn write<T>(
        &self,
        token: &str,
        apply: impl FnOnce(&mut Inner) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        check_token(token)?;
        let (result, deliveries) = {
            let mut inner = self.lock();
            if let Some(err) = inner.write_failure.clone() {
                return Err(err);
            }
            let result = apply(&mut *inner)?;
            let deliveries = inner.notify(token);
            (result, deliveries)
        };
        deliveries.into_iter().for_each(Delivery::run);
        Ok(result)
    }
}

fn unsubscribe(inner: &Weak<Mutex<Inner>>, id: u64) {
    if let Some(inner) = inner.upgrade() {
        let mut guard = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.subscribers.retain(|s| s.id != id);
    }
}

impl RemoteStore for MemoryRemote {
    fn subscribe(
        &self,
        token: &str,
        on_push: PushHandler,
        on_error: ErrorHandler,
    ) -> Result<Subscription, RemoteError> {
        check_token(token)?;
        let (id, deliveries) = {
            let mut inner = self.lock();
            if let Some(err) = inner.subscribe_failure.clone() {
                return Err(err);
            }
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            let initial = Delivery::Push(on_push.clone(), inner.snapshot(token));
            inner.subscribers.push(Subscriber {
                id,
                token: token.to_string(),
                on_push,
                on_error,
            });
            (id, inner.dispatch(vec![initial]))
        };
        deliveries.into_iter().for_each(Delivery::run);

        let weak = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || unsubscribe(&weak, id)))
    }

    async fn read_once(&self, token: &str) -> Result<Vec<RemoteDocument>, RemoteError> {
        check_token(token)?;
        let inner = self.lock();
        if let Some(err) = inner.read_failure.clone() {
            return Err(err);
        }
        Ok(inner.snapshot(token))
    }

    async fn insert(&self, token: &str, fields: ItemFields) -> Result<String, RemoteError> {
        let id = Uuid::new_v4().simple().to_string();
        self.write(token, |inner| {
            inner
                .partitions
                .entry(token.to_string())
                .or_default()
                .insert(id.clone(), fields);
            inner.writes.push(WriteRecord::Insert {
                token: token.to_string(),
                id: id.clone(),
            });
            Ok(id.clone())
        })
    }

    async fn update_fields(&self, token: &str, id: &str, fields: ItemFields) -> Result<(), RemoteError> {
        self.write(token, |inner| {
            let doc = inner
                .partitions
                .get_mut(token)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| RemoteError::NotFound(format!("{}/{}", token, id)))?;
            doc.apply(&fields);
            inner.writes.push(WriteRecord::Update {
                token: token.to_string(),
                id: id.to_string(),
            });
            Ok(())
        })
    }

    async fn delete(&self, token: &str, id: &str) -> Result<(), RemoteError> {
        self.write(token, |inner| {
            if let Some(docs) = inner.partitions.get_mut(token) {
                docs.remove(id);
            }
            inner.writes.push(WriteRecord::Delete {
                token: token.to_string(),
                id: id.to_string(),
            });
            Ok(())
        })
    }
}
