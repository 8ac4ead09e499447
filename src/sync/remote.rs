use std::future::Future;
use std::sync::Arc;

use crate::core::item::{ItemFields, RemoteDocument};
use crate::error::RemoteError;

pub type PushHandler = Arc<dyn Fn(Vec<RemoteDocument>) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(RemoteError) + Send + Sync>;

/// Document store holding one partition of item documents per list token.
///
/// Subscriptions deliver the full current state of the partition on every
/// change, including changes made through this same store. Cancelling a
/// subscription only promises to stop future deliveries; a callback already
/// scheduled may still run.
pub trait RemoteStore: Send + Sync {
    fn subscribe(
        &self,
        token: &str,
        on_push: PushHandler,
        on_error: ErrorHandler,
    ) -> Result<Subscription, RemoteError>;

    fn read_once(&self, token: &str)
    -> impl Future<Output = Result<Vec<RemoteDocument>, RemoteError>> + Send;

    /// Returns the id assigned to the new document.
    fn insert(&self, token: &str, fields: ItemFields)
    -> impl Future<Output = Result<String, RemoteError>> + Send;

    fn update_fields(&self, token: &str, id: &str, fields: ItemFields)
    -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn delete(&self, token: &str, id: &str)
    -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Live subscription guard. Cancels on [`Subscription::cancel`] or drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
