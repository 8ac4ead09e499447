use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::remote::{ErrorHandler, PushHandler, RemoteStore, Subscription};
use super::tokens::{FileStore, KeyValueStore, TokenCache};
use crate::config::RestockConfig;
use crate::core::dates::{Clock, SystemClock, add_days};
use crate::core::estimate::{PurchaseEstimator, PurchaseUpdate};
use crate::core::item::{Item, RemoteDocument, filter_by_name, normalize_name};
use crate::core::token::generate_token;
use crate::core::urgency::{UrgencyThresholds, UrgentItem};
use crate::error::{RemoteError, RemoteOperation, SessionError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Subscribing { token: String },
    Live { token: String },
}

impl SessionState {
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Subscribing { token } | Self::Live { token } => Some(token),
        }
    }
}

enum Delivery {
    Push(Vec<RemoteDocument>),
    Failed(RemoteError),
}

/// A store callback tagged with the selection it was registered for.
struct SessionEvent {
    generation: u64,
    delivery: Delivery,
}

/// Outcome of applying one queued store callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Published { token: String, count: usize },
    Failed { token: String, error: RemoteError },
    /// The callback belonged to a selection that has since been replaced.
    Discarded,
}

/// The open shopping list: one subscription, its published records and the
/// mutations that feed back into the store.
///
/// Store callbacks only enqueue; nothing reaches the published records until
/// [`ListSession::pump`] or [`ListSession::next_event`] applies it, and only
/// if its generation still matches the current selection.
pub struct ListSession<S: RemoteStore, K: KeyValueStore> {
    store: Arc<S>,
    tokens: TokenCache<K>,
    clock: Arc<dyn Clock>,
    estimator: PurchaseEstimator,
    thresholds: UrgencyThresholds,
    state: SessionState,
    generation: u64,
    subscription: Option<Subscription>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    records: watch::Sender<Arc<[Item]>>,
    records_token: Option<String>,
    last_error: Option<RemoteError>,
}

impl<S: RemoteStore, K: KeyValueStore> ListSession<S, K> {
    pub fn new(store: Arc<S>, tokens: TokenCache<K>, clock: Arc<dyn Clock>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (records, _) = watch::channel(Arc::<[Item]>::from(Vec::new()));
        Self {
            store,
            tokens,
            clock,
            estimator: PurchaseEstimator::default(),
            thresholds: UrgencyThresholds::default(),
            state: SessionState::Idle,
            generation: 0,
            subscription: None,
            events_tx,
            events_rx,
            records,
            records_token: None,
            last_error: None,
        }
    }

    pub fn with_estimator(mut self, estimator: PurchaseEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_thresholds(mut self, thresholds: UrgencyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn active_token(&self) -> Option<&str> {
        self.state.token()
    }

    pub fn last_error(&self) -> Option<&RemoteError> {
        self.last_error.as_ref()
    }

    pub fn saved_tokens(&self) -> &[String] {
        self.tokens.list()
    }

    // ---- Selection ----

    /// Switch to `token`, or close the list with `None`.
    ///
    /// The previous subscription is always released first. On a failed
    /// subscribe the session keeps the new token selected and the old
    /// records published; selecting again retries. The token is saved as
    /// the active list only once its subscription is open.
    pub fn select_token(&mut self, token: Option<&str>) -> Result<(), SessionError> {
        self.release_subscription();

        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            log::info!("List closed");
            self.state = SessionState::Idle;
            self.records_token = None;
            self.records.send_replace(Arc::from(Vec::new()));
            self.tokens.set_active(None);
            return Ok(());
        };

        let token = token.to_string();
        self.state = SessionState::Subscribing {
            token: token.clone(),
        };

        let generation = self.generation;
        let push_tx = self.events_tx.clone();
        let on_push: PushHandler = Arc::new(move |docs: Vec<RemoteDocument>| {
            let _ = push_tx.send(SessionEvent {
                generation,
                delivery: Delivery::Push(docs),
            });
        });
        let error_tx = self.events_tx.clone();
        let on_error: ErrorHandler = Arc::new(move |error: RemoteError| {
            let _ = error_tx.send(SessionEvent {
                generation,
                delivery: Delivery::Failed(error),
            });
        });

        match self.store.subscribe(&token, on_push, on_error) {
            Ok(subscription) => {
                log::info!("Subscribed to list {} (generation {})", token, generation);
                self.subscription = Some(subscription);
                self.tokens.set_active(Some(&token));
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to subscribe to list {}: {}", token, e);
                self.last_error = Some(e.clone());
                Err(SessionError::remote(RemoteOperation::Subscribe)(e))
            }
        }
    }

    fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.generation += 1;
    }

    /// Start a brand-new list under a generated token.
    pub fn create_list(&mut self) -> Result<String, SessionError> {
        let token = generate_token();
        log::info!("Created list {}", token);
        self.tokens.add(&token);
        self.select_token(Some(&token))?;
        Ok(token)
    }

    /// Open somebody else's list after checking that it can be read.
    pub async fn join_list(&mut self, token: &str) -> Result<(), SessionError> {
        let token = token.trim().to_string();
        if !self.validate_token(&token).await {
            return Err(ValidationError::InvalidToken(token).into());
        }
        self.tokens.add(&token);
        self.select_token(Some(&token))
    }

    /// Reopen the list that was active when the cache was last saved.
    pub fn restore(&mut self) -> Result<Option<String>, SessionError> {
        let Some(token) = self.tokens.active().map(str::to_string) else {
            return Ok(None);
        };
        self.select_token(Some(&token))?;
        Ok(Some(token))
    }

    /// Drop `token` from the saved lists. The list's items are not touched.
    pub fn forget_token(&mut self, token: &str) -> bool {
        self.tokens.remove(token)
    }

    /// A token is valid when its partition can be read, even if empty.
    pub async fn validate_token(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }
        match self.store.read_once(token).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("List token {} rejected: {}", token, e);
                false
            }
        }
    }

    // ---- Event loop ----

    /// Apply every callback queued so far without waiting.
    pub fn pump(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            applied.push(self.apply(event));
        }
        applied
    }

    /// Wait for the next store callback and apply it.
    pub async fn next_event(&mut self) -> Option<Applied> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    fn apply(&mut self, event: SessionEvent) -> Applied {
        if event.generation != self.generation {
            log::debug!(
                "Discarding callback from generation {} (current {})",
                event.generation,
                self.generation
            );
            return Applied::Discarded;
        }
        let Some(token) = self.state.token().map(str::to_string) else {
            return Applied::Discarded;
        };

        match event.delivery {
            Delivery::Push(docs) => {
                let items: Vec<Item> = docs.into_iter().map(Item::from_document).collect();
                let count = items.len();
                self.records.send_replace(Arc::from(items));
                self.records_token = Some(token.clone());
                self.last_error = None;
                if !matches!(self.state, SessionState::Live { .. }) {
                    log::info!("List {} is live", token);
                }
                self.state = SessionState::Live {
                    token: token.clone(),
                };
                Applied::Published { token, count }
            }
            Delivery::Failed(error) => {
                log::error!("Subscription to list {} failed: {}", token, error);
                self.last_error = Some(error.clone());
                Applied::Failed { token, error }
            }
        }
    }

    // ---- Published records ----

    /// The last published record set, whatever list it belongs to.
    pub fn records(&self) -> Arc<[Item]> {
        self.records.borrow().clone()
    }

    /// Receiver that sees every wholesale replacement of the record set.
    pub fn watch(&self) -> watch::Receiver<Arc<[Item]>> {
        self.records.subscribe()
    }

    /// Records of the selected list, classified and ordered as of now.
    pub fn urgent_items(&self) -> Vec<UrgentItem> {
        self.thresholds
            .sort_by_urgency(self.current_records().iter(), self.clock.now())
    }

    /// [`ListSession::urgent_items`] restricted to names containing `term`.
    pub fn search(&self, term: &str) -> Vec<UrgentItem> {
        let matching = filter_by_name(self.current_records().iter(), term);
        self.thresholds.sort_by_urgency(&matching, self.clock.now())
    }

    fn current_records(&self) -> Arc<[Item]> {
        match (self.active_token(), self.records_token.as_deref()) {
            (Some(active), Some(owner)) if active == owner => self.records(),
            _ => Arc::from(Vec::new()),
        }
    }

    fn find_item(&self, item_id: &str) -> Result<Item, ValidationError> {
        self.current_records()
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownItem(item_id.to_string()))
    }

    fn require_token(&self) -> Result<String, ValidationError> {
        self.active_token()
            .map(str::to_string)
            .ok_or(ValidationError::NoActiveList)
    }

    // ---- Mutations ----

    /// Add `name`, due again in `estimate_days`. Returns the new item's id.
    ///
    /// Queued callbacks are applied first so the duplicate check sees every
    /// snapshot already delivered. Until the list's first snapshot arrives
    /// the add is refused with [`ValidationError::ListNotLoaded`].
    pub async fn add_item(&mut self, name: &str, estimate_days: f64) -> Result<String, SessionError> {
        let token = self.require_token()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::BlankName.into());
        }
        if !estimate_days.is_finite() {
            return Err(ValidationError::InvalidEstimate.into());
        }
        self.pump();
        if !matches!(self.state, SessionState::Live { .. })
            || self.records_token.as_deref() != Some(token.as_str())
        {
            return Err(ValidationError::ListNotLoaded.into());
        }
        let normalized = normalize_name(name);
        let duplicate = self.current_records().iter().any(|item| {
            item.normalized_name == normalized || normalize_name(&item.name) == normalized
        });
        if duplicate {
            return Err(ValidationError::DuplicateName(name.to_string()).into());
        }

        let now = self.clock.now();
        let fields = Item::new_fields(name, now, add_days(now, estimate_days));
        let id = self
            .store
            .insert(&token, fields)
            .await
            .map_err(|e| {
                log::error!("Failed to add {} to list {}: {}", name, token, e);
                SessionError::remote(RemoteOperation::Insert)(e)
            })?;
        log::info!("Added {} to list {}", name, token);
        Ok(id)
    }

    /// Record a purchase of `item_id` now and reschedule it.
    pub async fn confirm_purchase(&self, item_id: &str) -> Result<PurchaseUpdate, SessionError> {
        let token = self.require_token()?;
        let item = self.find_item(item_id)?;
        let update = self.estimator.confirm(&item, self.clock.now());
        self.store
            .update_fields(&token, &item.id, update.to_fields())
            .await
            .map_err(|e| {
                log::error!("Failed to mark {} purchased: {}", item.name, e);
                SessionError::remote(RemoteOperation::Update)(e)
            })?;
        log::info!(
            "Purchased {} (#{}), next in {} days",
            item.name,
            update.total_purchases,
            update.estimate_days
        );
        Ok(update)
    }

    pub async fn delete_item(&self, item_id: &str) -> Result<(), SessionError> {
        let token = self.require_token()?;
        let item = self.find_item(item_id)?;
        self.store
            .delete(&token, &item.id)
            .await
            .map_err(|e| {
                log::error!("Failed to delete {}: {}", item.name, e);
                SessionError::remote(RemoteOperation::Delete)(e)
            })?;
        log::info!("Deleted {} from list {}", item.name, token);
        Ok(())
    }
}

impl<S: RemoteStore> ListSession<S, FileStore> {
    /// Session on the wall clock, with the saved tokens and thresholds from
    /// `config`.
    pub fn open(store: Arc<S>, config: &RestockConfig) -> Self {
        let tokens = TokenCache::load(config.token_store());
        Self::new(store, tokens, Arc::new(SystemClock)).with_thresholds(config.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dates::FixedClock;
    use crate::core::item::ItemFields;
    use crate::core::urgency::Urgency;
    use crate::sync::memory::{MemoryRemote, WriteRecord};
    use crate::sync::tokens::MemoryKv;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    type Session = ListSession<MemoryRemote, MemoryKv>;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    fn setup(store: &MemoryRemote) -> (Session, Arc<FixedClock>, MemoryKv) {
        let clock = Arc::new(FixedClock::new(start()));
        let kv = MemoryKv::new();
        let session = ListSession::new(
            Arc::new(store.clone()),
            TokenCache::load(kv.clone()),
            clock.clone(),
        );
        (session, clock, kv)
    }

    fn fields(name: &str, next_in: i64) -> ItemFields {
        Item::new_fields(name, start(), start() + Duration::days(next_in))
    }

    fn names(session: &Session) -> Vec<String> {
        session
            .urgent_items()
            .into_iter()
            .map(|u| u.item.name)
            .collect()
    }

    #[tokio::test]
    async fn first_push_makes_the_session_live() {
        let store = MemoryRemote::new();
        store.seed("oak fox mint", fields("Milk", 3));
        store.seed("oak fox mint", fields("Rice", 40));
        let (mut session, _, _) = setup(&store);

        session.select_token(Some("oak fox mint")).unwrap();
        assert_eq!(
            session.state(),
            &SessionState::Subscribing {
                token: "oak fox mint".into()
            }
        );

        let applied = session.pump();
        assert_eq!(
            applied,
            vec![Applied::Published {
                token: "oak fox mint".into(),
                count: 2
            }]
        );
        assert!(matches!(session.state(), SessionState::Live { .. }));

        let urgent = session.urgent_items();
        assert_eq!(urgent[0].item.name, "Milk");
        assert_eq!(urgent[0].urgency, Urgency::Soon);
        assert_eq!(urgent[1].urgency, Urgency::NotSoon);
    }

    #[tokio::test]
    async fn late_push_for_superseded_token_is_dropped() {
        let store = MemoryRemote::new();
        store.seed("list a", fields("From A", 3));
        store.seed("list b", fields("From B", 3));
        let (mut session, _, _) = setup(&store);

        session.select_token(Some("list a")).unwrap();
        session.select_token(Some("list b")).unwrap();
        let applied = session.pump();

        assert_eq!(applied[0], Applied::Discarded);
        assert_eq!(names(&session), ["From B"]);
        assert_eq!(store.subscriber_count("list a"), 0);
    }

    #[tokio::test]
    async fn callbacks_firing_after_cancel_are_dropped() {
        let store = MemoryRemote::new();
        store.seed("list a", fields("Old", 3));
        store.seed("list b", fields("New", 3));
        let (mut session, _, _) = setup(&store);

        session.select_token(Some("list a")).unwrap();
        session.pump();
        assert_eq!(names(&session), ["Old"]);

        // The store keeps firing already-scheduled callbacks for list a.
        store.hold_deliveries();
        store.seed("list a", fields("Old 2", 3));
        session.select_token(Some("list b")).unwrap();
        assert_eq!(store.release_deliveries(), 2);

        let applied = session.pump();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0], Applied::Discarded);
        assert_eq!(names(&session), ["New"]);
        assert!(session.records().iter().all(|i| i.name == "New"));
    }

    #[tokio::test]
    async fn pushes_apply_in_emission_order() {
        let store = MemoryRemote::new();
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        store.seed("list", fields("One", 3));
        store.seed("list", fields("Two", 3));

        let counts: Vec<usize> = session
            .pump()
            .into_iter()
            .filter_map(|a| match a {
                Applied::Published { count, .. } => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, [0, 1, 2]);
        assert_eq!(session.records().len(), 2);
    }

    #[tokio::test]
    async fn clearing_the_token_empties_records() {
        let store = MemoryRemote::new();
        store.seed("list", fields("Milk", 3));
        let (mut session, _, kv) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();
        let mut rx = session.watch();

        session.select_token(None).unwrap();
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(session.records().is_empty());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
        assert_eq!(store.subscriber_count("list"), 0);
        assert_eq!(TokenCache::load(kv).active(), None);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_before_writing() {
        let store = MemoryRemote::new();
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();

        session.add_item("Milk", 7.0).await.unwrap();
        session.pump();
        let err = session.add_item("milk ", 14.0).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Validation(ValidationError::DuplicateName("milk".into()))
        );
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn blank_names_and_missing_list_are_rejected() {
        let store = MemoryRemote::new();
        let (mut session, _, _) = setup(&store);
        assert_eq!(
            session.add_item("Tea", 7.0).await.unwrap_err(),
            SessionError::from(ValidationError::NoActiveList)
        );
        session.select_token(Some("list")).unwrap();
        assert_eq!(
            session.add_item("   ", 7.0).await.unwrap_err(),
            SessionError::from(ValidationError::BlankName)
        );
        assert_eq!(
            session.add_item("Tea", f64::NAN).await.unwrap_err(),
            SessionError::from(ValidationError::InvalidEstimate)
        );
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn added_item_uses_the_chosen_estimate() {
        let store = MemoryRemote::new();
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        let id = session.add_item("  Bananas ", 14.0).await.unwrap();
        session.pump();

        let item = session.records().iter().find(|i| i.id == id).cloned().unwrap();
        assert_eq!(item.name, "Bananas");
        assert_eq!(item.normalized_name, "banana");
        assert_eq!(item.date_created, Some(start()));
        assert_eq!(item.date_next_purchased, Some(start() + Duration::days(14)));
        assert_eq!(session.urgent_items()[0].urgency, Urgency::KindOfSoon);
    }

    #[tokio::test]
    async fn confirming_a_purchase_reschedules_the_item() {
        let store = MemoryRemote::new();
        let id = store.seed("list", fields("Coffee", 14));
        let (mut session, clock, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();

        clock.advance_days(10.0);
        let update = session.confirm_purchase(&id).await.unwrap();
        assert_eq!(update.total_purchases, 1);
        assert!(update.date_next_purchased > clock.now());

        session.pump();
        let item = session.records().iter().find(|i| i.id == id).cloned().unwrap();
        assert_eq!(item.total_purchases, 1);
        assert_eq!(item.date_last_purchased, Some(clock.now()));
        assert_eq!(item.date_next_purchased, Some(update.date_next_purchased));
        assert_eq!(item.name, "Coffee");
        assert!(item.purchased_recently(clock.now()));
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let store = MemoryRemote::new();
        let id = store.seed("list", fields("Salt", 40));
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();

        session.delete_item(&id).await.unwrap();
        session.pump();
        assert!(session.records().is_empty());
        assert_eq!(
            session.delete_item(&id).await.unwrap_err(),
            SessionError::from(ValidationError::UnknownItem(id))
        );
    }

    #[tokio::test]
    async fn failed_write_is_reported_once_and_changes_nothing() {
        let store = MemoryRemote::new();
        let id = store.seed("list", fields("Eggs", 5));
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();
        let before = session.records();

        store.fail_writes(Some(RemoteError::Unavailable("offline".into())));
        let err = session.confirm_purchase(&id).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Remote {
                operation: RemoteOperation::Update,
                ..
            }
        ));
        assert!(session.pump().is_empty());
        assert_eq!(session.records(), before);
        assert!(store.writes().is_empty());
        assert_eq!(store.documents("list")[0].fields.total_purchases, Some(0));
    }

    #[tokio::test]
    async fn stream_error_keeps_last_known_records() {
        let store = MemoryRemote::new();
        store.seed("list", fields("Bread", 2));
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();

        store.push_error("list", RemoteError::PermissionDenied("rules".into()));
        let applied = session.next_event().await.unwrap();
        assert!(matches!(applied, Applied::Failed { .. }));
        assert_eq!(names(&session), ["Bread"]);
        assert!(session.last_error().is_some());
    }

    #[tokio::test]
    async fn subscribe_failure_surfaces_and_keeps_records() {
        let store = MemoryRemote::new();
        store.seed("list a", fields("Bread", 2));
        let (mut session, _, kv) = setup(&store);
        session.select_token(Some("list a")).unwrap();
        session.pump();

        store.fail_subscriptions(Some(RemoteError::Unavailable("down".into())));
        let err = session.select_token(Some("list b")).unwrap_err();
        assert_eq!(TokenCache::load(kv.clone()).active(), Some("list a"));
        assert!(matches!(
            err,
            SessionError::Remote {
                operation: RemoteOperation::Subscribe,
                ..
            }
        ));
        assert_eq!(session.records().len(), 1);
        assert!(session.urgent_items().is_empty());
        assert_eq!(store.subscriber_count("list a"), 0);

        store.fail_subscriptions(None);
        session.select_token(Some("list b")).unwrap();
        session.pump();
        assert!(matches!(session.state(), SessionState::Live { .. }));
    }

    #[tokio::test]
    async fn validate_token_is_permissive_about_empty_lists() {
        let store = MemoryRemote::new();
        let (session, _, _) = setup(&store);
        assert!(session.validate_token("brand new list").await);
        assert!(!session.validate_token("   ").await);
        assert!(!session.validate_token("bad/path").await);
        store.fail_reads(Some(RemoteError::Unavailable("offline".into())));
        assert!(!session.validate_token("brand new list").await);
    }

    #[tokio::test]
    async fn join_caches_only_valid_tokens() {
        let store = MemoryRemote::new();
        store.seed("shared list", fields("Jam", 9));
        let (mut session, _, kv) = setup(&store);

        let err = session.join_list("bad/token").await.unwrap_err();
        assert_eq!(err, SessionError::from(ValidationError::InvalidToken("bad/token".into())));
        assert!(session.saved_tokens().is_empty());

        session.join_list("  shared list ").await.unwrap();
        session.pump();
        assert_eq!(session.saved_tokens(), ["shared list"]);
        assert_eq!(names(&session), ["Jam"]);
        assert_eq!(TokenCache::load(kv).active(), Some("shared list"));
    }

    #[tokio::test]
    async fn create_then_restore_in_a_new_session() {
        let store = MemoryRemote::new();
        let (mut session, _, kv) = setup(&store);
        let token = session.create_list().unwrap();
        session.pump();
        session.add_item("Soap", 30.0).await.unwrap();
        drop(session);

        let clock = Arc::new(FixedClock::new(start()));
        let mut restored: Session =
            ListSession::new(Arc::new(store.clone()), TokenCache::load(kv), clock);
        assert_eq!(restored.restore().unwrap(), Some(token.clone()));
        restored.pump();
        assert_eq!(restored.saved_tokens(), [token]);
        assert_eq!(names(&restored), ["Soap"]);
    }

    #[tokio::test]
    async fn forgetting_a_token_never_touches_the_store() {
        let store = MemoryRemote::new();
        let (mut session, _, _) = setup(&store);
        let token = session.create_list().unwrap();
        session.pump();
        session.add_item("Flour", 7.0).await.unwrap();

        assert!(session.forget_token(&token));
        assert!(session.saved_tokens().is_empty());
        assert!(
            store
                .writes()
                .iter()
                .all(|w| !matches!(w, WriteRecord::Delete { .. }))
        );
        assert_eq!(store.documents(&token).len(), 1);
    }

    #[tokio::test]
    async fn search_filters_and_keeps_order() {
        let store = MemoryRemote::new();
        store.seed("list", fields("Oat milk", 10));
        store.seed("list", fields("Milk", 2));
        store.seed("list", fields("Bread", 1));
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();

        let hits: Vec<String> = session
            .search("MILK")
            .into_iter()
            .map(|u| u.item.name)
            .collect();
        assert_eq!(hits, ["Milk", "Oat milk"]);
    }

    #[tokio::test]
    async fn add_right_after_select_sees_existing_items() {
        let store = MemoryRemote::new();
        store.seed("list", fields("Milk", 3));
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();

        assert_eq!(
            session.add_item("milk ", 7.0).await.unwrap_err(),
            SessionError::from(ValidationError::DuplicateName("milk".into()))
        );
        assert_eq!(store.documents("list").len(), 1);
    }

    #[tokio::test]
    async fn add_is_refused_until_the_first_snapshot_arrives() {
        let store = MemoryRemote::new();
        store.seed("list", fields("Milk", 3));
        let (mut session, _, _) = setup(&store);

        store.hold_deliveries();
        session.select_token(Some("list")).unwrap();
        assert_eq!(
            session.add_item("milk ", 7.0).await.unwrap_err(),
            SessionError::from(ValidationError::ListNotLoaded)
        );
        assert!(store.writes().is_empty());

        assert_eq!(store.release_deliveries(), 1);
        assert_eq!(
            session.add_item("milk ", 7.0).await.unwrap_err(),
            SessionError::from(ValidationError::DuplicateName("milk".into()))
        );
        assert_eq!(store.documents("list").len(), 1);
    }

    #[tokio::test]
    async fn back_to_back_adds_see_each_other() {
        let store = MemoryRemote::new();
        let (mut session, _, _) = setup(&store);
        session.select_token(Some("list")).unwrap();
        session.pump();

        session.add_item("Milk", 7.0).await.unwrap();
        assert_eq!(
            session.add_item("milk ", 7.0).await.unwrap_err(),
            SessionError::from(ValidationError::DuplicateName("milk".into()))
        );
        assert_eq!(store.documents("list").len(), 1);
    }

    #[tokio::test]
    async fn open_uses_configured_thresholds_and_token_file() {
        let dir = std::env::temp_dir().join(format!("restock-session-{}", uuid::Uuid::new_v4()));
        let config = RestockConfig {
            data_directory: dir.clone(),
            thresholds: crate::core::urgency::UrgencyThresholds {
                soon_days: 30,
                ..Default::default()
            },
            ..Default::default()
        };
        let store = MemoryRemote::new();
        let mut session = ListSession::open(Arc::new(store.clone()), &config);
        let token = session.create_list().unwrap();
        session.add_item("Rice", 25.0).await.unwrap();
        session.pump();

        assert_eq!(session.urgent_items()[0].urgency, Urgency::Soon);
        assert_eq!(TokenCache::load(config.token_store()).list(), [token]);
        let _ = std::fs::remove_dir_all(dir);
    }
}
