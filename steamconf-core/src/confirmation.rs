//! Confirmation list with stable item identity across refreshes.
//!
//! The list owns every [`Confirmation`] it has observed, keyed by id. Each
//! refresh reconciles the freshly parsed records against that mapping:
//! - ids still present keep their `Arc<Confirmation>` and are updated in place
//! - new ids get a new item
//! - ids no longer present are detached and dropped from the mapping
//!
//! Items point back at their list through a `Weak`, so holding an item
//! never keeps the list alive. A detached item refuses accept/deny.
//!
//! Concurrent `refresh` calls on the same list are not ordered against each
//! other; whichever reconciliation runs last wins.

use crate::client::{ConfirmationClient, Operation};
use crate::parser::{parse_confirmations, ConfirmationData};
use crate::{ConfirmationError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ConfirmationState {
    data: ConfirmationData,
    list: Option<Weak<ListShared>>,
}

impl ConfirmationState {
    fn is_pending(&self) -> bool {
        self.list.as_ref().is_some_and(|list| list.strong_count() > 0)
    }

    fn is_owned_by(&self, shared: &Arc<ListShared>) -> bool {
        self.list
            .as_ref()
            .is_some_and(|list| std::ptr::eq(list.as_ptr(), Arc::as_ptr(shared)))
    }
}

/// A single pending confirmation.
pub struct Confirmation {
    id: u64,
    state: Mutex<ConfirmationState>,
}

impl Confirmation {
    fn new(data: ConfirmationData, list: Weak<ListShared>) -> Self {
        Self {
            id: data.id,
            state: Mutex::new(ConfirmationState {
                data,
                list: Some(list),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(data: ConfirmationData) -> Self {
        Self {
            id: data.id,
            state: Mutex::new(ConfirmationState { data, list: None }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current confirmation key; may change between refreshes.
    pub fn key(&self) -> String {
        lock(&self.state).data.key.clone()
    }

    pub fn descriptions(&self) -> Vec<String> {
        lock(&self.state).data.descriptions.clone()
    }

    /// Snapshot of the record as last observed.
    pub fn data(&self) -> ConfirmationData {
        lock(&self.state).data.clone()
    }

    /// Whether accept/deny may still be called on this item.
    pub fn is_pending(&self) -> bool {
        lock(&self.state).is_pending()
    }

    pub async fn accept(&self) -> Result<bool> {
        self.owner()?.accept(self).await
    }

    pub async fn deny(&self) -> Result<bool> {
        self.owner()?.deny(self).await
    }

    fn owner(&self) -> Result<ConfirmationList> {
        lock(&self.state)
            .list
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|shared| ConfirmationList { shared })
            .ok_or(ConfirmationError::Detached(self.id))
    }

    fn update(&self, data: ConfirmationData) {
        lock(&self.state).data = data;
    }

    /// Invalidate the item. Returns the list it belonged to, if any.
    fn detach(&self) -> Option<Weak<ListShared>> {
        lock(&self.state).list.take()
    }
}

impl std::fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Confirmation")
            .field("id", &self.id)
            .field("descriptions", &state.data.descriptions)
            .field("pending", &state.is_pending())
            .finish()
    }
}

#[derive(Default)]
struct ListState {
    confirms: BTreeMap<u64, Arc<Confirmation>>,
    ids: Vec<u64>,
    confirmations: Vec<Arc<Confirmation>>,
}

impl ListState {
    fn remove(&mut self, id: u64) {
        if let Some(item) = self.confirms.remove(&id) {
            item.detach();
        }
    }

    fn rebuild(&mut self) {
        self.ids = self.confirms.keys().copied().collect();
        self.confirmations = self.confirms.values().cloned().collect();
    }
}

struct ListShared {
    client: ConfirmationClient,
    state: Mutex<ListState>,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// The set of confirmations currently pending for a session.
///
/// Cloning yields another handle to the same list.
#[derive(Clone)]
pub struct ConfirmationList {
    shared: Arc<ListShared>,
}

impl ConfirmationList {
    /// Build a list from a listing document.
    pub fn from_document(client: ConfirmationClient, document: &str) -> Result<Self> {
        let list = Self {
            shared: Arc::new(ListShared {
                client,
                state: Mutex::new(ListState::default()),
            }),
        };
        list.reconcile(document)?;
        Ok(list)
    }

    /// Merge a freshly fetched listing document into the list.
    ///
    /// The document is fully parsed before the mapping is touched, and the
    /// whole pass runs under the list lock, so callers only ever observe the
    /// state before or after it.
    pub fn reconcile(&self, document: &str) -> Result<ReconcileSummary> {
        let records = parse_confirmations(document)?;
        let mut summary = ReconcileSummary::default();

        let mut state = lock(&self.shared.state);
        let mut stale: BTreeSet<u64> = state.confirms.keys().copied().collect();

        for record in records {
            let id = record.id;
            let known = stale.remove(&id);

            // repeated ids within one document update the item without recounting
            if let Some(item) = state.confirms.get(&id) {
                item.update(record);
                if known {
                    summary.updated += 1;
                }
                continue;
            }

            let item = Confirmation::new(record, Arc::downgrade(&self.shared));
            state.confirms.insert(id, Arc::new(item));
            summary.added += 1;
        }

        for id in stale {
            state.remove(id);
            summary.removed += 1;
        }

        state.rebuild();
        drop(state);

        debug!(
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            "reconciled confirmation list"
        );
        Ok(summary)
    }

    /// Fetch the current listing and reconcile against it.
    pub async fn refresh(&self) -> Result<ReconcileSummary> {
        let document = self.shared.client.fetch_confirmation_document().await?;
        self.reconcile(&document)
    }

    pub fn get(&self, id: u64) -> Option<Arc<Confirmation>> {
        lock(&self.shared.state).confirms.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.state).ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids in list order (ascending).
    pub fn ids(&self) -> Vec<u64> {
        lock(&self.shared.state).ids.clone()
    }

    /// Items in list order, index-aligned with [`Self::ids`].
    pub fn confirmations(&self) -> Vec<Arc<Confirmation>> {
        lock(&self.shared.state).confirmations.clone()
    }

    /// Call `f` with each item and its index, in list order.
    ///
    /// Iterates over a snapshot, so `f` may call back into the list.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Confirmation>, usize),
    {
        let (ids, items) = {
            let state = lock(&self.shared.state);
            (state.ids.clone(), state.confirmations.clone())
        };
        for (index, (id, item)) in ids.iter().zip(items.iter()).enumerate() {
            debug_assert_eq!(*id, item.id());
            f(item, index);
        }
    }

    /// Accept `confirmation`. On success the item is detached and removed.
    ///
    /// Fails with [`ConfirmationError::Detached`] unless the item is pending
    /// in this list; decisions are only ever signed by the owning session.
    pub async fn accept(&self, confirmation: &Confirmation) -> Result<bool> {
        self.decide(confirmation, Operation::Allow).await
    }

    /// Deny `confirmation`. On success the item is detached and removed.
    pub async fn deny(&self, confirmation: &Confirmation) -> Result<bool> {
        self.decide(confirmation, Operation::Cancel).await
    }

    async fn decide(&self, confirmation: &Confirmation, operation: Operation) -> Result<bool> {
        let owned = {
            let state = lock(&confirmation.state);
            state.is_pending() && state.is_owned_by(&self.shared)
        };
        if !owned {
            return Err(ConfirmationError::Detached(confirmation.id()));
        }

        let success = self
            .shared
            .client
            .send_decision(confirmation, operation)
            .await?;

        if success {
            retire(confirmation);
        } else {
            debug!(id = confirmation.id(), %operation, "decision rejected by service");
        }
        Ok(success)
    }
}

/// Detach `confirmation` and drop it from the list that owns it.
fn retire(confirmation: &Confirmation) {
    let Some(shared) = confirmation.detach().and_then(|list| list.upgrade()) else {
        return;
    };

    let mut state = lock(&shared.state);
    let owned = state
        .confirms
        .get(&confirmation.id())
        .is_some_and(|item| std::ptr::eq(Arc::as_ptr(item), confirmation));
    if owned {
        state.confirms.remove(&confirmation.id());
        state.rebuild();
    }
}

impl std::fmt::Debug for ConfirmationList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationList")
            .field("ids", &self.ids())
            .finish()
    }
}
