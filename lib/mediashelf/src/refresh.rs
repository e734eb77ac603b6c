use std::{collections::HashSet, fmt};

use itertools::Itertools;
use shared::{BatchRefreshResponse, ItemId};
use tracing::{info, warn};

use crate::{
    api::LibraryApi,
    coordinator::{RequestCoordinator, RequestState},
    error::{Result, ShelfError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Error string reported by the server for this id.
    Server(String),
    /// The id appeared in neither partition.
    MissingFromResponse,
    /// The id appeared more than once across the partitions.
    Conflicting,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Server(message) => write!(f, "{message}"),
            FailureReason::MissingFromResponse => write!(f, "missing from server response"),
            FailureReason::Conflicting => {
                write!(f, "server reported conflicting results for this item")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub id: ItemId,
    pub reason: FailureReason,
}

/// Per-id result of a batch refresh. Each requested id lands in exactly one list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<ItemId>,
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    /// Matches the server partition against the ids that were sent.
    ///
    /// Ids the server lists twice, or not at all, are failures. Ids that were
    /// never requested are dropped.
    pub fn reconcile(requested: &[ItemId], response: BatchRefreshResponse) -> Self {
        let successes = response.success.iter().copied().counts();
        let failures = response
            .failed
            .into_iter()
            .map(|failure| (failure.id, failure.error))
            .into_group_map();

        let mut outcome = BatchOutcome::default();
        for &id in requested.iter().unique() {
            let succeeded = successes.get(&id).copied().unwrap_or(0);
            let errors = failures.get(&id).map(Vec::as_slice).unwrap_or_default();

            match (succeeded, errors) {
                (1, []) => outcome.succeeded.push(id),
                (0, [error]) => outcome.failed.push(BatchFailure {
                    id,
                    reason: FailureReason::Server(error.clone()),
                }),
                (0, []) => {
                    warn!("Batch refresh response omitted item {id}");
                    outcome.failed.push(BatchFailure {
                        id,
                        reason: FailureReason::MissingFromResponse,
                    });
                }
                _ => {
                    warn!(
                        "Batch refresh response listed item {id} {} times",
                        succeeded + errors.len()
                    );
                    outcome.failed.push(BatchFailure {
                        id,
                        reason: FailureReason::Conflicting,
                    });
                }
            }
        }

        let requested: HashSet<ItemId> = requested.iter().copied().collect();
        let unexpected: Vec<ItemId> = successes
            .keys()
            .chain(failures.keys())
            .filter(|id| !requested.contains(*id))
            .copied()
            .unique()
            .sorted()
            .collect();
        if !unexpected.is_empty() {
            warn!("Ignoring batch results for unrequested items {unexpected:?}");
        }

        outcome
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Ids a caller may offer for a manual retry.
    pub fn failed_ids(&self) -> Vec<ItemId> {
        self.failed.iter().map(|failure| failure.id).collect()
    }

    pub fn failure_for(&self, id: ItemId) -> Option<&FailureReason> {
        self.failed
            .iter()
            .find(|failure| failure.id == id)
            .map(|failure| &failure.reason)
    }
}

/// Triggers server-side metadata re-resolution.
///
/// Never re-fetches views itself and never retries: the caller decides what
/// to reload and which failures to offer again.
#[derive(Debug)]
pub struct MetadataRefreshService {
    api: LibraryApi,
    single: RequestCoordinator<ItemId, String>,
    batch: RequestCoordinator<Vec<ItemId>, BatchOutcome>,
}

impl MetadataRefreshService {
    pub fn new(api: LibraryApi) -> Self {
        Self {
            api,
            single: RequestCoordinator::new("refresh-one"),
            batch: RequestCoordinator::new("refresh-batch"),
        }
    }

    pub fn single_state(&self) -> RequestState<ItemId, String> {
        self.single.state()
    }

    pub fn batch_state(&self) -> RequestState<Vec<ItemId>, BatchOutcome> {
        self.batch.state()
    }

    /// Returns the server's status string.
    pub async fn refresh_one(&self, id: ItemId) -> Result<String> {
        let api = self.api.clone();
        let status = self
            .single
            .send(id, move || async move { api.refresh(id).await })
            .await
            .into_result()?;
        info!("Refreshed item {id}: {status}");
        Ok(status)
    }

    /// `ids` is sent as given; avoiding duplicates is up to the caller.
    pub async fn refresh_batch(&self, ids: &[ItemId]) -> Result<BatchOutcome> {
        if ids.is_empty() {
            return Err(ShelfError::EmptyBatch);
        }

        let api = self.api.clone();
        let requested = ids.to_vec();
        let outcome = self
            .batch
            .send(ids.to_vec(), move || async move {
                let response = api.batch_refresh(&requested).await?;
                Ok::<_, ShelfError>(BatchOutcome::reconcile(&requested, response))
            })
            .await
            .into_result()?;

        info!(
            "Batch refresh: {} succeeded, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }
}
