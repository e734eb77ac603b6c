use std::mem;

use shared::{
    image_source, Candidate, IdentifyRequest, ImageSize, ImageSource, ItemId, DEFAULT_IMAGE_BASE,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    api::LibraryApi,
    coordinator::RequestCoordinator,
    error::{Result, ShelfError},
    events::{LibraryEvent, LibraryEvents},
};

/// Where an identification session currently stands.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum IdentifyPhase {
    #[default]
    Closed,
    SearchRequested {
        item_id: ItemId,
    },
    CandidatesLoading {
        item_id: ItemId,
    },
    /// May hold zero candidates; that is still a successful search.
    CandidatesReady {
        item_id: ItemId,
        candidates: Vec<Candidate>,
    },
    CandidatesError {
        item_id: ItemId,
        error: ShelfError,
    },
    Applying {
        item_id: ItemId,
        candidates: Vec<Candidate>,
        selected: Candidate,
    },
    /// Passed through on success right before the session closes.
    Applied {
        item_id: ItemId,
        message: String,
    },
    /// Candidates are kept so another one can be picked.
    ApplyError {
        item_id: ItemId,
        candidates: Vec<Candidate>,
        selected: Candidate,
        error: ShelfError,
    },
}

impl IdentifyPhase {
    pub fn name(&self) -> &'static str {
        match self {
            IdentifyPhase::Closed => "closed",
            IdentifyPhase::SearchRequested { .. } => "search-requested",
            IdentifyPhase::CandidatesLoading { .. } => "candidates-loading",
            IdentifyPhase::CandidatesReady { .. } => "candidates-ready",
            IdentifyPhase::CandidatesError { .. } => "candidates-error",
            IdentifyPhase::Applying { .. } => "applying",
            IdentifyPhase::Applied { .. } => "applied",
            IdentifyPhase::ApplyError { .. } => "apply-error",
        }
    }

    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            IdentifyPhase::Closed => None,
            IdentifyPhase::SearchRequested { item_id }
            | IdentifyPhase::CandidatesLoading { item_id }
            | IdentifyPhase::CandidatesReady { item_id, .. }
            | IdentifyPhase::CandidatesError { item_id, .. }
            | IdentifyPhase::Applying { item_id, .. }
            | IdentifyPhase::Applied { item_id, .. }
            | IdentifyPhase::ApplyError { item_id, .. } => Some(*item_id),
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        match self {
            IdentifyPhase::CandidatesReady { candidates, .. }
            | IdentifyPhase::Applying { candidates, .. }
            | IdentifyPhase::ApplyError { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&ShelfError> {
        match self {
            IdentifyPhase::CandidatesError { error, .. }
            | IdentifyPhase::ApplyError { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, IdentifyPhase::Closed)
    }
}

/// Search, pick and apply a provider match for one item.
///
/// Only one session exists at a time. Successful application announces
/// [`LibraryEvent::ItemChanged`] so a detail view for the item can reload.
#[derive(Debug)]
pub struct IdentificationWorkflow {
    api: LibraryApi,
    events: LibraryEvents,
    image_base: String,
    phase: watch::Sender<IdentifyPhase>,
    candidates: RequestCoordinator<ItemId, Vec<Candidate>>,
    apply: RequestCoordinator<(ItemId, IdentifyRequest), String>,
}

impl IdentificationWorkflow {
    pub fn new(api: LibraryApi, events: LibraryEvents) -> Self {
        let (phase, _) = watch::channel(IdentifyPhase::Closed);
        Self {
            api,
            events,
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            phase,
            candidates: RequestCoordinator::new("identify-candidates"),
            apply: RequestCoordinator::new("identify-apply"),
        }
    }

    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into();
        self
    }

    pub fn phase(&self) -> IdentifyPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentifyPhase> {
        self.phase.subscribe()
    }

    pub fn candidate_poster(&self, candidate: &Candidate) -> ImageSource {
        image_source(
            &self.image_base,
            candidate.poster.as_deref(),
            ImageSize::Thumbnail,
        )
    }

    /// Starts a session for `item_id` and loads its candidates.
    ///
    /// Returns the phase this call left behind. If the session was cancelled
    /// or reopened while loading, the result is dropped and the current phase
    /// is returned unchanged.
    pub async fn open(&self, item_id: ItemId) -> Result<IdentifyPhase> {
        self.transition("open", |phase| match phase {
            IdentifyPhase::Applying { .. } => None,
            _ => Some(IdentifyPhase::SearchRequested { item_id }),
        })?;
        self.candidates.reset();
        self.phase
            .send_replace(IdentifyPhase::CandidatesLoading { item_id });

        let api = self.api.clone();
        let attempt = self
            .candidates
            .send(item_id, move || async move { api.candidates(item_id).await })
            .await;
        let Some(result) = attempt.applied() else {
            debug!("Candidate search for item {item_id} no longer wanted");
            return Ok(self.phase());
        };

        let next = match result {
            Ok(candidates) => {
                info!("Found {} candidates for item {item_id}", candidates.len());
                IdentifyPhase::CandidatesReady {
                    item_id,
                    candidates,
                }
            }
            Err(error) => {
                warn!("Candidate search for item {item_id} failed: {error}");
                IdentifyPhase::CandidatesError { item_id, error }
            }
        };
        self.phase.send_if_modified(|phase| {
            if *phase != (IdentifyPhase::CandidatesLoading { item_id }) {
                return false;
            }
            *phase = next;
            true
        });
        Ok(self.phase())
    }

    /// Applies `candidate` to the item of the current session.
    ///
    /// On success the returned phase is [`IdentifyPhase::Applied`] carrying
    /// the server message, while the workflow itself is already closed again.
    /// `candidate` must come from the current session's results.
    pub async fn select(&self, candidate: &Candidate) -> Result<IdentifyPhase> {
        {
            let phase = self.phase.borrow();
            let picking = matches!(
                *phase,
                IdentifyPhase::CandidatesReady { .. } | IdentifyPhase::ApplyError { .. }
            );
            let known = phase
                .candidates()
                .iter()
                .any(|c| c.provider == candidate.provider && c.id == candidate.id);
            if picking && !known {
                return Err(ShelfError::UnknownCandidate {
                    provider: candidate.provider.clone(),
                    id: candidate.id.clone(),
                });
            }
        }

        let mut item_id = None;
        self.transition("select", |phase| match phase {
            IdentifyPhase::CandidatesReady {
                item_id: id,
                candidates,
            }
            | IdentifyPhase::ApplyError {
                item_id: id,
                candidates,
                ..
            } => {
                item_id = Some(*id);
                Some(IdentifyPhase::Applying {
                    item_id: *id,
                    candidates: mem::take(candidates),
                    selected: candidate.clone(),
                })
            }
            _ => None,
        })?;
        let Some(item_id) = item_id else {
            return Ok(self.phase());
        };

        let request = IdentifyRequest::from_candidate(candidate);
        info!(
            "Identifying item {item_id} as {} via {}:{}",
            candidate.label(),
            request.provider,
            request.provider_id
        );

        let api = self.api.clone();
        let body = request.clone();
        let result = self
            .apply
            .send((item_id, request), move || async move {
                api.identify(item_id, &body).await
            })
            .await
            .into_result();

        match result {
            Ok(message) => {
                let applied = IdentifyPhase::Applied { item_id, message };
                self.phase.send_replace(applied.clone());
                self.candidates.reset();
                self.phase.send_replace(IdentifyPhase::Closed);
                self.events.publish(LibraryEvent::ItemChanged(item_id));
                Ok(applied)
            }
            Err(error) => {
                warn!("Identifying item {item_id} failed: {error}");
                self.phase.send_modify(|phase| {
                    if let IdentifyPhase::Applying {
                        item_id,
                        candidates,
                        selected,
                    } = phase
                    {
                        *phase = IdentifyPhase::ApplyError {
                            item_id: *item_id,
                            candidates: mem::take(candidates),
                            selected: selected.clone(),
                            error,
                        };
                    }
                });
                Ok(self.phase())
            }
        }
    }

    /// Closes the session. Refused while a selection is being applied.
    pub fn cancel(&self) -> Result<()> {
        self.transition("cancel", |phase| match phase {
            IdentifyPhase::Applying { .. } => None,
            _ => Some(IdentifyPhase::Closed),
        })?;
        self.candidates.reset();
        Ok(())
    }

    /// Swaps the phase for what `next` returns, or reports the transition as
    /// invalid when it returns `None`.
    fn transition(
        &self,
        action: &'static str,
        next: impl FnOnce(&mut IdentifyPhase) -> Option<IdentifyPhase>,
    ) -> Result<()> {
        let mut rejected = None;
        self.phase.send_if_modified(|phase| match next(phase) {
            Some(replacement) => {
                let changed = *phase != replacement;
                *phase = replacement;
                changed
            }
            None => {
                rejected = Some(phase.name());
                false
            }
        });
        match rejected {
            Some(phase) => Err(ShelfError::InvalidTransition { action, phase }),
            None => Ok(()),
        }
    }
}
