use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

use crate::observe::diff::{diff_ordered, RowChange};
use crate::store::{CacheStore, CommitEvent, Context, EntityKind};

/// Which rows an observer watches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// Albums under one marker, name ascending with newest-first tiebreak
    AlbumsForMarker(String),
    /// Photos under one album, name descending
    PhotosForAlbum(String),
}

impl QueryScope {
    fn kind(&self) -> EntityKind {
        match self {
            QueryScope::AlbumsForMarker(_) => EntityKind::Album,
            QueryScope::PhotosForAlbum(_) => EntityKind::Photo,
        }
    }

    fn materialize(&self, reader: &Arc<RwLock<Context>>) -> Vec<(String, u64)> {
        let ctx = reader.read().expect("reader context lock poisoned");
        match self {
            QueryScope::AlbumsForMarker(marker_id) => ctx.graph.album_keys_for_marker(marker_id),
            QueryScope::PhotosForAlbum(album_id) => ctx.graph.photo_keys_for_album(album_id),
        }
    }
}

/// Observer lifecycle
///
/// `Stopped` is terminal; watching the same scope again means starting a
/// fresh observer with its own initial fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Idle,
    Fetching,
    Observing,
    Notifying,
    Stopped,
}

/// One batch of row changes produced by a single commit
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub scope: QueryScope,
    pub rows: Vec<RowChange>,
}

/// Handle to a running observer
pub struct ObserverHandle {
    changes_rx: mpsc::UnboundedReceiver<ChangeBatch>,
    state_rx: watch::Receiver<ObserverState>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ObserverHandle {
    /// Receive the next change batch, or None once the observer stopped
    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        self.changes_rx.recv().await
    }

    pub fn state(&self) -> ObserverState {
        *self.state_rx.borrow()
    }

    /// Tear the observer down; no notifications are delivered afterwards
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

/// Watches one query scope bound to the reader context
pub struct ChangeObserver;

impl ChangeObserver {
    /// Start observing a scope
    ///
    /// The observer materializes the scope once (no notification for the
    /// initial result set), then emits one batch per committed change that
    /// alters the scope's rows. Subscribing and the initial fetch both
    /// happen before this returns, so no commit can fall between them
    /// unseen; a commit that sneaks in during the fetch just produces an
    /// empty diff.
    pub fn start(store: &CacheStore, scope: QueryScope) -> ObserverHandle {
        let reader = store.reader_context();
        let commit_rx = store.subscribe();
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ObserverState::Idle);
        let (stop_tx, stop_rx) = oneshot::channel();

        let _ = state_tx.send(ObserverState::Fetching);
        let current = scope.materialize(&reader);
        let _ = state_tx.send(ObserverState::Observing);
        debug!("Observer started with {} rows", current.len());

        tokio::spawn(run_observer(
            scope, reader, current, commit_rx, changes_tx, state_tx, stop_rx,
        ));

        ObserverHandle {
            changes_rx,
            state_rx,
            stop_tx: Some(stop_tx),
        }
    }
}

async fn run_observer(
    scope: QueryScope,
    reader: Arc<RwLock<Context>>,
    mut current: Vec<(String, u64)>,
    mut commit_rx: broadcast::Receiver<CommitEvent>,
    changes_tx: mpsc::UnboundedSender<ChangeBatch>,
    state_tx: watch::Sender<ObserverState>,
    mut stop_rx: oneshot::Receiver<()>,
) {

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            event = commit_rx.recv() => match event {
                Ok(event) => {
                    if !event.touches(scope.kind()) {
                        continue;
                    }

                    let next = scope.materialize(&reader);
                    let rows = diff_ordered(&current, &next);
                    current = next;

                    if rows.is_empty() {
                        continue;
                    }

                    let _ = state_tx.send(ObserverState::Notifying);
                    if changes_tx
                        .send(ChangeBatch {
                            scope: scope.clone(),
                            rows,
                        })
                        .is_err()
                    {
                        // Consumer is gone; nothing left to notify
                        break;
                    }
                    let _ = state_tx.send(ObserverState::Observing);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed commits collapse into one catch-up diff
                    debug!("Observer lagged behind {} commits", skipped);
                    let next = scope.materialize(&reader);
                    let rows = diff_ordered(&current, &next);
                    current = next;

                    if !rows.is_empty() {
                        let _ = state_tx.send(ObserverState::Notifying);
                        let _ = changes_tx.send(ChangeBatch {
                            scope: scope.clone(),
                            rows,
                        });
                        let _ = state_tx.send(ObserverState::Observing);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    let _ = state_tx.send(ObserverState::Stopped);
    debug!("Observer stopped");
}
