use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::fetch::pipeline::FetchPipeline;
use crate::fetch::FetchError;
use crate::flickr::{GeoPoint, RemoteImageSource};
use crate::store::CacheStore;

/// One page fetch for one album
///
/// The request is also the retry token: a failed fetch hands it back through
/// [`FetchEvent::Failed`] and the caller re-submits it verbatim to retry.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub album_id: String,
    pub center: GeoPoint,
    pub page: u32,
}

/// Outcome of an accepted fetch request
#[derive(Debug)]
pub enum FetchEvent {
    Completed {
        album_id: String,
        photos_added: usize,
        remote_total: f64,
    },
    Failed {
        album_id: String,
        error: FetchError,
        retry: FetchRequest,
    },
}

enum ServiceCommand {
    Request {
        request: FetchRequest,
        reply: oneshot::Sender<Result<(), FetchError>>,
    },
    Done {
        album_id: String,
    },
}

/// Handle for submitting fetch requests
#[derive(Clone)]
pub struct FetchHandle {
    cmd_tx: mpsc::UnboundedSender<ServiceCommand>,
}

impl FetchHandle {
    /// Submit a fetch request
    ///
    /// Returns immediately once the worker accepts it; the outcome arrives on
    /// the event channel. An album with a page already in flight is rejected
    /// with [`FetchError::InFlight`] instead of queueing a second pipeline.
    pub async fn request(&self, request: FetchRequest) -> Result<(), FetchError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ServiceCommand::Request { request, reply })
            .map_err(|_| FetchError::Join("fetch service is gone".to_string()))?;
        rx.await
            .map_err(|_| FetchError::Join("fetch service is gone".to_string()))?
    }
}

/// Fetch service that runs page pipelines on the shared runtime
///
/// The worker serializes request admission and owns the in-flight album set;
/// each accepted request runs as its own pipeline task. The worker only
/// holds a weak command sender, so it winds down once every handle is gone
/// and the last pipeline has reported back.
pub struct FetchService {
    store: Arc<CacheStore>,
    source: Arc<dyn RemoteImageSource>,
    events_tx: mpsc::UnboundedSender<FetchEvent>,
    cmd_weak: mpsc::WeakUnboundedSender<ServiceCommand>,
    cmd_rx: mpsc::UnboundedReceiver<ServiceCommand>,
    in_flight: HashSet<String>,
}

impl FetchService {
    /// Start the service worker, returning the request handle and the event
    /// channel for completion and failure reports
    pub fn start(
        store: Arc<CacheStore>,
        source: Arc<dyn RemoteImageSource>,
    ) -> (FetchHandle, mpsc::UnboundedReceiver<FetchEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let service = FetchService {
            store,
            source,
            events_tx,
            cmd_weak: cmd_tx.downgrade(),
            cmd_rx,
            in_flight: HashSet::new(),
        };
        tokio::spawn(service.listen_for_requests());

        (FetchHandle { cmd_tx }, events_rx)
    }

    async fn listen_for_requests(mut self) {
        info!("Fetch service worker started");

        while let Some(command) = self.cmd_rx.recv().await {
            match command {
                ServiceCommand::Request { request, reply } => {
                    let _ = reply.send(self.handle_request(request));
                }
                ServiceCommand::Done { album_id } => {
                    self.in_flight.remove(&album_id);
                }
            }
        }

        info!("Fetch service worker stopped");
    }

    fn handle_request(&mut self, request: FetchRequest) -> Result<(), FetchError> {
        if self.in_flight.contains(&request.album_id) {
            warn!("Fetch for album {} already in flight", request.album_id);
            return Err(FetchError::InFlight {
                album_id: request.album_id,
            });
        }
        self.in_flight.insert(request.album_id.clone());

        let store = Arc::clone(&self.store);
        let pipeline = FetchPipeline::new(Arc::clone(&self.source));
        let events_tx = self.events_tx.clone();
        let cmd_weak = self.cmd_weak.clone();

        tokio::spawn(async move {
            let album_id = request.album_id.clone();
            let event = match run_fetch(&pipeline, &store, &request).await {
                Ok((photos_added, remote_total)) => FetchEvent::Completed {
                    album_id: album_id.clone(),
                    photos_added,
                    remote_total,
                },
                Err(error) => {
                    warn!("Fetch for album {} failed: {}", album_id, error);
                    FetchEvent::Failed {
                        album_id: album_id.clone(),
                        error,
                        retry: request,
                    }
                }
            };

            // Clear the in-flight slot before the event goes out, so a caller
            // reacting to the event can request the next page right away
            if let Some(cmd_tx) = cmd_weak.upgrade() {
                let _ = cmd_tx.send(ServiceCommand::Done { album_id });
            }
            let _ = events_tx.send(event);
        });

        Ok(())
    }
}

async fn run_fetch(
    pipeline: &FetchPipeline,
    store: &CacheStore,
    request: &FetchRequest,
) -> Result<(usize, f64), FetchError> {
    let page = pipeline.fetch_page(request.center, request.page).await?;
    let remote_total = page.total;
    let photos_added = pipeline.merge_page(store, &request.album_id, page).await?;
    Ok((photos_added, remote_total))
}
