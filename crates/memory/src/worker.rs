//! The embedding/search worker.
//!
//! A dedicated OS thread owns the embedding backend; nothing else ever
//! touches it. Communication is strictly message-passing:
//!
//! ```text
//! caller ──(std mpsc, request + id)──▶ worker thread
//! caller ◀─(oneshot, via dispatcher)── worker thread ──(tokio mpsc)──▶ dispatcher task
//! ```
//!
//! Every request carries a unique id; the dispatcher task correlates
//! responses back to a pending map of oneshot senders. If the worker
//! thread dies (backend panic, channel teardown), the dispatcher drains
//! the pending map and every waiter receives the safe default for its
//! request kind: an empty embedding, empty search hits, or a completed
//! warmup. A pending request is never silently dropped.
//!
//! Shutdown needs no explicit join: dropping the worker handle closes
//! the request channel, the thread exits its receive loop, and the
//! dispatcher drains whatever was still in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

use causerie_core::embed::EmbeddingBackend;

use crate::similarity::top_k_indices;

enum WorkerRequest {
    Warmup {
        id: u64,
    },
    Embed {
        id: u64,
        text: String,
    },
    Search {
        id: u64,
        snapshot: Vec<Vec<f32>>,
        query: String,
        limit: usize,
    },
}

enum WorkerResponse {
    WarmedUp { id: u64 },
    Embedding { id: u64, vector: Vec<f32> },
    SearchHits { id: u64, hits: Vec<(usize, f32)> },
}

enum PendingReply {
    Warmup(oneshot::Sender<()>),
    Embedding(oneshot::Sender<Vec<f32>>),
    Search(oneshot::Sender<Vec<(usize, f32)>>),
}

impl PendingReply {
    /// Resolve with the safe default for this request kind.
    fn resolve_default(self) {
        match self {
            Self::Warmup(tx) => {
                let _ = tx.send(());
            }
            Self::Embedding(tx) => {
                let _ = tx.send(Vec::new());
            }
            Self::Search(tx) => {
                let _ = tx.send(Vec::new());
            }
        }
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, PendingReply>>>;

/// Handle to the embedding/search worker thread.
pub struct EmbeddingWorker {
    requests: std::sync::mpsc::Sender<WorkerRequest>,
    pending: PendingMap,
    next_id: AtomicU64,
    dimension: usize,
}

impl EmbeddingWorker {
    /// Spawn the worker thread and its response dispatcher.
    ///
    /// The backend moves onto the worker thread; `load()` runs there on
    /// the first warmup request, not here.
    pub fn spawn(backend: Box<dyn EmbeddingBackend>) -> Self {
        let dimension = backend.dimension();
        let (request_tx, request_rx) = std::sync::mpsc::channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        std::thread::spawn(move || worker_main(backend, request_rx, response_tx));
        tokio::spawn(dispatch_responses(response_rx, Arc::clone(&pending)));

        Self {
            requests: request_tx,
            pending,
            next_id: AtomicU64::new(1),
            dimension,
        }
    }

    /// The embedding dimension of the hosted backend.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Prepare the backend. Resolves once loading finished (or the
    /// worker is gone, which counts as completed).
    pub async fn warmup(&self) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, PendingReply::Warmup(tx));

        if self.requests.send(WorkerRequest::Warmup { id }).is_err() {
            warn!("embedding worker unavailable, treating warmup as complete");
            self.abandon(id).await;
        }
        let _ = rx.await;
    }

    /// Embed one text. Degrades to an empty vector on worker fault.
    pub async fn embed(&self, text: String) -> Vec<f32> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, PendingReply::Embedding(tx));

        if self.requests.send(WorkerRequest::Embed { id, text }).is_err() {
            warn!("embedding worker unavailable, returning empty embedding");
            self.abandon(id).await;
        }
        rx.await.unwrap_or_default()
    }

    /// Score a snapshot of embeddings against a query and return the
    /// top-`limit` `(index, score)` pairs. Degrades to no hits on
    /// worker fault.
    pub async fn search(
        &self,
        snapshot: Vec<Vec<f32>>,
        query: String,
        limit: usize,
    ) -> Vec<(usize, f32)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, PendingReply::Search(tx));

        let request = WorkerRequest::Search {
            id,
            snapshot,
            query,
            limit,
        };
        if self.requests.send(request).is_err() {
            warn!("embedding worker unavailable, returning no search hits");
            self.abandon(id).await;
        }
        rx.await.unwrap_or_default()
    }

    /// Resolve an already-registered request with its default, if the
    /// dispatcher has not done so first.
    async fn abandon(&self, id: u64) {
        if let Some(reply) = self.pending.lock().await.remove(&id) {
            reply.resolve_default();
        }
    }
}

/// Worker thread main loop. Runs until the request channel closes.
fn worker_main(
    mut backend: Box<dyn EmbeddingBackend>,
    requests: std::sync::mpsc::Receiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
) {
    debug!(backend = backend.name(), "embedding worker started");

    while let Ok(request) = requests.recv() {
        let response = match request {
            WorkerRequest::Warmup { id } => {
                backend.load();
                WorkerResponse::WarmedUp { id }
            }
            WorkerRequest::Embed { id, text } => WorkerResponse::Embedding {
                id,
                vector: backend.embed(&text),
            },
            WorkerRequest::Search {
                id,
                snapshot,
                query,
                limit,
            } => {
                let query_embedding = backend.embed(&query);
                WorkerResponse::SearchHits {
                    id,
                    hits: top_k_indices(&snapshot, &query_embedding, limit),
                }
            }
        };

        if responses.send(response).is_err() {
            break;
        }
    }

    debug!("embedding worker stopped");
}

/// Correlate worker responses back to their oneshot senders. When the
/// response channel closes (worker thread gone), drain the pending map
/// with per-kind safe defaults.
async fn dispatch_responses(mut responses: mpsc::UnboundedReceiver<WorkerResponse>, pending: PendingMap) {
    while let Some(response) = responses.recv().await {
        let (id, reply) = match response {
            WorkerResponse::WarmedUp { id } => (id, pending.lock().await.remove(&id)),
            WorkerResponse::Embedding { id, vector } => {
                let entry = pending.lock().await.remove(&id);
                if let Some(PendingReply::Embedding(tx)) = entry {
                    let _ = tx.send(vector);
                    continue;
                }
                (id, entry)
            }
            WorkerResponse::SearchHits { id, hits } => {
                let entry = pending.lock().await.remove(&id);
                if let Some(PendingReply::Search(tx)) = entry {
                    let _ = tx.send(hits);
                    continue;
                }
                (id, entry)
            }
        };

        match reply {
            Some(PendingReply::Warmup(tx)) => {
                let _ = tx.send(());
            }
            Some(other) => {
                // Response kind did not match the registered request.
                warn!(id, "mismatched worker response kind");
                other.resolve_default();
            }
            None => warn!(id, "worker response for unknown request id"),
        }
    }

    let mut pending = pending.lock().await;
    if !pending.is_empty() {
        warn!(
            abandoned = pending.len(),
            "embedding worker faulted, resolving pending requests with defaults"
        );
    }
    for (_, reply) in pending.drain() {
        reply.resolve_default();
    }
}
