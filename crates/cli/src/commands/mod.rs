//! Subcommand implementations and shared wiring.

pub mod ask;
pub mod chat;
pub mod config_cmd;

use std::sync::Arc;

use causerie_config::AppConfig;
use causerie_core::event::EventBus;
use causerie_core::evidence::EvidenceFetcher;
use causerie_core::llm::LanguageModel;
use causerie_core::store::KvStore;
use causerie_engine::{Engine, Session};
use causerie_memory::{HashEmbedder, MemoryStore, StoreSettings};
use causerie_providers::{FileKvStore, HttpEvidenceFetcher, MemoryKvStore, OpenAiCompatModel};

/// Everything a command needs to run turns.
pub(crate) struct Runtime {
    pub engine: Engine,
    pub bus: Arc<EventBus>,
    pub session: Session,
    pub memory: Arc<MemoryStore>,
}

/// Wire the concrete backends together. `ephemeral` swaps the file
/// store for an in-process one, so nothing is restored or persisted.
pub(crate) async fn build_runtime(config: AppConfig, ephemeral: bool) -> Runtime {
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiCompatModel::new(&config.model));
    let fetcher: Arc<dyn EvidenceFetcher> = Arc::new(HttpEvidenceFetcher::new(&config.search));
    let kv: Arc<dyn KvStore> = if ephemeral {
        Arc::new(MemoryKvStore::new())
    } else {
        Arc::new(FileKvStore::new(FileKvStore::default_root()))
    };

    let memory = Arc::new(MemoryStore::new(
        StoreSettings {
            enabled: config.memory.enabled,
            capacity: config.memory.capacity,
            content_char_cap: config.memory.content_char_cap,
        },
        Box::new(HashEmbedder::new(config.memory.embedding_dimension)),
    ));
    memory.warmup().await;

    let bus = Arc::new(EventBus::default());
    let session = Session::restore(kv).await;
    let engine = Engine::new(model, fetcher, bus.clone(), config).with_memory(memory.clone());

    Runtime {
        engine,
        bus,
        session,
        memory,
    }
}
