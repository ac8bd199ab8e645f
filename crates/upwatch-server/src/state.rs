use crate::clients::HttpClientFactory;
use crate::config::ServerConfig;
use crate::events::BroadcastEmitter;
use crate::peer::{PairingManager, PeerNotifier};
use anyhow::Result;
use std::sync::Arc;
use upwatch_engine::checkin::CheckInProcessor;
use upwatch_engine::graph::DependencyGraph;
use upwatch_engine::state::StateMachine;
use upwatch_notify::dispatcher::AlertDispatcher;
use upwatch_notify::plugin::ChannelRegistry;
use upwatch_store::memory::MemoryStore;
use upwatch_store::Store;

/// Everything the scheduler tasks and the API layer share. Built once at
/// startup; each field is independently `Arc`-shared into the tasks.
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn Store>,
    pub broadcaster: Arc<BroadcastEmitter>,
    pub state_machine: Arc<StateMachine>,
    pub checkins: Arc<CheckInProcessor>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub graph: Arc<DependencyGraph>,
    pub clients: Arc<HttpClientFactory>,
    pub peer_notifier: Arc<PeerNotifier>,
    pub pairing: Arc<PairingManager>,
}

impl AppState {
    /// Wires the engine against the in-memory reference store.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Wires the engine against any store implementation.
    pub fn with_store(config: ServerConfig, store: Arc<dyn Store>) -> Result<Self> {
        let broadcaster = Arc::new(BroadcastEmitter::new(256));
        let clients = Arc::new(HttpClientFactory::new(&config.http)?);

        let state_machine = Arc::new(StateMachine::new(store.clone(), broadcaster.clone()));
        let checkins = Arc::new(CheckInProcessor::new(store.clone(), state_machine.clone()));
        let dispatcher = Arc::new(AlertDispatcher::new(
            store.clone(),
            ChannelRegistry::default(),
            broadcaster.clone(),
        ));
        let graph = Arc::new(DependencyGraph::new(store.clone()));
        let peer_notifier = Arc::new(PeerNotifier::new(
            store.clone(),
            clients.peer_heartbeat().clone(),
            clients.peer_notification().clone(),
        ));
        let pairing = Arc::new(PairingManager::new(
            store.clone(),
            state_machine.clone(),
            broadcaster.clone(),
            clients.peer_notification().clone(),
            config.pairing.clone(),
        ));

        Ok(Self {
            config,
            store,
            broadcaster,
            state_machine,
            checkins,
            dispatcher,
            graph,
            clients,
            peer_notifier,
            pairing,
        })
    }
}
