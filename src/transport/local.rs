use crate::api::RpcHandle;
use crate::replica::{AppendEntriesInput, AppendEntriesOutput, ReplicaId, RequestVoteInput, RequestVoteOutput};
use crate::transport::api::{PeerClient, TransportError};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Unreliable mode drops this share of requests, and again of replies.
const UNRELIABLE_DROP_RATIO: f64 = 0.1;
const UNRELIABLE_MAX_DELAY: Duration = Duration::from_millis(27);
// A call to an unreachable peer fails after this long, rather than instantly, so that retry
// loops don't spin.
const UNREACHABLE_DELAY: Duration = Duration::from_millis(10);

/// LocalNetwork is an in-process transport. Every member registers its [RpcHandle], and calls
/// between members are plain function calls on the receiver's handle.
///
/// Members can be disconnected to simulate partitions and crashes. A disconnected member can
/// neither send nor receive. The network can also be made unreliable, which drops and delays a
/// share of messages.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    state: Arc<Mutex<NetworkState>>,
}

#[derive(Default)]
struct NetworkState {
    handles: HashMap<ReplicaId, RpcHandle>,
    disconnected: HashSet<ReplicaId>,
    unreliable: bool,
    num_delivered: u64,
}

enum Route {
    Deliver(RpcHandle, bool),
    Unreachable,
}

impl LocalNetwork {
    pub fn new() -> Self {
        LocalNetwork::default()
    }

    /// Registers or replaces the handle that receives calls addressed to `replica_id`.
    pub fn register(&self, replica_id: ReplicaId, handle: RpcHandle) {
        self.lock().handles.insert(replica_id, handle);
    }

    /// Client for calls from `from` to `to`. Clients can be created before `to` registers.
    pub fn client(&self, from: ReplicaId, to: ReplicaId) -> Arc<dyn PeerClient> {
        Arc::new(LocalPeerClient {
            network: self.clone(),
            from,
            to,
        })
    }

    pub fn disconnect(&self, replica_id: &ReplicaId) {
        self.lock().disconnected.insert(replica_id.clone());
    }

    pub fn reconnect(&self, replica_id: &ReplicaId) {
        self.lock().disconnected.remove(replica_id);
    }

    pub fn is_connected(&self, replica_id: &ReplicaId) -> bool {
        !self.lock().disconnected.contains(replica_id)
    }

    pub fn set_unreliable(&self, unreliable: bool) {
        self.lock().unreliable = unreliable;
    }

    /// Number of requests handed to a receiver so far.
    pub fn num_delivered(&self) -> u64 {
        self.lock().num_delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        self.state.lock().expect("LocalNetwork mutex guard poison")
    }

    fn route(&self, from: &ReplicaId, to: &ReplicaId) -> Route {
        let mut state = self.lock();
        if state.disconnected.contains(from) || state.disconnected.contains(to) {
            return Route::Unreachable;
        }

        match state.handles.get(to).cloned() {
            Some(handle) => {
                state.num_delivered += 1;
                Route::Deliver(handle, state.unreliable)
            }
            None => Route::Unreachable,
        }
    }

    async fn call<I, O, F, Fut>(&self, from: &ReplicaId, to: &ReplicaId, input: I, deliver: F) -> Result<O, TransportError>
    where
        F: FnOnce(RpcHandle, I) -> Fut,
        Fut: std::future::Future<Output = Result<O, TransportError>>,
    {
        let (handle, unreliable) = match self.route(from, to) {
            Route::Deliver(handle, unreliable) => (handle, unreliable),
            Route::Unreachable => {
                tokio::time::sleep(UNREACHABLE_DELAY).await;
                return Err(TransportError::Unreachable(to.clone()));
            }
        };

        if unreliable {
            let (delay, drop_request) = {
                let mut rng = rand::thread_rng();
                (
                    rng.gen_range(Duration::from_millis(0)..=UNRELIABLE_MAX_DELAY),
                    rng.gen_bool(UNRELIABLE_DROP_RATIO),
                )
            };
            tokio::time::sleep(delay).await;
            if drop_request {
                return Err(TransportError::Dropped(to.clone()));
            }
        }

        let output = deliver(handle, input).await?;

        // The receiver may have been cut off while handling the request. Its reply is lost.
        if !self.is_connected(from) || !self.is_connected(to) {
            return Err(TransportError::Dropped(to.clone()));
        }
        if unreliable && rand::thread_rng().gen_bool(UNRELIABLE_DROP_RATIO) {
            return Err(TransportError::Dropped(to.clone()));
        }

        Ok(output)
    }
}

struct LocalPeerClient {
    network: LocalNetwork,
    from: ReplicaId,
    to: ReplicaId,
}

#[async_trait::async_trait]
impl PeerClient for LocalPeerClient {
    async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, TransportError> {
        self.network
            .call(&self.from, &self.to, input, |handle, input| async move {
                handle.request_vote(input).await.map_err(|_| TransportError::PeerExited)
            })
            .await
    }

    async fn append_entries(&self, input: AppendEntriesInput) -> Result<AppendEntriesOutput, TransportError> {
        self.network
            .call(&self.from, &self.to, input, |handle, input| async move {
                handle.append_entries(input).await.map_err(|_| TransportError::PeerExited)
            })
            .await
    }
}
