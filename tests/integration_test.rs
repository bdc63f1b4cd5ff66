use bytes::Bytes;
use raft_peer::{
    ApplyMsg, FileStore, InMemoryStore, Index, LocalNetwork, PeerEndpoint, PersistentStore, RaftOptions, RaftPeer,
    RaftPeerConfig, ReplicaExited, ReplicaId, StartError, Term,
};
use slog::Drain;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

// Upper bound of the default election timeout.
const ELECTION_TIMEOUT: Duration = Duration::from_millis(550);

#[tokio::test]
async fn initial_election() {
    let cluster = Cluster::new(3);

    let (leader, term) = cluster.check_one_leader().await;
    assert!(term >= Term::new(1), "Leader {} elected in term 0", leader);

    // No leader failure, so nobody should start an election.
    sleep(ELECTION_TIMEOUT * 2).await;
    let (_, term_after) = cluster.check_one_leader().await;
    assert_eq!(term, term_after, "Term changed without any failure");
    assert_eq!(cluster.check_terms().await, term);
}

#[tokio::test]
async fn reelection_after_partitions() {
    let cluster = Cluster::new(3);
    let (leader1, _) = cluster.check_one_leader().await;

    // Leader goes away. The other two elect a new one.
    cluster.disconnect(leader1);
    let (leader2, _) = cluster.check_one_leader().await;
    assert_ne!(leader1, leader2);

    // Old leader comes back. It must not disturb the new one.
    cluster.connect(leader1);
    cluster.check_one_leader().await;

    // No quorum, no leader.
    let (leader3, _) = cluster.check_one_leader().await;
    cluster.disconnect(leader3);
    cluster.disconnect((leader3 + 1) % 3);
    sleep(ELECTION_TIMEOUT * 2).await;
    cluster.check_no_leader().await;

    // Quorum is back.
    cluster.connect((leader3 + 1) % 3);
    cluster.check_one_leader().await;

    cluster.connect(leader3);
    cluster.check_one_leader().await;
}

#[tokio::test]
async fn commands_are_applied_in_order_everywhere() {
    let cluster = Cluster::new(3);
    cluster.check_one_leader().await;

    for i in 1..=5 {
        assert_eq!(cluster.n_committed(Index::new(i)).0, 0, "Committed before start()");

        let index = cluster.one(&format!("cmd-{}", i), 3).await;
        assert_eq!(index, Index::new(i));
    }

    for peer in 0..3 {
        let commands: Vec<Bytes> = cluster.applied(peer).into_iter().map(|(_, command)| command).collect();
        let expected: Vec<Bytes> = (1..=5).map(|i| Bytes::from(format!("cmd-{}", i))).collect();
        assert_eq!(commands, expected, "Peer {}", peer);
    }
}

#[tokio::test]
async fn agreement_despite_follower_disconnect() {
    let cluster = Cluster::new(3);
    cluster.one("101", 3).await;

    let (leader, _) = cluster.check_one_leader().await;
    cluster.disconnect((leader + 1) % 3);

    // Two out of three is enough.
    cluster.one("102", 2).await;
    cluster.one("103", 2).await;
    sleep(ELECTION_TIMEOUT).await;
    cluster.one("104", 2).await;

    // The follower catches up once it's back.
    cluster.connect((leader + 1) % 3);
    cluster.one("105", 3).await;
}

#[tokio::test]
async fn no_agreement_without_majority() {
    let cluster = Cluster::new(5);
    cluster.one("10", 5).await;

    let (leader, _) = cluster.check_one_leader().await;
    for offset in 1..=3 {
        cluster.disconnect((leader + offset) % 5);
    }

    let entry_id = cluster
        .peer(leader)
        .start(Bytes::from_static(b"20"))
        .await
        .expect("Leader rejected start()");
    assert_eq!(entry_id.index, Index::new(2));

    sleep(ELECTION_TIMEOUT * 2).await;
    assert_eq!(cluster.n_committed(Index::new(2)).0, 0, "Committed without majority");

    for offset in 1..=3 {
        cluster.connect((leader + offset) % 5);
    }

    // Whoever leads now, agreement resumes. Index 2 is either "20" or was overwritten.
    cluster.one("30", 5).await;
    cluster.one("1000", 5).await;
}

#[tokio::test]
async fn uncommitted_entries_of_old_leader_are_overwritten() {
    let cluster = Cluster::new(3);
    cluster.one("101", 3).await;

    // Old leader accepts commands it can't commit.
    let (leader1, _) = cluster.check_one_leader().await;
    cluster.disconnect(leader1);
    for command in &["102", "103", "104"] {
        cluster
            .peer(leader1)
            .start(Bytes::from(command.to_string()))
            .await
            .expect("Partitioned leader still thinks it leads");
    }

    // New leader commits at the same index.
    let index = cluster.one("103-new", 2).await;
    assert_eq!(index, Index::new(2));

    // New leader partitioned too, old one back.
    let (leader2, _) = cluster.check_one_leader().await;
    cluster.disconnect(leader2);
    cluster.connect(leader1);
    cluster.one("104-new", 2).await;

    cluster.connect(leader2);
    cluster.one("105", 3).await;

    // The stale suffix never got applied anywhere.
    for peer in 0..3 {
        let applied = cluster.applied(peer);
        assert!(
            applied.iter().all(|(_, command)| command.as_ref() != b"102"),
            "Peer {} applied an overwritten entry",
            peer
        );
    }
}

#[tokio::test]
async fn state_survives_restart() {
    let mut cluster = Cluster::new(3);
    cluster.one("11", 3).await;
    let (_, term_before) = cluster.check_one_leader().await;

    // Crash everyone and bring them back from their stores.
    for peer in 0..3 {
        cluster.crash(peer);
    }
    for peer in 0..3 {
        cluster.restart(peer);
    }

    let (_, term_after) = cluster.check_one_leader().await;
    assert!(term_after > term_before);

    cluster.one("12", 3).await;

    // Entries are re-applied from the start after a restart.
    for peer in 0..3 {
        let applied = cluster.applied(peer);
        assert_eq!(applied[0], (Index::new(1), Bytes::from_static(b"11")), "Peer {}", peer);
    }

    // Crash the leader alone, commit without it, restart it.
    let (leader, _) = cluster.check_one_leader().await;
    cluster.crash(leader);
    cluster.one("13", 2).await;
    cluster.restart(leader);
    cluster.one("14", 3).await;
}

#[tokio::test]
async fn start_on_follower_redirects_to_leader() {
    let cluster = Cluster::new(3);
    let (leader, _) = cluster.check_one_leader().await;
    // Let every follower hear from the leader.
    sleep(Duration::from_millis(300)).await;

    for follower in (0..3).filter(|peer| *peer != leader) {
        let result = cluster.peer(follower).start(Bytes::from_static(b"x")).await;
        assert_eq!(result, Err(StartError::LeaderRedirect(replica_id(leader))));
    }
}

#[tokio::test]
async fn kill_stops_peer() {
    let mut cluster = Cluster::new(3);
    let (leader, _) = cluster.check_one_leader().await;

    let peer = cluster.take_peer(leader);
    peer.kill();
    peer.kill();
    assert!(peer.is_killed());
    assert_eq!(peer.get_state().await, Err(ReplicaExited));
    assert_eq!(
        peer.start(Bytes::from_static(b"x")).await,
        Err(StartError::ReplicaExited)
    );

    // Its RPC handle is dead too.
    let rpc_handle = peer.rpc_handle();
    drop(peer);
    sleep(Duration::from_millis(50)).await;
    let result = rpc_handle
        .request_vote(raft_peer::RequestVoteInput {
            candidate_term: Term::new(100),
            candidate_id: replica_id((leader + 1) % 3),
            last_log_index: Index::new(0),
            last_log_term: Term::new(0),
        })
        .await;
    assert_eq!(result, Err(ReplicaExited));

    // The remaining two carry on.
    cluster.one("after-kill", 2).await;
}

#[tokio::test]
async fn agreement_over_unreliable_network() {
    let cluster = Cluster::new(5);
    cluster.network.set_unreliable(true);

    for i in 0..20 {
        cluster.one(&format!("unreliable-{}", i), 1).await;
    }

    cluster.network.set_unreliable(false);
    cluster.one("reliable", 5).await;
    assert!(cluster.network.num_delivered() > 0);
}

#[tokio::test]
async fn single_member_cluster_commits_alone() {
    let cluster = Cluster::new(1);
    let (leader, _) = cluster.check_one_leader().await;
    assert_eq!(leader, 0);

    assert_eq!(cluster.one("solo-1", 1).await, Index::new(1));
    assert_eq!(cluster.one("solo-2", 1).await, Index::new(2));
}

#[tokio::test]
async fn file_store_restart() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("raft-state");

    let create = |apply_tx: mpsc::Sender<ApplyMsg>| {
        raft_peer::create_raft_peer(RaftPeerConfig {
            logger: create_test_logger("solo"),
            my_replica_id: ReplicaId::new("solo"),
            peers: vec![],
            store: Box::new(FileStore::new(&path)),
            apply_queue: apply_tx,
            options: RaftOptions::default(),
        })
        .unwrap()
    };

    let (apply_tx, mut apply_rx) = mpsc::channel(10);
    let peer = create(apply_tx);
    let entry_id = start_when_leader(&peer).await;
    assert_eq!(entry_id.index, Index::new(1));
    let applied = recv_command(&mut apply_rx).await;
    assert_eq!(applied, (Index::new(1), Bytes::from_static(b"durable")));
    peer.kill();
    drop(peer);

    let persisted = FileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(persisted.log.len(), 2);

    // Same entry comes back, and is applied again once the new term's leader commits.
    let (apply_tx, mut apply_rx) = mpsc::channel(10);
    let peer = create(apply_tx);
    let entry_id = start_when_leader(&peer).await;
    assert_eq!(entry_id.index, Index::new(2));
    assert_eq!(
        recv_command(&mut apply_rx).await,
        (Index::new(1), Bytes::from_static(b"durable"))
    );
    assert_eq!(recv_command(&mut apply_rx).await.0, Index::new(2));
}

async fn start_when_leader(peer: &RaftPeer) -> raft_peer::EntryId {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Ok(entry_id) = peer.start(Bytes::from_static(b"durable")).await {
            return entry_id;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("Single member never became leader");
}

async fn recv_command(apply_rx: &mut mpsc::Receiver<ApplyMsg>) -> (Index, Bytes) {
    match tokio::time::timeout(Duration::from_secs(5), apply_rx.recv()).await {
        Ok(Some(ApplyMsg::Command { index, command, .. })) => (index, command),
        other => panic!("Expected applied command, got {:?}", other),
    }
}

/// Cluster drives a whole raft cluster in process, over a [LocalNetwork].
struct Cluster {
    network: LocalNetwork,
    num_members: usize,
    peers: Vec<Option<RaftPeer>>,
    // Survive crashes, like disks.
    stores: Vec<InMemoryStore>,
    // One log of applied commands per peer incarnation. A restart starts a fresh one.
    applied: Vec<Arc<Mutex<Vec<(Index, Bytes)>>>>,
}

impl Cluster {
    fn new(num_members: usize) -> Self {
        let mut cluster = Cluster {
            network: LocalNetwork::new(),
            num_members,
            peers: (0..num_members).map(|_| None).collect(),
            stores: (0..num_members).map(|_| InMemoryStore::new()).collect(),
            applied: (0..num_members).map(|_| Arc::default()).collect(),
        };
        for peer in 0..num_members {
            cluster.restart(peer);
        }

        cluster
    }

    fn restart(&mut self, i: usize) {
        assert!(self.peers[i].is_none(), "Peer {} is still running", i);
        let my_id = replica_id(i);
        let peers = (0..self.num_members)
            .filter(|j| *j != i)
            .map(|j| PeerEndpoint {
                replica_id: replica_id(j),
                client: self.network.client(my_id.clone(), replica_id(j)),
            })
            .collect();

        let (apply_tx, apply_rx) = mpsc::channel(16);
        let peer = raft_peer::create_raft_peer(RaftPeerConfig {
            logger: create_test_logger(my_id.as_str()),
            my_replica_id: my_id.clone(),
            peers,
            store: Box::new(self.stores[i].clone()),
            apply_queue: apply_tx,
            options: RaftOptions::default(),
        })
        .expect("Failed to create peer");

        self.network.register(my_id.clone(), peer.rpc_handle());
        self.network.reconnect(&my_id);

        let applied = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(collect_applied(apply_rx, applied.clone()));
        self.applied[i] = applied;
        self.peers[i] = Some(peer);
    }

    fn crash(&mut self, i: usize) {
        self.take_peer(i).kill();
    }

    fn take_peer(&mut self, i: usize) -> RaftPeer {
        self.network.disconnect(&replica_id(i));
        self.peers[i].take().expect("Peer is not running")
    }

    fn peer(&self, i: usize) -> &RaftPeer {
        self.peers[i].as_ref().expect("Peer is not running")
    }

    fn disconnect(&self, i: usize) {
        self.network.disconnect(&replica_id(i));
    }

    fn connect(&self, i: usize) {
        self.network.reconnect(&replica_id(i));
    }

    fn is_up(&self, i: usize) -> bool {
        self.peers[i].is_some() && self.network.is_connected(&replica_id(i))
    }

    fn applied(&self, i: usize) -> Vec<(Index, Bytes)> {
        self.applied[i].lock().unwrap().clone()
    }

    /// Waits for exactly one leader among connected peers, and returns it with its term.
    async fn check_one_leader(&self) -> (usize, Term) {
        for _ in 0..10 {
            sleep(ELECTION_TIMEOUT).await;

            let mut leaders: HashMap<Term, Vec<usize>> = HashMap::new();
            for i in (0..self.num_members).filter(|i| self.is_up(*i)) {
                let state = self.peer(i).get_state().await.expect("Peer exited");
                if state.is_leader {
                    leaders.entry(state.term).or_default().push(i);
                }
            }

            for (term, ids) in leaders.iter() {
                assert_eq!(ids.len(), 1, "Term {:?} has {} leaders", term, ids.len());
            }
            if let Some((term, ids)) = leaders.into_iter().max_by_key(|(term, _)| *term) {
                return (ids[0], term);
            }
        }

        panic!("Expected one leader, got none");
    }

    async fn check_no_leader(&self) {
        for i in (0..self.num_members).filter(|i| self.is_up(*i)) {
            let state = self.peer(i).get_state().await.expect("Peer exited");
            assert!(!state.is_leader, "Peer {} is leader, but should not be", i);
        }
    }

    /// Checks that all connected peers agree on the term, and returns it.
    async fn check_terms(&self) -> Term {
        let mut term = None;
        for i in (0..self.num_members).filter(|i| self.is_up(*i)) {
            let peer_term = self.peer(i).get_state().await.expect("Peer exited").term;
            match term {
                None => term = Some(peer_term),
                Some(t) => assert_eq!(t, peer_term, "Peers disagree on term"),
            }
        }

        term.expect("No peer is up")
    }

    /// How many peers have applied `index`, and the command they applied. Panics if any two
    /// peers applied different commands at the same index, or a peer applied out of order.
    fn n_committed(&self, index: Index) -> (usize, Option<Bytes>) {
        let mut count = 0;
        let mut command = None;
        for (i, applied) in self.applied.iter().enumerate() {
            let applied = applied.lock().unwrap();
            for (position, (applied_index, _)) in applied.iter().enumerate() {
                assert_eq!(
                    applied_index.as_u64(),
                    position as u64 + 1,
                    "Peer {} applied out of order",
                    i
                );
            }

            if let Some((_, applied_command)) = applied.get(index.as_u64() as usize - 1) {
                if let Some(previous) = &command {
                    assert_eq!(previous, applied_command, "Peers applied different commands at {:?}", index);
                }
                command = Some(applied_command.clone());
                count += 1;
            }
        }

        (count, command)
    }

    /// Submits `command` to whoever is leader, and waits for at least `expected_peers` to apply
    /// it. Retries through leader changes. Returns the command's index.
    async fn one(&self, command: &str, expected_peers: usize) -> Index {
        let command = Bytes::from(command.to_string());
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut candidate = 0;

        while Instant::now() < deadline {
            let mut started = None;
            for _ in 0..self.num_members {
                candidate = (candidate + 1) % self.num_members;
                if !self.is_up(candidate) {
                    continue;
                }
                if let Ok(entry_id) = self.peer(candidate).start(command.clone()).await {
                    started = Some(entry_id.index);
                    break;
                }
            }

            if let Some(index) = started {
                let wait_until = Instant::now() + Duration::from_secs(2);
                while Instant::now() < wait_until {
                    let (count, applied_command) = self.n_committed(index);
                    if count >= expected_peers && applied_command.as_ref() == Some(&command) {
                        return index;
                    }
                    sleep(Duration::from_millis(20)).await;
                }
            } else {
                sleep(Duration::from_millis(50)).await;
            }
        }

        panic!("one({:?}) failed to reach agreement", command);
    }
}

async fn collect_applied(mut apply_rx: mpsc::Receiver<ApplyMsg>, applied: Arc<Mutex<Vec<(Index, Bytes)>>>) {
    while let Some(msg) = apply_rx.recv().await {
        if let ApplyMsg::Command { index, command, .. } = msg {
            applied.lock().unwrap().push((index, command));
        }
    }
}

fn replica_id(i: usize) -> ReplicaId {
    ReplicaId::new(format!("replica-{}", i + 1))
}

fn create_test_logger(replica_id: &str) -> slog::Logger {
    let decorator = slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, slog::Level::Warning).fuse();

    slog::Logger::root(drain, slog::o!("ReplicaId" => replica_id.to_string()))
}

async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
