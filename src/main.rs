use bytes::Bytes;
use chrono::Utc;
use raft_peer::{ApplyMsg, GrpcPeerClient, InMemoryStore, PeerEndpoint, RaftOptions, RaftPeer, ReplicaId};
use slog::Drain;
use std::error::Error;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

const PORT_BASE: u16 = 7001;
const NUM_MEMBERS: usize = 3;
const NUM_COMMANDS: usize = 5;

/// Boots a 3 member cluster over loopback gRPC, replicates a few commands, and prints what every
/// member applies.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let root_logger = create_root_logger_for_stdout();

    let ids: Vec<ReplicaId> = (0..NUM_MEMBERS).map(replica_id).collect();
    let mut members = Vec::with_capacity(NUM_MEMBERS);
    for (i, my_id) in ids.iter().enumerate() {
        let logger = root_logger.new(slog::o!("ReplicaId" => my_id.to_string()));
        let peers = ids
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, peer_id)| PeerEndpoint {
                replica_id: peer_id.clone(),
                client: Arc::new(GrpcPeerClient::new(logger.clone(), peer_id.clone(), addr(j))),
            })
            .collect();

        let (apply_tx, apply_rx) = mpsc::channel(64);
        let peer = raft_peer::create_raft_peer(raft_peer::RaftPeerConfig {
            logger: logger.clone(),
            my_replica_id: my_id.clone(),
            peers,
            store: Box::new(InMemoryStore::new()),
            apply_queue: apply_tx,
            options: RaftOptions::default(),
        })?;

        let (shutdown_handle, shutdown_signal) = raft_peer::shutdown_signal();
        let server = raft_peer::RpcServer::new(logger, peer.rpc_handle());
        tokio::spawn(server.run(addr(i), shutdown_signal));

        members.push((peer, apply_rx, shutdown_handle));
    }

    let leader = find_leader(&members, Duration::from_secs(5)).await?;
    println!("Leader is {}", ids[leader]);

    for i in 0..NUM_COMMANDS {
        let command = format!("command-{} at {}", i, Utc::now().format("%H:%M:%S%.3f"));
        let entry_id = members[leader].0.start(Bytes::from(command.clone())).await?;
        println!("Started {:?} at {:?}", command, entry_id);
    }

    for (i, (_, apply_rx, _)) in members.iter_mut().enumerate() {
        for _ in 0..NUM_COMMANDS {
            match tokio::time::timeout(Duration::from_secs(5), apply_rx.recv()).await {
                Ok(Some(ApplyMsg::Command { index, term, command })) => {
                    println!(
                        "{} applied {:?}@{:?}: {}",
                        ids[i],
                        index,
                        term,
                        String::from_utf8_lossy(&command)
                    );
                }
                Ok(Some(other)) => println!("{} got {:?}", ids[i], other),
                Ok(None) | Err(_) => {
                    println!("{} stopped applying early", ids[i]);
                    break;
                }
            }
        }
    }

    for (peer, _, shutdown_handle) in members {
        peer.kill();
        shutdown_handle.shutdown();
    }

    Ok(())
}

async fn find_leader(
    members: &[(RaftPeer, mpsc::Receiver<ApplyMsg>, raft_peer::RpcServerShutdownHandle)],
    timeout: Duration,
) -> Result<usize, Box<dyn Error>> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        for (i, (peer, _, _)) in members.iter().enumerate() {
            if peer.get_state().await?.is_leader {
                return Ok(i);
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Err("Timeout waiting for leader election".into())
}

fn replica_id(i: usize) -> ReplicaId {
    ReplicaId::new(format!("replica-{}", i + 1))
}

fn addr(i: usize) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, PORT_BASE + i as u16))
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, slog::Level::Info).fuse();

    slog::Logger::root(drain, slog::o!())
}
