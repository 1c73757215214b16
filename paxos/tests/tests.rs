use std::sync::Arc;
use std::time::Duration;

use futures::future::{abortable, Aborted};
use labrpc::RpcError;
use tokio::sync::mpsc;

use paxos::cluster::{acceptor_cluster, node_cluster, random_string};
use paxos::{AcceptorState, Config, PaxosError, ProposalNumber};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Short timeouts so unavailable acceptors cost little.
fn config() -> Config {
    Config {
        call_timeout_ms: 100,
        backoff_min_ms: 1,
        backoff_max_ms: 20,
        ..Config::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_proposer() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());
    let p = cluster.proposer(1, config()).unwrap();

    assert_eq!(p.read().await, None);
    assert_eq!(p.choose("X".into()).await.unwrap(), "X");
    assert_eq!(p.read().await, Some("X".into()));

    // Later writes return the chosen value.
    assert_eq!(p.choose("Y".into()).await.unwrap(), "X");
    for a in cluster.acceptors.iter() {
        assert_eq!(a.state().accepted.unwrap().value, "X");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_minority_down() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());
    cluster.acceptors[2].set_down(true);

    let p = cluster.proposer(1, config()).unwrap();
    assert_eq!(p.choose("X".into()).await.unwrap(), "X");
    assert_eq!(p.read().await, Some("X".into()));
    assert_eq!(cluster.acceptors[2].state(), AcceptorState::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_majority_down() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());
    cluster.acceptors[1].set_down(true);
    cluster.acceptors[2].set_down(true);

    let config = Config {
        max_attempts: Some(3),
        deadline_ms: None,
        ..config()
    };
    let p = cluster.proposer(1, config).unwrap();
    let e = p.choose("X".into()).await.unwrap_err();
    assert!(e.is_contention());
    assert!(matches!(e, PaxosError::QuorumNotReached { attempts: 3 }));
    assert_eq!(p.read().await, None);

    // Nothing was chosen, so the value can still be written once they are back.
    cluster.acceptors[1].set_down(false);
    assert_eq!(p.choose("Y".into()).await.unwrap(), "Y");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_network_partition() {
    init_logger();
    let cluster = acceptor_cluster(5, &config());
    cluster.network.set_down("acc-0", true);
    cluster.network.set_down("acc-1", true);

    let p = cluster.proposer(1, config()).unwrap();
    assert_eq!(p.choose("X".into()).await.unwrap(), "X");
    assert_eq!(cluster.acceptors[0].state(), AcceptorState::default());

    cluster.network.set_down("acc-0", false);
    cluster.network.set_down("acc-1", false);
    let q = cluster.proposer(2, config()).unwrap();
    assert_eq!(q.choose("Y".into()).await.unwrap(), "X");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_proposers_agree() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());
    let p1 = cluster.proposer(1, config()).unwrap();
    let p2 = cluster.proposer(2, config()).unwrap();

    let a = tokio::spawn(async move { p1.choose("A".into()).await });
    let b = tokio::spawn(async move { p2.choose("B".into()).await });
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(a, b);
    assert!(a == "A" || a == "B");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_adopt_partially_accepted_value() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());

    // A proposer that got "A" accepted by one acceptor only, then died.
    let acc = &cluster.clients[0];
    assert!(acc.prepare(ProposalNumber(1)).await.unwrap().ok);
    assert!(acc.accept(ProposalNumber(1), "A".into()).await.unwrap().ok);

    let p = cluster.proposer(2, config()).unwrap();
    // One of three holds a value: nothing is determined yet.
    assert_eq!(p.read().await, None);

    assert_eq!(p.choose("B".into()).await.unwrap(), "A");
    assert_eq!(p.read().await, Some("A".into()));
    assert!(p.highest_seen() > ProposalNumber(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stale_proposer_catches_up() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());
    for c in cluster.clients.iter() {
        assert!(c.prepare(ProposalNumber(1000)).await.unwrap().ok);
    }

    let p = cluster.proposer(3, config()).unwrap();
    assert_eq!(p.choose("X".into()).await.unwrap(), "X");
    assert!(p.highest_seen() > ProposalNumber(1000));
    assert_eq!(p.highest_seen().0 % 16, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_many_proposers() {
    const N: u32 = 10;
    const NPROP: u64 = 10;

    init_logger();
    let config = Config {
        max_attempts: None,
        deadline_ms: Some(60_000),
        ..config()
    };
    let cluster = acceptor_cluster(N, &config);
    let (tx, mut rx) = mpsc::channel(NPROP as usize);

    for i in 1..=NPROP {
        let p = cluster.proposer(i, config.clone()).unwrap();
        let tx = tx.clone();
        tokio::spawn(async move {
            let v = format!("p[{}]={}", i, random_string(10));
            tx.send(p.choose(v).await).await.unwrap();
        });
    }

    let mut chosen: Option<String> = None;
    for _ in 0..NPROP {
        let t = rx.recv().await.unwrap().unwrap();
        match &chosen {
            Some(s) => assert_eq!(s, &t),
            None => chosen = Some(t),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_lossy_network() {
    const NPROP: u64 = 3;

    init_logger();
    let config = Config {
        max_attempts: None,
        deadline_ms: Some(60_000),
        ..config()
    };
    let cluster = acceptor_cluster(5, &config);
    cluster.network.set_drop_rate(0.2);

    let mut writers = Vec::new();
    for i in 1..=NPROP {
        let p = cluster.proposer(i, config.clone()).unwrap();
        writers.push(tokio::spawn(async move { p.choose(format!("v{}", i)).await }));
    }
    let mut results = Vec::new();
    for w in writers {
        results.push(w.await.unwrap().unwrap());
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));

    cluster.network.set_drop_rate(0.0);
    let p = cluster.proposer(NPROP + 1, config).unwrap();
    assert_eq!(p.read().await, Some(results[0].clone()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_cancels() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());
    for a in cluster.acceptors.iter() {
        a.set_down(true);
    }

    let config = Config {
        max_attempts: None,
        deadline_ms: Some(300),
        ..config()
    };
    let p = cluster.proposer(1, config).unwrap();
    let e = p.choose("X".into()).await.unwrap_err();
    assert!(matches!(e, PaxosError::Cancelled { .. }));
    assert!(!e.is_contention());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abort_write() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());
    cluster.acceptors[0].set_down(true);
    cluster.acceptors[1].set_down(true);

    let config = Config {
        max_attempts: None,
        deadline_ms: None,
        ..config()
    };
    let p = Arc::new(cluster.proposer(1, config).unwrap());
    let (write, handle) = abortable({
        let p = p.clone();
        async move { p.choose("X".into()).await }
    });
    let write = tokio::spawn(write);
    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.abort();
    assert!(matches!(write.await.unwrap(), Err(Aborted)));

    // The aborted write left nothing chosen behind.
    cluster.acceptors[0].set_down(false);
    assert_eq!(p.read().await, None);
    assert_eq!(p.choose("Y".into()).await.unwrap(), "Y");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_membership_update() {
    init_logger();
    let cluster = acceptor_cluster(5, &config());
    let version = cluster.membership.update(cluster.clients[..3].to_vec());
    assert_eq!(version, 1);
    cluster.acceptors[3].set_down(true);
    cluster.acceptors[4].set_down(true);

    let p = cluster.proposer(1, config()).unwrap();
    assert_eq!(p.choose("X".into()).await.unwrap(), "X");
    assert_eq!(cluster.acceptors[3].state(), AcceptorState::default());
    assert_eq!(cluster.acceptors[4].state(), AcceptorState::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_malformed_request() {
    init_logger();
    let cluster = acceptor_cluster(1, &config());
    let e = cluster.clients[0]
        .prepare(ProposalNumber::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(
        e.downcast::<RpcError>().unwrap(),
        RpcError::InvalidRequest(_)
    ));

    let reply = cluster.clients[0]
        .call("{\"no_such_method\":{}}".into())
        .await
        .unwrap();
    assert!(reply.contains("InvalidRequest"));
    assert_eq!(cluster.acceptors[0].state(), AcceptorState::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_node_cluster() {
    init_logger();
    let cluster = node_cluster(3, &config()).unwrap();
    for (i, node) in cluster.nodes.iter().enumerate() {
        assert_eq!(node.proposer().identity(), i as u64 + 1);
        assert!(cluster.network.is_registered(&paxos::Node::acceptor_id(node.name())));
    }

    cluster.nodes[2].set_down(true);
    let chosen = cluster.nodes[0]
        .proposer_client()
        .choose("X".into())
        .await
        .unwrap();
    assert_eq!(chosen, "X");

    let read = cluster.nodes[1].proposer_client().read().await.unwrap();
    assert_eq!(read, Some("X".into()));

    cluster.nodes[2].set_down(false);
    let chosen = cluster.nodes[2]
        .proposer_client()
        .choose("Y".into())
        .await
        .unwrap();
    assert_eq!(chosen, "X");
    assert_eq!(
        cluster.nodes[2].acceptor().state().accepted.unwrap().value,
        "X"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_node_cluster_restart() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: Some(dir.path().to_owned()),
        ..config()
    };

    {
        let cluster = node_cluster(3, &config).unwrap();
        let chosen = cluster.nodes[0]
            .proposer_client()
            .choose("kept".into())
            .await
            .unwrap();
        assert_eq!(chosen, "kept");
    }

    let cluster = node_cluster(3, &config).unwrap();
    let chosen = cluster.nodes[1]
        .proposer_client()
        .choose("other".into())
        .await
        .unwrap();
    assert_eq!(chosen, "kept");
}

#[tokio::test]
async fn test_too_many_nodes() {
    let config = Config {
        max_proposers: 2,
        ..config()
    };
    assert!(matches!(
        node_cluster(3, &config),
        Err(PaxosError::InvalidIdentity { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_number_ends_write() {
    init_logger();
    let cluster = acceptor_cluster(3, &config());

    // Two acceptors hold different values under the same number, which unique
    // numbering rules out.
    let n = ProposalNumber(5);
    assert!(cluster.clients[0].accept(n, "a".into()).await.unwrap().ok);
    assert!(cluster.clients[1].accept(n, "b".into()).await.unwrap().ok);

    let config = Config {
        max_attempts: None,
        deadline_ms: Some(5_000),
        ..config()
    };
    let p = cluster.proposer(1, config).unwrap();
    let e = p.choose("X".into()).await.unwrap_err();
    assert!(matches!(e, PaxosError::ProtocolViolation(_)), "{}", e);
    assert!(!e.is_contention());

    // The write stopped in phase 1: nothing was overwritten.
    assert_eq!(cluster.acceptors[0].state().accepted.unwrap().value, "a");
    assert_eq!(cluster.acceptors[1].state().accepted.unwrap().value, "b");
    assert_eq!(cluster.acceptors[2].state().accepted, None);
}
