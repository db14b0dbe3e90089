extern crate ring_store;

use ring_store::protocol::{Request, Response};
use ring_store::{Client, Config, Error, Node, NodeId};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

struct TestRing {
    config: Config,
    nodes: Vec<Node>,
}

impl TestRing {
    /// Starts one node per id on ephemeral ports; successor order is the order of `ids`.
    fn start(ids: &[&str], replication_factor: u32) -> Self {
        TestRing::start_with_workers(ids, replication_factor, ring_store::WORKER_COUNT)
    }

    fn start_with_workers(ids: &[&str], replication_factor: u32, workers: usize) -> Self {
        let listeners: Vec<TcpListener> = ids
            .iter()
            .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();
        let addrs: Vec<(&str, SocketAddr)> = ids
            .iter()
            .zip(&listeners)
            .map(|(id, listener)| (*id, listener.local_addr().unwrap()))
            .collect();

        let mut config = Config::with_nodes(&addrs);
        config.replication_factor = replication_factor;
        config.probe_timeout_ms = 200;
        config.request_timeout_ms = 2000;
        config.workers = workers;

        let nodes = ids
            .iter()
            .zip(listeners)
            .map(|(id, listener)| Node::with_listener(&config, &NodeId::new(id), listener).unwrap())
            .collect();
        TestRing { config, nodes }
    }

    fn node(&self, id: &str) -> &Node {
        let id = NodeId::new(id);
        self.nodes
            .iter()
            .find(|node| node.node_data().id == id)
            .unwrap()
    }

    fn client(&self) -> Client {
        Client::new(&self.config).unwrap()
    }

    fn kill(&self, id: &str) {
        let node = self.node(id);
        let addr = node.addr();
        node.kill();
        assert!(wait_until(|| {
            TcpStream::connect_timeout(&addr, Duration::from_millis(100)).is_err()
        }));
    }

    /// Returns how many nodes hold fragment `position` of `file_name`.
    fn holders(&self, file_name: &str, position: u32) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.holds_fragment(file_name, position))
            .count()
    }
}

impl Drop for TestRing {
    fn drop(&mut self) {
        for node in &self.nodes {
            node.kill();
        }
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// Uploads a 200-byte file to `A` of a four-node ring with `R = 2` and waits for placement.
fn four_node_ring_with_file() -> TestRing {
    let ring = TestRing::start(&["A", "B", "C", "D"], 2);
    let message = ring
        .client()
        .upload(&NodeId::new("A"), "file.bin", content(200))
        .unwrap();
    assert!(message.contains("4 fragments"));
    assert!(wait_until(|| (0..4).all(|position| ring.holders("file.bin", position) == 2)));
    ring
}

#[test]
fn test_download_from_other_node() {
    let ring = four_node_ring_with_file();
    let downloaded = ring
        .client()
        .download(&NodeId::new("D"), "file.bin")
        .unwrap();
    assert_eq!(downloaded, content(200));
}

#[test]
fn test_placement_rotates_across_peers() {
    let ring = four_node_ring_with_file();
    assert_eq!(ring.node("A").local_fragment_count("file.bin"), 4);
    assert!(ring.node("B").holds_fragment("file.bin", 0));
    assert!(ring.node("C").holds_fragment("file.bin", 1));
    assert!(ring.node("D").holds_fragment("file.bin", 2));
    assert!(ring.node("B").holds_fragment("file.bin", 3));
}

#[test]
fn test_download_with_missing_fragment_is_incomplete() {
    let ring = four_node_ring_with_file();
    // A and D hold the only copies of position 2
    assert!(ring.node("A").holds_fragment("file.bin", 2));
    assert!(ring.node("D").holds_fragment("file.bin", 2));
    assert_eq!(ring.holders("file.bin", 2), 2);
    ring.kill("A");
    ring.kill("D");

    match ring.node("B").retrieve("file.bin") {
        Err(Error::Incomplete { have, total, .. }) => {
            assert_eq!(have, 3);
            assert_eq!(total, 4);
        },
        other => panic!("expected Incomplete, got {:?}", other),
    }
    match ring.client().download(&NodeId::new("B"), "file.bin") {
        Err(Error::Remote(message)) => assert!(message.contains("incomplete")),
        other => panic!("expected a remote error, got {:?}", other),
    }
}

#[test]
fn test_download_survives_one_down_node() {
    let ring = four_node_ring_with_file();
    ring.kill("C");
    let downloaded = ring
        .client()
        .download(&NodeId::new("D"), "file.bin")
        .unwrap();
    assert_eq!(downloaded, content(200));
}

#[test]
fn test_download_unknown_file_is_not_found() {
    let ring = TestRing::start(&["A", "B", "C"], 2);
    match ring.node("B").retrieve("missing") {
        Err(Error::NotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected NotFound, got {:?}", other),
    }
    match ring.client().download(&NodeId::new("A"), "missing") {
        Err(Error::Remote(message)) => assert!(message.contains("not found")),
        other => panic!("expected a remote error, got {:?}", other),
    }
}

#[test]
fn test_list_is_union_from_every_node() {
    let ring = TestRing::start(&["A", "B", "C", "D"], 2);
    let client = ring.client();
    client.upload(&NodeId::new("A"), "x", content(100)).unwrap();
    client.upload(&NodeId::new("C"), "y", content(10)).unwrap();

    for id in &["A", "B", "C", "D"] {
        let files = client.list(&NodeId::new(id)).unwrap();
        assert_eq!(files, vec!["x".to_string(), "y".to_string()]);
    }
}

#[test]
fn test_propagation_is_bounded_by_replication_factor() {
    let ring = TestRing::start(&["A", "B", "C", "D", "E"], 3);
    ring.client()
        .upload(&NodeId::new("A"), "big", content(64 * 6))
        .unwrap();

    assert!(wait_until(|| (0..6).all(|position| ring.holders("big", position) >= 2)));
    // let any in-flight envelopes land before counting
    thread::sleep(Duration::from_millis(300));
    for position in 0..6 {
        let holders = ring.holders("big", position);
        assert!(holders <= 3, "position {} held by {} nodes", position, holders);
    }
    assert_eq!(ring.holders("big", 0), 3);
}

#[test]
fn test_single_replica_stays_on_entry_node() {
    let ring = TestRing::start(&["A", "B", "C"], 1);
    ring.client()
        .upload(&NodeId::new("B"), "solo", content(130))
        .unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(ring.node("B").local_fragment_count("solo"), 3);
    assert_eq!(ring.node("A").local_fragment_count("solo"), 0);
    assert_eq!(ring.node("C").local_fragment_count("solo"), 0);
    assert_eq!(
        ring.client().download(&NodeId::new("C"), "solo").unwrap(),
        content(130)
    );
}

#[test]
fn test_replicate_discards_saturated_envelope() {
    let ring = TestRing::start(&["A", "B"], 2);
    let fragment = ring_store::fragment::split("late", b"payload", 64).remove(0);
    assert!(ring
        .node("A")
        .handle_request(Request::Replicate {
            fragment: fragment.clone(),
            replica_count: 2,
        })
        .is_none());
    assert_eq!(ring.node("A").local_fragment_count("late"), 0);

    ring.node("A").handle_replicate(fragment, 1);
    assert!(ring.node("A").holds_fragment("late", 0));
    thread::sleep(Duration::from_millis(200));
    assert_eq!(ring.node("B").local_fragment_count("late"), 0);
}

#[test]
fn test_upload_of_existing_name_is_rejected() {
    let ring = TestRing::start(&["A", "B", "C"], 2);
    let client = ring.client();
    client.upload(&NodeId::new("A"), "f", content(200)).unwrap();
    match client.upload(&NodeId::new("A"), "f", content(300)) {
        Err(Error::Remote(message)) => assert!(message.contains("already exists")),
        other => panic!("expected a remote error, got {:?}", other),
    }
    assert_eq!(ring.node("A").local_fragment_count("f"), 4);
    assert!(wait_until(|| (0..4).all(|position| ring.holders("f", position) == 2)));
    assert_eq!(
        client.download(&NodeId::new("B"), "f").unwrap(),
        content(200)
    );
}

#[test]
fn test_concurrent_downloads_with_one_worker() {
    let ring = TestRing::start_with_workers(&["A", "B"], 1, 1);
    let client = ring.client();
    client.upload(&NodeId::new("A"), "a", content(150)).unwrap();
    client.upload(&NodeId::new("B"), "b", content(90)).unwrap();

    // each download needs a search answered by the other node while it serves its own client
    let handles: Vec<_> = vec![("B", "a", 150), ("A", "b", 90)]
        .into_iter()
        .map(|(via, file_name, len)| {
            let client = ring.client();
            thread::spawn(move || {
                let downloaded = client.download(&NodeId::new(via), file_name).unwrap();
                assert_eq!(downloaded, content(len));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_empty_upload_is_rejected() {
    let ring = TestRing::start(&["A", "B"], 2);
    match ring.client().upload(&NodeId::new("A"), "empty", Vec::new()) {
        Err(Error::Remote(message)) => assert!(message.contains("empty")),
        other => panic!("expected a remote error, got {:?}", other),
    }
    match ring.node("A").handle_request(Request::Upload {
        file_name: String::new(),
        content: vec![1],
    }) {
        Some(Response::Error { .. }) => {},
        other => panic!("expected an error response, got {:?}", other),
    }
}

#[test]
fn test_malformed_message_is_dropped() {
    let ring = TestRing::start(&["A", "B"], 2);
    let mut stream = TcpStream::connect(ring.node("A").addr()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream.write_all(b"\xEEnot a request").unwrap();
    stream.shutdown(Shutdown::Write).unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).unwrap();
    assert!(reply.is_empty());

    assert!(ring.client().list(&NodeId::new("A")).unwrap().is_empty());
}

#[test]
fn test_unknown_node_is_rejected_locally() {
    let ring = TestRing::start(&["A", "B"], 2);
    match ring.client().list(&NodeId::new("Q")) {
        Err(Error::UnknownNode(id)) => assert_eq!(id, "Q"),
        other => panic!("expected UnknownNode, got {:?}", other),
    }
}
