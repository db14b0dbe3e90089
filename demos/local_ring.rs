extern crate ring_store;

use ring_store::{logging, Client, Config, Node, NodeId};
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

fn main() {
    logging::init("info");

    let ids = ["A", "B", "C", "D"];
    let listeners: Vec<TcpListener> = ids
        .iter()
        .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    let addrs: Vec<(&str, SocketAddr)> = ids
        .iter()
        .zip(&listeners)
        .map(|(id, listener)| (*id, listener.local_addr().unwrap()))
        .collect();
    let config = Config::with_nodes(&addrs);

    let nodes: Vec<Node> = ids
        .iter()
        .zip(listeners)
        .map(|(id, listener)| Node::with_listener(&config, &NodeId::new(id), listener).unwrap())
        .collect();
    let client = Client::new(&config).unwrap();

    let content: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();
    println!("{}", client.upload(&NodeId::new("A"), "hello.bin", content.clone()).unwrap());

    // placement is asynchronous, so sleep for a second
    thread::sleep(Duration::from_millis(1000));

    nodes[2].kill();
    thread::sleep(Duration::from_millis(200));

    assert_eq!(client.download(&NodeId::new("D"), "hello.bin").unwrap(), content);
    println!("{:?}", client.list(&NodeId::new("B")).unwrap());
}
