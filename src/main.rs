#[macro_use]
extern crate log;
extern crate clap;
extern crate ring_store;

use clap::Parser;
use std::path::PathBuf;
use std::process;

use ring_store::{logging, Config, Node, NodeId};

/// Runs one member of a storage ring.
#[derive(Parser, Debug)]
#[command(name = "ring-node", version)]
struct Args {
    /// Identity of this node in the ring (e.g. `A`).
    #[arg(long, env = "RING_NODE_ID")]
    id: String,

    /// Ring configuration file. The built-in four-node ring is used if omitted.
    #[arg(long, env = "RING_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run(args: &Args) -> ring_store::Result<()> {
    let config = Config::load(args.config.as_ref().map(PathBuf::as_path))?;
    let node = Node::new(&config, &NodeId::new(&args.id))?;
    node.wait();
    Ok(())
}

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    if let Err(err) = run(&args) {
        error!("{} - Could not start node: {}", NodeId::new(&args.id), err);
        process::exit(1);
    }
}
