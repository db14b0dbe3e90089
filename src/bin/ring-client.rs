extern crate clap;
extern crate ring_store;

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use ring_store::{logging, Client, Config, NodeId};

/// Uploads, downloads and lists files through any member of a storage ring.
#[derive(Parser, Debug)]
#[command(name = "ring-client", version)]
struct Cli {
    /// Ring configuration file. The built-in four-node ring is used if omitted.
    #[arg(long, global = true, env = "RING_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file under its base name.
    Upload {
        #[arg(long)]
        node: String,
        path: PathBuf,
    },
    /// Download a file and save it as `recovered_<name>`.
    Download {
        #[arg(long)]
        node: String,
        name: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List every file stored in the ring.
    List {
        #[arg(long)]
        node: String,
    },
}

fn file_name(path: &Path) -> ring_store::Result<String> {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => Err(ring_store::Error::InvalidUpload(format!(
            "{} has no file name",
            path.display()
        ))),
    }
}

fn run(cli: Cli) -> ring_store::Result<()> {
    let config = Config::load(cli.config.as_ref().map(PathBuf::as_path))?;
    let client = Client::new(&config)?;

    match cli.command {
        Command::Upload { node, path } => {
            let name = file_name(&path)?;
            let content = fs::read(&path)?;
            println!(
                "Sending '{}' ({} bytes) to node {}...",
                name,
                content.len(),
                NodeId::new(&node)
            );
            let message = client.upload(&NodeId::new(&node), &name, content)?;
            println!("{}", message);
        },
        Command::Download { node, name, output } => {
            println!("Requesting '{}' from node {}...", name, NodeId::new(&node));
            let content = client.download(&NodeId::new(&node), &name)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("recovered_{}", name)));
            fs::write(&output, &content)?;
            println!(
                "Recovered '{}' as {} ({} bytes).",
                name,
                output.display(),
                content.len()
            );
        },
        Command::List { node } => {
            let mut files = client.list(&NodeId::new(&node))?;
            files.sort();
            if files.is_empty() {
                println!("No files stored in the ring.");
            } else {
                println!("Files stored in the ring:");
                for file in files {
                    println!("- {}", file);
                }
            }
        },
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
