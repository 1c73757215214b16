use std::io::Write;
use std::path::PathBuf;

use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};

use paxos::cluster::{node_cluster, NodeCluster};
use paxos::shell::{self, Command};
use paxos::Config;

#[derive(StructOpt, Debug)]
#[structopt(name = env!("CARGO_PKG_NAME"), version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opt {
    /// Number of nodes in the cluster
    #[structopt(short, long, default_value = "3")]
    nodes: u32,

    /// JSON config file
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Timeout in milliseconds of a single call to an acceptor
    #[structopt(long)]
    call_timeout_ms: Option<u64>,

    /// Rounds a write may run before giving up
    #[structopt(long)]
    max_attempts: Option<u32>,

    /// Directory where acceptors keep their state
    #[structopt(long, parse(from_os_str))]
    data_dir: Option<PathBuf>,
}

impl Opt {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(ms) = self.call_timeout_ms {
            config.call_timeout_ms = ms;
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = Some(n);
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

async fn run(cluster: &NodeCluster, cmd: Command) {
    let index = match &cmd {
        Command::Set { node, .. }
        | Command::Get { node }
        | Command::Down { node }
        | Command::Up { node } => *node,
        Command::Help | Command::Quit => {
            println!("{}", shell::USAGE);
            return;
        }
    };
    let node = match cluster.nodes.get(index) {
        Some(node) => node,
        None => {
            println!("no node {}, cluster has {}", index, cluster.nodes.len());
            return;
        }
    };

    match cmd {
        Command::Set { value, .. } => match node.proposer_client().choose(value).await {
            Ok(chosen) => println!("chosen: {}", chosen),
            Err(e) => println!("set failed: {}", e),
        },
        Command::Get { .. } => match node.proposer_client().read().await {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => println!("no value chosen yet"),
            Err(e) => println!("get failed: {}", e),
        },
        Command::Down { .. } => {
            node.set_down(true);
            println!("{} is down", node.name());
        }
        Command::Up { .. } => {
            node.set_down(false);
            println!("{} is up", node.name());
        }
        Command::Help | Command::Quit => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opt = Opt::from_args();
    let config = opt.config()?;
    let cluster = node_cluster(opt.nodes, &config)?;
    println!("{}", shell::USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Enter a command: ");
        std::io::stdout().flush()?;
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(cmd) => run(&cluster, cmd).await,
            Err(shell::ParseError::Empty) => {}
            Err(e) => println!("{}", e),
        }
    }
    Ok(())
}
