use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tether",
    about = "Tether node: observe DID anchors and inspect anchored content",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Node configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the anchor observer until interrupted
    Observe(ObserveArgs),
    /// Fetch content by address
    Resolve(ResolveArgs),
    /// Look up a link in a peer's directory document
    Link(LinkArgs),
    /// Show the anchor history of one identifier
    History(HistoryArgs),
    /// Write a file into the local content store
    Put(PutArgs),
    /// List the references in a peer's service or collection document
    References(ReferencesArgs),
}

#[derive(Args)]
pub struct ObserveArgs {
    /// Anchor addresses to announce once the observer is running
    #[arg(long = "anchor")]
    pub anchors: Vec<String>,
    /// `<address>:<suffix>` DID events to announce once the observer is running
    #[arg(long = "did")]
    pub dids: Vec<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub address: String,
    /// Where to look if the address is not held locally
    #[arg(long)]
    pub hint: Option<String>,
}

#[derive(Args)]
pub struct LinkArgs {
    /// Peer, e.g. `https://node1.example.com` or `ipns://name`
    pub peer: String,
    /// Link type, e.g. `application/cas+json`
    pub link_type: String,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub address: String,
    pub suffix: String,
    #[arg(long)]
    pub hint: Option<String>,
}

#[derive(Args)]
pub struct PutArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ReferencesArgs {
    /// Collection, collection page or service URL
    pub url: String,
    /// Stop after this many references
    #[arg(long)]
    pub limit: Option<usize>,
}
