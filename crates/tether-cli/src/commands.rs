use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use tracing::warn;

use tether_index::LogDidAnchorIndex;
use tether_observer::{Observer, Providers, TransactionProcessor};
use tether_pubsub::{MemPubSub, PubSub, ORIGINAL_TOPIC_KEY, UNDELIVERABLE_TOPIC};
use tether_types::{AnchorInfo, ContentAddress, DidEvent, DiscoveryHint, NoopMetrics};

use crate::cli::*;
use crate::config::NodeConfig;
use crate::node::{list_references, protocol_provider, LoggingProcessor, Node};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = NodeConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Command::Observe(args) => cmd_observe(config, args).await,
        Command::Resolve(args) => cmd_resolve(config, args).await,
        Command::Link(args) => cmd_link(config, args).await,
        Command::History(args) => cmd_history(config, args, cli.format).await,
        Command::Put(args) => cmd_put(config, args, cli.format),
        Command::References(args) => cmd_references(config, args, cli.format).await,
    }
}

fn parse_hint(hint: Option<&str>) -> anyhow::Result<Option<DiscoveryHint>> {
    Ok(hint.map(DiscoveryHint::parse).transpose()?)
}

async fn cmd_observe(config: NodeConfig, args: ObserveArgs) -> anyhow::Result<()> {
    let node = Node::open(&config)?;
    let index = Arc::new(LogDidAnchorIndex::open(&config.index_path, config.index.clone())?);
    let pubsub = MemPubSub::new(config.pubsub.clone());

    let mut undeliverable = pubsub.subscribe(UNDELIVERABLE_TOPIC).await?;
    let dead_letters = tokio::spawn(async move {
        while let Some(msg) = undeliverable.recv().await {
            warn!(
                id = %msg.id,
                original_topic = msg.metadata.get(ORIGINAL_TOPIC_KEY).map(String::as_str).unwrap_or("unknown"),
                payload = %String::from_utf8_lossy(&msg.payload),
                "event undeliverable"
            );
            msg.ack();
        }
    });

    let processor: Arc<dyn TransactionProcessor> = Arc::new(LoggingProcessor);
    let observer = Observer::new(
        config.observer.clone(),
        Providers {
            pubsub: Arc::new(pubsub.clone()),
            graph: Arc::clone(&node.graph),
            index,
            protocols: Arc::new(protocol_provider(&config, processor)),
            metrics: Arc::new(NoopMetrics),
        },
    )
    .await?;
    observer.start();
    println!(
        "{} Observing anchors (index: {})",
        "✓".green().bold(),
        config.index_path.display()
    );

    for anchor in &args.anchors {
        let info = AnchorInfo::new(ContentAddress::parse(anchor)?);
        observer.publisher().publish_anchor(&info).await?;
    }
    for did in &args.dids {
        observer.publisher().publish_did(&DidEvent::parse(did)?).await?;
    }

    tokio::signal::ctrl_c().await?;
    println!("Shutting down...");
    observer.stop().await;
    pubsub.close().await?;
    dead_letters.abort();
    Ok(())
}

async fn cmd_resolve(config: NodeConfig, args: ResolveArgs) -> anyhow::Result<()> {
    let node = Node::open(&config)?;
    let address = ContentAddress::parse(&args.address)?;
    let hint = parse_hint(args.hint.as_deref())?;
    let (bytes, source) = node
        .resolver
        .resolve_with_source(&address, hint.as_ref())
        .await?;
    eprintln!(
        "{} {} bytes from {}",
        "✓".green(),
        bytes.len(),
        source.as_str().cyan()
    );
    std::io::stdout().write_all(&bytes)?;
    Ok(())
}

async fn cmd_link(config: NodeConfig, args: LinkArgs) -> anyhow::Result<()> {
    let node = Node::open(&config)?;
    let href = node.directory.resolve_link(&args.peer, &args.link_type).await?;
    println!("{href}");
    Ok(())
}

async fn cmd_history(config: NodeConfig, args: HistoryArgs, format: OutputFormat) -> anyhow::Result<()> {
    let node = Node::open(&config)?;
    let address = ContentAddress::parse(&args.address)?;
    let hint = parse_hint(args.hint.as_deref())?;
    let anchors = node
        .graph
        .get_did_anchors(&address, &args.suffix, hint.as_ref())
        .await?;

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = anchors
                .iter()
                .map(|anchor| {
                    let payload = anchor.credential.payload();
                    serde_json::json!({
                        "address": anchor.address,
                        "issuer": anchor.credential.issuer,
                        "namespace": payload.namespace,
                        "version": payload.version,
                        "coreIndex": payload.core_index,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            println!("History of {} ({} anchors)", args.suffix.bold(), anchors.len());
            for (i, anchor) in anchors.iter().enumerate() {
                let payload = anchor.credential.payload();
                println!(
                    "{:>4}  {}  {} v{}  {}",
                    i + 1,
                    anchor.address.as_str().yellow(),
                    payload.namespace,
                    payload.version,
                    payload.core_index.dimmed()
                );
            }
        }
    }
    Ok(())
}

fn cmd_put(config: NodeConfig, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let data = std::fs::read(&args.file)?;
    let node = Node::open(&config)?;
    let address = node.resolver.write(&data)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "address": address, "bytes": data.len() })
        ),
        OutputFormat::Text => println!("{} {}", "✓".green().bold(), address.as_str().yellow()),
    }
    Ok(())
}

async fn cmd_references(config: NodeConfig, args: ReferencesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let node = Node::open(&config)?;
    let (total, references) = list_references(node.http, &args.url, args.limit).await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "totalItems": total,
                "references": references,
            }))?
        ),
        OutputFormat::Text => {
            match total {
                Some(total) => println!("{} references ({} advertised)", references.len(), total),
                None => println!("{} references", references.len()),
            }
            for reference in &references {
                println!("  {}", reference.cyan());
            }
        }
    }
    Ok(())
}
