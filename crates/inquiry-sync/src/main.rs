//! `inquiry-sim`: drive local sync sessions and inspect stored snapshots

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use inquiry_model::{codec, Author, CardDraft, NodeId, NodeKind, Position, ProjectId};
use inquiry_sync::{
    FileGateway, LocalHub, MemoryGateway, PersistenceGateway, ScrapbookWriter, SessionIdentity,
    StateStore, SyncConfig, SyncCoordinator, SyncStats,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Command::new("inquiry-sim")
        .version(inquiry_sync::VERSION)
        .about("Inquiry Space sync simulator")
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run several canvas sessions on one project and check convergence")
                .arg(
                    Arg::new("sessions")
                        .long("sessions")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Number of concurrent canvas sessions"),
                )
                .arg(
                    Arg::new("edits")
                        .long("edits")
                        .default_value("12")
                        .value_parser(value_parser!(usize))
                        .help("Number of scripted edits, spread across sessions"),
                )
                .arg(
                    Arg::new("project")
                        .long("project")
                        .default_value("simulation")
                        .help("Project id"),
                )
                .arg(
                    Arg::new("store-dir")
                        .long("store-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Persist snapshots under this directory instead of memory"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML sync configuration"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Decode a stored project snapshot")
                .arg(
                    Arg::new("store-dir")
                        .long("store-dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot directory"),
                )
                .arg(
                    Arg::new("project")
                        .long("project")
                        .required(true)
                        .help("Project id"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the decoded snapshot"),
                ),
        );

    let matches = cli.get_matches();
    match matches.subcommand() {
        Some(("simulate", args)) => {
            let report = simulate(args).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
            if !report.converged {
                std::process::exit(1);
            }
        }
        Some(("inspect", args)) => inspect(args).await?,
        _ => unreachable!("subcommand required"),
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    project: String,
    sessions: usize,
    edits: usize,
    converged: bool,
    nodes: usize,
    edges: usize,
    cards: usize,
    broadcasts: usize,
    stats: Vec<SyncStats>,
}

impl SimulationReport {
    fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Simulation Report:\n");
        out.push_str(&format!("  Project: {}\n", self.project));
        out.push_str(&format!("  Sessions: {}\n", self.sessions));
        out.push_str(&format!("  Edits: {}\n", self.edits));
        out.push_str(&format!(
            "  Contents: {} nodes, {} edges, {} cards\n",
            self.nodes, self.edges, self.cards
        ));
        out.push_str(&format!("  Broadcasts: {}\n", self.broadcasts));
        for (i, stats) in self.stats.iter().enumerate() {
            out.push_str(&format!(
                "  Session {i}: sent={} applied={} echoes={} saves={} save_failures={}\n",
                stats.broadcasts_sent,
                stats.remote_applied,
                stats.echoes_suppressed,
                stats.saves_completed,
                stats.save_failures
            ));
        }
        out.push_str(&format!(
            "  Status: {}\n",
            if self.converged { "CONVERGED" } else { "DIVERGED" }
        ));
        out
    }
}

async fn simulate(args: &ArgMatches) -> anyhow::Result<SimulationReport> {
    let sessions = args.get_one::<usize>("sessions").copied().unwrap_or(3);
    let edits = args.get_one::<usize>("edits").copied().unwrap_or(12);
    if sessions == 0 {
        bail!("--sessions must be at least 1");
    }
    let project = ProjectId::new(
        args.get_one::<String>("project")
            .map_or("simulation", String::as_str),
    );

    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SyncConfig::default(),
    };
    let gateway: Arc<dyn PersistenceGateway> = match args.get_one::<PathBuf>("store-dir") {
        Some(dir) => Arc::new(FileGateway::new(dir)),
        None => Arc::new(MemoryGateway::new()),
    };
    // Echoing hub so every session exercises echo suppression.
    let hub = LocalHub::reflecting();
    let pause = config.broadcast_throttle() + config.remote_settle() + Duration::from_millis(50);

    let mut coordinators = Vec::with_capacity(sessions);
    for i in 0..sessions {
        let coordinator = SyncCoordinator::new(
            StateStore::new(),
            Arc::clone(&gateway),
            Arc::new(hub.connect()),
            SessionIdentity::for_author(Author::new(format!("user-{i}"), format!("Researcher {i}"))),
            config.clone(),
        );
        coordinator.start(project.clone()).await?;
        coordinators.push(coordinator);
    }
    tokio::time::sleep(pause).await;

    let mut placed: Vec<NodeId> = Vec::new();
    for step in 0..edits {
        let coordinator = &coordinators[step % sessions];
        // Nodes may have been replaced by a concurrent remote state.
        placed.retain(|id| coordinator.store().snapshot().node(id).is_some());
        let offset = f64::from(u32::try_from(step)?) * 40.0;

        match step % 4 {
            0 => {
                let id = coordinator.create_node(
                    NodeKind::Claim,
                    Position::new(offset, 0.0),
                    format!("Claim {step}"),
                )?;
                placed.push(id);
            }
            1 => {
                let card = coordinator.add_card(CardDraft::new(format!("Source note {step}")))?;
                let id =
                    coordinator.convert_card_to_node(&card.id, Position::new(offset, 120.0), NodeKind::Evidence)?;
                placed.push(id);
            }
            2 => match placed.as_slice() {
                [.., source, target] => {
                    let edge = coordinator.connect(source, target)?;
                    coordinator.toggle_relation(&edge)?;
                }
                _ => {
                    coordinator.add_card(CardDraft::new(format!("Loose note {step}")))?;
                }
            },
            _ => {
                if let Some(id) = placed.last() {
                    coordinator.move_node(id, Position::new(offset, 60.0))?;
                    coordinator.release_node(id, Position::new(offset, 80.0))?;
                }
            }
        }
        tokio::time::sleep(pause).await;
    }

    let writer = ScrapbookWriter::new(
        Arc::clone(&gateway),
        Arc::new(hub.connect()),
        Author::new("clipper", "Web Clipper"),
    );
    writer
        .add_material(
            &project,
            CardDraft::new("Clipped quote").with_source("https://example.org/tides", "Tides"),
        )
        .await?;
    tokio::time::sleep(pause).await;

    let reference = coordinators[0].store().snapshot().durable();
    let converged = coordinators
        .iter()
        .all(|c| c.store().snapshot().durable() == reference);
    let counts = reference.counts();

    for coordinator in &coordinators {
        coordinator.teardown().await;
    }

    Ok(SimulationReport {
        project: project.to_string(),
        sessions,
        edits,
        converged,
        nodes: counts.nodes,
        edges: counts.edges,
        cards: counts.cards,
        broadcasts: hub.sent_operations().len(),
        stats: coordinators.iter().map(SyncCoordinator::stats).collect(),
    })
}

async fn inspect(args: &ArgMatches) -> anyhow::Result<()> {
    let Some(dir) = args.get_one::<PathBuf>("store-dir") else {
        bail!("--store-dir is required");
    };
    let Some(project) = args.get_one::<String>("project") else {
        bail!("--project is required");
    };
    let project = ProjectId::new(project.as_str());

    let gateway = FileGateway::new(dir);
    let Some(blob) = gateway.fetch_snapshot(&project).await? else {
        bail!("no snapshot stored for project {project}");
    };
    let snapshot = codec::decode(&blob).context("decoding stored snapshot")?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("Project: {project}");
        println!("Encoded: {} bytes", blob.len());
        println!("Contents: {}", snapshot.counts());
    }
    Ok(())
}
