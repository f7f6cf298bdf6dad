mod blocks;

use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tessera_credit::NoopCostModel;
use tessera_executor::StaticCredentialStore;
use tessera_lock::InProcessLock;
use tessera_manager::{AddExecutionRequest, ExecutionManager, ExecutionManagerConfig};
use tessera_notify::LoggingNotificationSink;
use tessera_store::{ExecutionUpdate, InMemoryDatabaseManager};

/// tessera - a two-tier graph execution engine
#[derive(Parser)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run one graph execution to completion and print its results
  Run {
    /// Path to a graph definition (JSON, §3 `Graph`)
    graph_file: PathBuf,

    /// The user the run is charged to
    #[arg(long, default_value = "local-user")]
    user: String,

    /// Starting credit balance for this run
    #[arg(long, default_value_t = 1_000_000)]
    credits: u64,

    /// Size of the node-worker pool for this run
    #[arg(long, env = "NUM_NODE_WORKERS", default_value_t = 4)]
    num_node_workers: usize,
  },

  /// Start the Execution Manager's HTTP/JSON RPC surface (§6)
  Serve {
    /// RPC listen port
    #[arg(long, env = "EXECUTION_MANAGER_PORT", default_value_t = 8080)]
    port: u16,

    /// Graph definitions (JSON) to preload into the store so they can be
    /// referenced by `graph_id` in `add_execution` requests. Graph
    /// authoring itself is out of scope for this engine (§1); this is the
    /// seeding hook the CLI uses in its place.
    #[arg(long = "graph")]
    graphs: Vec<PathBuf>,

    /// Size of the graph-worker pool
    #[arg(long, env = "NUM_GRAPH_WORKERS", default_value_t = 4)]
    num_graph_workers: usize,

    /// Size of the node-worker pool per graph worker
    #[arg(long, env = "NUM_NODE_WORKERS", default_value_t = 4)]
    num_node_workers: usize,

    /// Fallback base URL used to build billing links in notifications (§6)
    #[arg(long, env = "PLATFORM_BASE_URL", default_value = "https://platform.example.com")]
    platform_base_url: String,

    /// Preferred base URL for billing links, used over `platform_base_url`
    /// when set (§6)
    #[arg(long, env = "FRONTEND_BASE_URL")]
    frontend_base_url: Option<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match cli.command {
      Commands::Run {
        graph_file,
        user,
        credits,
        num_node_workers,
      } => run_once(graph_file, user, credits, num_node_workers).await,
      Commands::Serve {
        port,
        graphs,
        num_graph_workers,
        num_node_workers,
        platform_base_url,
        frontend_base_url,
      } => serve(port, graphs, num_graph_workers, num_node_workers, platform_base_url, frontend_base_url).await,
    }
  })
}

async fn run_once(graph_file: PathBuf, user: String, credits: u64, num_node_workers: usize) -> Result<()> {
  let graph_content = tokio::fs::read_to_string(&graph_file)
    .await
    .with_context(|| format!("failed to read graph file: {}", graph_file.display()))?;
  let graph: tessera_graph::Graph = serde_json::from_str(&graph_content)
    .with_context(|| format!("failed to parse graph file: {}", graph_file.display()))?;

  let store = Arc::new(InMemoryDatabaseManager::new());
  store.register_graph(graph.clone()).await;
  store.set_balance(&user, credits).await;

  let manager = ExecutionManager::new(
    store.clone(),
    Arc::new(InProcessLock::new()),
    blocks::demo_catalog(),
    Arc::new(StaticCredentialStore::new(HashMap::new())),
    Arc::new(NoopCostModel),
    Arc::new(LoggingNotificationSink),
    ExecutionManagerConfig {
      num_graph_workers: 1,
      num_node_workers,
      frontend_base_url: None,
      platform_base_url: "https://platform.example.com".to_string(),
    },
  );

  let mut updates = store.subscribe();
  let data = read_payload_from_stdin()?;

  let entry = manager
    .add_execution(AddExecutionRequest {
      graph_id: graph.graph_id.clone(),
      graph_version: Some(graph.version),
      user_id: user,
      preset_id: None,
      data,
    })
    .await
    .context("add_execution failed")?;

  eprintln!("Started execution {}", entry.graph_exec_id);

  loop {
    match updates.recv().await {
      Ok(ExecutionUpdate::Graph(exec)) if exec.graph_exec_id == entry.graph_exec_id && exec.status.is_terminal() => {
        eprintln!("Execution finished: {:?}", exec.status);
        eprintln!("Stats: {}", serde_json::to_string_pretty(&exec.stats)?);
        break;
      }
      Ok(_) => continue,
      Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
      Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
    }
  }

  let node_execs = store.list_node_executions(&entry.graph_exec_id, None).await?;
  let outputs: serde_json::Map<String, serde_json::Value> = node_execs
    .into_iter()
    .map(|ne| (ne.node_id, serde_json::to_value(ne.output_data).unwrap_or(serde_json::Value::Null)))
    .collect();
  println!("{}", serde_json::to_string_pretty(&outputs)?);

  Ok(())
}

async fn serve(
  port: u16,
  graphs: Vec<PathBuf>,
  num_graph_workers: usize,
  num_node_workers: usize,
  platform_base_url: String,
  frontend_base_url: Option<String>,
) -> Result<()> {
  let store = Arc::new(InMemoryDatabaseManager::new());
  for path in graphs {
    let content = tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read graph file: {}", path.display()))?;
    let graph: tessera_graph::Graph =
      serde_json::from_str(&content).with_context(|| format!("failed to parse graph file: {}", path.display()))?;
    tracing::info!(graph_id = %graph.graph_id, path = %path.display(), "preloaded graph");
    store.register_graph(graph).await;
  }

  let manager = ExecutionManager::new(
    store,
    Arc::new(InProcessLock::new()),
    blocks::demo_catalog(),
    Arc::new(StaticCredentialStore::new(HashMap::new())),
    Arc::new(NoopCostModel),
    Arc::new(LoggingNotificationSink),
    ExecutionManagerConfig {
      num_graph_workers,
      num_node_workers,
      frontend_base_url,
      platform_base_url,
    },
  );

  let app = tessera_rpc::router(tessera_rpc::AppState { manager });
  let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
    .await
    .with_context(|| format!("failed to bind execution_manager_port {port}"))?;
  tracing::info!(port, "execution manager listening");
  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

fn read_payload_from_stdin() -> Result<HashMap<String, serde_json::Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(HashMap::new());
  }
  let mut input = String::new();
  io::stdin().read_to_string(&mut input).context("failed to read payload from stdin")?;
  if input.trim().is_empty() {
    return Ok(HashMap::new());
  }
  serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
}
