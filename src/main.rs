use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use task_assistant::client::{run_submission, Report, Submission, TaskManagerClient};
use task_assistant::supervisor::Supervisor;
use task_assistant::{config::Config, create_router, utils::init_logger, Service};

const POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "task-assistant", version, about = "Multi-agent task system")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one service.
    Serve {
        #[arg(value_enum)]
        service: Service,
        /// Defaults to PORT, then the service's own port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate a topic, start a task and wait for its result.
    Submit {
        #[command(subcommand)]
        task: SubmitTask,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 600, global = true)]
        max_wait: u64,
    },
}

#[derive(Subcommand)]
enum SubmitTask {
    Article {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        style: Option<String>,
        /// Download and print the saved draft.
        #[arg(long)]
        fetch_content: bool,
    },
    Research {
        #[arg(long)]
        topic: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve { service, port } => serve(service, port, &config).await,
        Command::Submit { task, max_wait } => submit(task, Duration::from_secs(max_wait), &config).await,
    }
}

async fn serve(service: Service, port: Option<u16>, config: &Config) -> anyhow::Result<()> {
    let app = create_router(service, config).await?;

    let port = port.or(config.server.port).unwrap_or_else(|| service.default_port());
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}:{}: {}", config.server.host, port, e))?;
    info!(service = service.name(), %addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn submit(task: SubmitTask, max_wait: Duration, config: &Config) -> anyhow::Result<()> {
    let (submission, fetch_content) = match task {
        SubmitTask::Article { topic, style, fetch_content } => (Submission::Article { topic, style }, fetch_content),
        SubmitTask::Research { topic } => (Submission::Research { topic }, false),
    };

    let supervisor = Supervisor::from_config(config)?;
    let client = TaskManagerClient::new(config.endpoints.task_manager_url.clone());

    let (task_id, report) = run_submission(&client, &supervisor, &submission, POLL_INTERVAL, max_wait).await?;
    if let Some(task_id) = task_id {
        println!("Task ID: {}", task_id);
    }
    println!("{}", report);

    if let (true, Report::ArticleSaved { url }) = (fetch_content, &report) {
        match client.fetch_content(url).await {
            Ok(content) => println!("\n{}", content),
            Err(e) => println!("Could not fetch article content: {}", e.detail()),
        }
    }

    if report.is_failure() {
        anyhow::bail!("Submission did not succeed");
    }
    Ok(())
}
