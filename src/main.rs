use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use flowbot::bot::run_log::RunLogger;
use flowbot::bot::{JobSpec, WorkflowOrchestrator};
use flowbot::cli::{Cli, Commands};
use flowbot::config::load_config;
use flowbot::registry::UserRegistry;
use flowbot::tools::session::serve_session;
use flowbot::tools::{JobDefaults, ToolCall, ToolContext, define_tools, dispatch_tool_call};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries reports and tool output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Tools = cli.command {
        return print_tools();
    }

    let config = load_config(&cli)?;
    tracing::info!(
        base_url = config.base_url.as_deref().unwrap_or("<unset>"),
        max_attempts = config.max_poll_attempts,
        interval_secs = config.poll_interval_secs,
        "Config loaded"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let mut orchestrator = None;
    let mut log_task = None;
    if config.base_url.is_some() {
        let mut built = WorkflowOrchestrator::from_config(&config)?;
        if let Some(dir) = &config.run_log_dir {
            let logger = RunLogger::new(dir)
                .with_context(|| format!("Failed to open run log in {}", dir.display()))?;
            tracing::info!(path = %logger.log_path().display(), "Run log opened");
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            built = built.with_events(tx);
            log_task = Some(tokio::spawn(logger.drain(rx)));
        }
        orchestrator = Some(Arc::new(built));
    } else {
        tracing::info!("No remote base URL configured; run_workflow is unavailable");
    }

    let ctx = ToolContext {
        registry: UserRegistry::in_memory(),
        orchestrator,
        job_defaults: JobDefaults::from_config(&config),
        cancel,
    };

    let result = run_command(&cli.command, &ctx).await;

    // Dropping the context drops the event sender, which ends the drain task.
    drop(ctx);
    if let Some(task) = log_task {
        if let Err(e) = task.await {
            tracing::warn!("Run log task ended abnormally: {e}");
        }
    }

    result
}

async fn run_command(command: &Commands, ctx: &ToolContext) -> anyhow::Result<()> {
    match command {
        Commands::Run { .. } => {
            let orchestrator = ctx
                .orchestrator
                .as_ref()
                .context("No remote API: pass --base-url or set FLOWBOT_BASE_URL")?;
            let bot_id = ctx
                .job_defaults
                .bot_id
                .clone()
                .context("No bot to run: pass --bot-id or set FLOWBOT_BOT_ID")?;
            let payload = ctx
                .job_defaults
                .payload
                .clone()
                .context("No payload: pass --payload or set FLOWBOT_PAYLOAD")?;

            let spec = JobSpec::new(bot_id, payload);
            let report = orchestrator.run_workflow(&spec, &ctx.cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Tool { name, args } => {
            let arguments = serde_json::from_str(args)
                .with_context(|| format!("--args is not valid JSON: {args}"))?;
            let output = dispatch_tool_call(&ToolCall::new(name.as_str(), arguments), ctx).await;
            println!("{output}");
        }
        Commands::Session => {
            let answered =
                serve_session(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), ctx).await?;
            tracing::info!(answered, "Session finished");
        }
        Commands::Tools => print_tools()?,
    }

    Ok(())
}

fn print_tools() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&define_tools())?);
    Ok(())
}
