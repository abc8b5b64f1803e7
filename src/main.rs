use ladder::cli::{Cli, Command};
use ladder::config::Settings;
use ladder::scheduler::{JobProcess, Scheduler};
use ladder::service::{Ladder, Reply};

use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    // RUST_LOG directives win over the configured trace level.
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(settings.get_trace_level()).into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");

    let ladder = match (Ladder::from_settings(&settings).await, &cli.command) {
        (Ok(ladder), _) => ladder,
        (Err(e), Command::Watch) => return Err(e.into()),
        (Err(e), _) => return print_json(&Reply::<()>::from(Err(e))).map_err(Into::into),
    };

    match cli.command {
        Command::Ranking => print_json(&ladder.ranking().await)?,
        Command::Player { name, tag } => print_json(&ladder.player_insights(&name, &tag).await)?,
        Command::Watch => {
            let mut sched = Scheduler::new(Arc::new(ladder)).await?;

            let jobs = vec![
                JobProcess::WarmIdentities, // only ran once, at startup.
                JobProcess::RefreshRanking(&settings.refresh_schedule),
            ];
            for job in jobs {
                sched.add_job(job).await?;
            }

            info!("Starting scheduler.");
            sched.start().await?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down scheduler.");
            sched.shutdown().await?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(reply: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(reply)?);
    Ok(())
}
