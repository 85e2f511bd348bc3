use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use stage_social_creator::config::AppConfig;
use stage_social_creator::db::{self, postgres::PgStatusStore, store::StatusStore};
use stage_social_creator::models::job::{Job, JobStatus};
use stage_social_creator::models::platform::Platform;
use stage_social_creator::naming;
use stage_social_creator::services::orchestrator;

#[derive(Parser)]
#[command(name = "social-creator", about = "Provision social profiles for a title")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create profiles for a title and run provisioning to completion.
    Create {
        #[arg(long)]
        title: String,

        /// Comma-separated platforms (fb, yt, ig). Defaults to all three.
        #[arg(long, value_delimiter = ',')]
        platforms: Option<Vec<Platform>>,

        /// Print the derived handles without creating anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the status of one job.
    Status { job_id: Uuid },

    /// List all jobs.
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Create {
            title,
            platforms,
            dry_run,
        } => {
            let identity = naming::derive_identity(&title, &config.brand_prefix)?;

            if dry_run {
                for platform in Platform::ALL {
                    println!(
                        "{platform}: {} ({})",
                        identity.handle_for(platform),
                        identity.url_for(platform)
                    );
                }
                return Ok(ExitCode::SUCCESS);
            }

            let requested: BTreeSet<Platform> = match platforms {
                None => Platform::ALL.into_iter().collect(),
                Some(list) if list.is_empty() => {
                    return Err("at least one platform required".into());
                }
                Some(list) => list.into_iter().collect(),
            };

            let db_pool = db::init_pool(&config.database_url).await?;
            db::run_migrations(&db_pool).await?;
            let store: Arc<dyn StatusStore> = Arc::new(PgStatusStore::new(db_pool));

            let orchestrator =
                orchestrator::build_orchestrator(&config, Arc::clone(&store))?;

            let job = store.create_job(&title, &identity, &requested).await?;
            println!("job {}", job.id);

            let status = orchestrator.run_job(job.id).await?;
            let job = store.get_job(job.id).await?;
            print_job(&job);

            Ok(match status {
                JobStatus::Succeeded => ExitCode::SUCCESS,
                JobStatus::Failed | JobStatus::InProgress => ExitCode::from(1),
            })
        }

        Command::Status { job_id } => {
            let db_pool = db::init_pool(&config.database_url).await?;
            let store = PgStatusStore::new(db_pool);
            let job = store.get_job(job_id).await?;
            print_job(&job);
            Ok(match job.overall_status() {
                JobStatus::Failed => ExitCode::from(1),
                _ => ExitCode::SUCCESS,
            })
        }

        Command::List => {
            let db_pool = db::init_pool(&config.database_url).await?;
            let store = PgStatusStore::new(db_pool);
            for job in store.list_jobs().await? {
                println!(
                    "{}  {:<12}  {}",
                    job.id,
                    job.overall_status().to_string(),
                    job.title
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_job(job: &Job) {
    println!("{} [{}] {}", job.id, job.overall_status(), job.title);
    for step in &job.steps {
        match (&step.handle, &step.error) {
            (Some(handle), _) => {
                let url = step.url.as_deref().unwrap_or("");
                println!("  {}: {} {} {}", step.platform, step.state, handle, url);
            }
            (None, Some(error)) => {
                println!("  {}: {} ({error})", step.platform, step.state);
            }
            (None, None) => {
                println!("  {}: {}", step.platform, step.state);
            }
        }
    }
}
