mod cli;

use std::process::ExitCode;

use clap::Parser;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use aphrodite::context::parse_badge_types;
use aphrodite::AppContext;
use cli::{Cli, Commands};

use aph_core::config::AppConfig;
use aph_core::events::ProgressKind;
use aph_core::{BadgeMask, Error, ErrorKind, ItemId, JobId, JobStatus};

// Exit codes for the thin CLI.
const EXIT_OK: u8 = 0;
const EXIT_UNEXPECTED: u8 = 1;
const EXIT_CONFIG: u8 = 3;
const EXIT_UPSTREAM: u8 = 4;
const EXIT_PARTIAL: u8 = 5;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "aphrodite=debug,aph_engine=debug,aph_catalog=debug,aph_enrich=debug".to_string()
        } else {
            "aphrodite=info,aph_engine=info".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .init();

    if let Commands::Version = cli.command {
        println!("aphrodite {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::from(EXIT_OK);
    }

    // An explicitly named config file must load; only an unnamed one
    // falls back to defaults.
    let config = match cli.config.as_deref() {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(EXIT_CONFIG);
            }
        },
        None => AppConfig::default(),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::from(EXIT_UNEXPECTED);
        }
    };

    let code = runtime.block_on(async {
        match run(config, cli.command).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {e}");
                exit_code_for(&e)
            }
        }
    });
    ExitCode::from(code)
}

/// Map an error to the documented exit codes.
fn exit_code_for(err: &Error) -> u8 {
    match err.kind() {
        ErrorKind::ConfigMissing | ErrorKind::ConfigInvalid => EXIT_CONFIG,
        ErrorKind::CatalogUnreachable | ErrorKind::CatalogUnauthorized => EXIT_UPSTREAM,
        _ => EXIT_UNEXPECTED,
    }
}

async fn run(config: AppConfig, command: Commands) -> aph_core::Result<u8> {
    let ctx = AppContext::init(config)?;

    match command {
        Commands::Badge { item_id, badges } => {
            let mask = mask_from(&badges)?;
            let job_id =
                ctx.engine
                    .submit_single(ItemId::new(item_id), mask, serde_json::json!({}))?;
            wait_for_job(&ctx, job_id).await
        }

        Commands::Batch { library_id, badges } => {
            let mask = mask_from(&badges)?;
            let mut item_ids = Vec::new();
            let mut cursor = Some(0u32);
            while let Some(start_index) = cursor {
                let page = ctx.catalog.list_items_page(&library_id, start_index).await?;
                cursor = page.next_cursor();
                item_ids.extend(page.items.iter().map(|i| i.item_id()));
            }
            println!("submitting batch over {} items", item_ids.len());
            let job_id = ctx
                .engine
                .submit_batch(item_ids, mask, serde_json::json!({}))?;
            wait_for_job(&ctx, job_id).await
        }

        Commands::Sources { item_id } => {
            let candidates = ctx.posters.fetch_sources(&ItemId::new(item_id)).await?;
            for candidate in &candidates {
                match (candidate.width, candidate.height) {
                    (Some(w), Some(h)) => println!("{w}x{h}  {}", candidate.url),
                    _ => println!("{}", candidate.url),
                }
            }
            println!("{} candidates", candidates.len());
            Ok(EXIT_OK)
        }

        Commands::Replace { item_id, url } => {
            let job_id = ctx
                .posters
                .replace(&ItemId::new(item_id), &url, BadgeMask::all())
                .await?;
            wait_for_job(&ctx, job_id).await
        }

        Commands::Revert { item_id } => {
            ctx.engine.revert_now(&ItemId::new(item_id)).await?;
            println!("reverted");
            Ok(EXIT_OK)
        }

        Commands::RestoreAll => {
            let results = ctx.engine.restore_all().await?;
            let mut failures = 0usize;
            for (item_id, outcome) in &results {
                match outcome {
                    Ok(()) => println!("{item_id}: restored"),
                    Err(e) => {
                        failures += 1;
                        println!("{item_id}: failed ({e})");
                    }
                }
            }
            println!("{} restored, {failures} failed", results.len() - failures);
            Ok(if failures == 0 { EXIT_OK } else { EXIT_PARTIAL })
        }

        Commands::Jobs { limit } => {
            for job in ctx.engine.list_jobs(None, limit)? {
                println!(
                    "{} {} {} {}/{} ({} failed, {} skipped)",
                    job.id,
                    job.job_type,
                    job.status,
                    job.progress.done,
                    job.progress.total,
                    job.progress.failed,
                    job.progress.skipped,
                );
            }
            Ok(EXIT_OK)
        }

        Commands::Cancel { job_id } => {
            let job_id: JobId = job_id
                .parse()
                .map_err(|_| Error::ConfigInvalid("bad job id".into()))?;
            let acknowledged = ctx.engine.cancel(job_id)?;
            println!(
                "{}",
                if acknowledged {
                    "cancellation acknowledged"
                } else {
                    "job not running"
                }
            );
            Ok(EXIT_OK)
        }

        Commands::ConfigGet { category } => {
            for (key, value) in ctx.settings.category(&category)? {
                println!("{key} = {}", value.encode());
            }
            Ok(EXIT_OK)
        }

        Commands::SetKey { service, key } => {
            ctx.settings.set_api_key(&service, &key)?;
            println!("stored key for {service}");
            Ok(EXIT_OK)
        }

        Commands::Health => match ctx.catalog.health().await {
            Ok(()) => {
                println!("catalog reachable");
                Ok(EXIT_OK)
            }
            Err(e) => Err(e),
        },

        Commands::Version => unreachable!("handled before runtime start"),
    }
}

fn mask_from(names: &[String]) -> aph_core::Result<BadgeMask> {
    if names.is_empty() {
        Ok(BadgeMask::all())
    } else {
        Ok(BadgeMask::of(parse_badge_types(names)?))
    }
}

/// Follow a job's progress to its terminal status and map it to an exit
/// code (5 for partial batches).
async fn wait_for_job(ctx: &AppContext, job_id: JobId) -> aph_core::Result<u8> {
    let mut stream = ctx.engine.stream_progress(job_id);
    while let Some(event) = stream.next().await {
        match event.kind {
            ProgressKind::ItemStarted { item_id } => {
                tracing::info!(item = %item_id, "processing");
            }
            ProgressKind::ItemFinished {
                item_id,
                status,
                error_kind,
            } => match error_kind {
                Some(kind) => println!("{item_id}: {status} ({kind})"),
                None => println!("{item_id}: {status}"),
            },
            ProgressKind::JobStatus { status } if status.is_terminal() => {
                let job = ctx.engine.get_job(job_id)?;
                println!(
                    "job {job_id} {status}: {}",
                    job.result_summary.as_deref().unwrap_or("")
                );
                return Ok(match status {
                    JobStatus::Succeeded => EXIT_OK,
                    JobStatus::Partial => EXIT_PARTIAL,
                    _ => EXIT_UNEXPECTED,
                });
            }
            ProgressKind::JobStatus { .. } => {}
        }
    }
    Ok(EXIT_UNEXPECTED)
}
