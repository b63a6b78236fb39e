use anyhow::{Context, Result};
use autoflow::cli::{Args, ConfigDiscovery, ExecutionMode, RunConfig, ValidateConfig};
use autoflow::env::DEFAULT_LOG_FILTER;
use autoflow::script::load_script;
use autoflow::{AutoflowConfig, ScriptManager, ScriptRunError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    match mode {
        ExecutionMode::Run(config) => run_script(config).await,
        ExecutionMode::Validate(config) => {
            init_logging(None, false);
            validate_script(config).await
        }
        ExecutionMode::ShowConfig => {
            init_logging(None, false);
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
    }
}

/// `RUST_LOG` wins, then the config's `log_filter`, then the built-in default
fn init_logging(config_filter: Option<&str>, verbose: bool) {
    let fallback = match (config_filter, verbose) {
        (_, true) => "autoflow=debug",
        (Some(filter), false) => filter,
        (None, false) => DEFAULT_LOG_FILTER,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_script(config: RunConfig) -> Result<()> {
    let autoflow_config: AutoflowConfig = ConfigDiscovery::load(config.config_override.as_deref())?;
    init_logging(autoflow_config.log_filter.as_deref(), config.verbose);
    info!("Starting autoflow");

    if config.dry_run {
        let script = load_script(&config.script)
            .await
            .with_context(|| format!("Failed to load {}", config.script.display()))?;
        let tasks = script.to_tasks();
        println!("🔍 Dry run: {} task(s) would be submitted", tasks.len());
        for task in &tasks {
            print!("{}", task.outline());
        }
        return Ok(());
    }

    let manager = ScriptManager::with_host(autoflow_config);
    let result = tokio::select! {
        result = manager.load_and_execute(&config.script) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling running tasks");
            manager.cancel_all().await;
            manager.shutdown().await;
            std::process::exit(130);
        }
    };
    manager.shutdown().await;

    match result {
        Ok(report) => {
            println!(
                "✅ {} task(s) completed in {:.1}s",
                report.completed,
                report.duration.as_secs_f64()
            );
            Ok(())
        }
        Err(ScriptRunError::Failed(report)) => {
            for (task_id, reason) in report.failed.iter().chain(report.rejected.iter()) {
                error!("{}: {}", task_id, reason);
            }
            println!(
                "❌ {} of {} task(s) did not complete",
                report.unsuccessful(),
                report.submitted
            );
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

async fn validate_script(config: ValidateConfig) -> Result<()> {
    let script = load_script(&config.script)
        .await
        .with_context(|| format!("Failed to load {}", config.script.display()))?;
    let tasks = script.to_tasks();

    println!(
        "✓ {} is valid: {} group(s), {} step(s), {} top-level task(s)",
        config.script.display(),
        script.tasks.len(),
        script.step_count(),
        tasks.len()
    );

    if config.verbose {
        for group in &script.tasks {
            println!(
                "  group '{}': enabled={}, repeat={}, interval={}ms, condition={}",
                group.name,
                group.enabled,
                group.repeat,
                group.interval,
                group.condition.as_deref().unwrap_or("-")
            );
        }
    }

    println!();
    for task in &tasks {
        print!("{}", task.outline());
    }
    Ok(())
}
