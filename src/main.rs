use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use firehose_orchestrator::cli::{
    diff_specs, format_diff, format_resource, load_firehose_manifest, load_spec, render_manifest,
    Cli, Commands,
};
use firehose_orchestrator::client::HttpStreamRegistry;
use firehose_orchestrator::config::load_settings;
use firehose_orchestrator::firehose::slugify;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified; settings overrides read the environment
    if let Some(ref env_file) = cli.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            process::exit(1);
        }
    };
    debug!(registry = %settings.stream_registry.base_url, "settings loaded");

    match cli.command {
        Commands::Render(args) => {
            let firehose = match load_firehose_manifest(&args.file) {
                Ok(f) => f,
                Err(e) => {
                    error!("Failed to load manifest {}: {}", args.file.display(), e);
                    process::exit(1);
                }
            };

            let registry = match HttpStreamRegistry::new(
                settings.stream_registry.base_url.clone(),
                Duration::from_secs(settings.stream_registry.timeout_secs),
            ) {
                Ok(r) => r,
                Err(e) => {
                    error!("Failed to create stream registry client: {}", e);
                    process::exit(1);
                }
            };

            let rendered = render_manifest(firehose, args.project.as_deref(), &settings, &registry)
                .await
                .and_then(|resource| format_resource(&resource, args.json));
            match rendered {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    error!("Failed to render {}: {}", args.file.display(), e);
                    process::exit(1);
                }
            }
        }
        Commands::Diff(args) => {
            let specs = load_spec(&args.old).and_then(|old| Ok((old, load_spec(&args.new)?)));
            match specs {
                Ok((old, new)) => print!("{}", format_diff(&diff_specs(&old, &new))),
                Err(e) => {
                    error!("Failed to load specs: {}", e);
                    process::exit(1);
                }
            }
        }
        Commands::Slug(args) => {
            println!("{}", slugify(&args.title));
        }
    }
}
