//! # Svcscope CLI Entry Point
//!
//! The main executable for the svcscope tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs the log subscriber.
//! 2. **Resolution**: Builds the metadata resolver matching the source (reflection or `.proto` files).
//! 3. **Registration**: Registers the resolved and additional files into the process-wide type registry.
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.
mod cli;
mod formatter;

use anyhow::{Context, anyhow};
use clap::Parser;
use cli::{Cli, Commands};
use formatter::{FileList, FormattedString, GenericError, ServiceList};
use std::process;
use svcscope_core::config::SourceConfig;
use svcscope_core::connection::ChannelFactory;
use svcscope_core::descriptor::FileDescriptor;
use svcscope_core::metadata::{
    ProtoServiceMeta, ReflectionServiceMeta, ServiceMetaData, ServiceMetaList,
};
use svcscope_core::registry::{TypeRegistry, register_files};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args).await {
        eprintln!("{}", FormattedString::from(GenericError("Error", format!("{err:#}"))));
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let (services, additional) = match args.source()? {
        SourceConfig::Reflection(config) => {
            resolve(&ReflectionServiceMeta::new(ChannelFactory::new(), config)).await?
        }
        SourceConfig::Proto(config) => resolve(&ProtoServiceMeta::new(config)).await?,
    };

    let registry = TypeRegistry::global();
    let mut files = services.files();
    files.extend(additional);
    if let Err(err) = register_files(&registry, &files) {
        // Conflicting files are left out; everything else is still registered.
        warn!("{err}");
    }

    match args.command {
        Commands::List => {
            let names = services.iter().map(|meta| meta.name().to_string()).collect();
            println!("{}", FormattedString::from(ServiceList(names)));
        }
        Commands::Describe { service } => {
            let meta = services
                .get(&service)
                .ok_or_else(|| anyhow!("Service '{service}' not found"))?;
            println!("{}", FormattedString::from(meta));
        }
        Commands::Files => {
            let pool = registry.pool().context("Failed to read the type registry")?;
            let files = pool.files().map(FileDescriptor::from).collect();
            println!("{}", FormattedString::from(FileList(files)));
        }
    }

    Ok(())
}

async fn resolve<M: ServiceMetaData>(
    source: &M,
) -> anyhow::Result<(ServiceMetaList, Vec<FileDescriptor>)> {
    let services = source
        .service_meta_list()
        .await
        .context("Failed to resolve services")?;
    let additional = source
        .additional_files()
        .context("Failed to load additional proto files")?;

    Ok((services, additional))
}
