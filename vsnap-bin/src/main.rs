use chrono::Utc;
use clap::Parser;
use color_eyre::eyre;
use tracing::info;
use vsnap_lib::cleanup::run_cleanup;
use vsnap_lib::config::{load_env_file, resolve_from_env};
use vsnap_lib::connector::VsphereConnector;
use vsnap_lib::lister::run_list;
use vsnap_lib::logging;

mod cli;

use cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    let cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        load_env_file(path)?;
    }
    logging::init(&cli.log_config())?;

    let credentials = resolve_from_env(cli.max_endpoints).require_any()?;
    info!("Found {} vCenter endpoint(s)", credentials.len());

    let connector = VsphereConnector::new(cli.connect_options());
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Commands::List => {
            run_list(&connector, &credentials, cli.format.into(), &mut stdout).await?;
        }
        Commands::Cleanup(args) => {
            let options = args.options(cli.format)?;
            let mut stdin = std::io::stdin().lock();
            run_cleanup(
                &connector,
                &credentials,
                &options,
                Utc::now(),
                &mut stdin,
                &mut stdout,
            )
            .await?;
        }
    }

    Ok(())
}
