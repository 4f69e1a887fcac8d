//! # fetch-users
//!
//! Lists the first page of users from the configured API. Configuration comes
//! from `network.global.json` / `network.<RUNNING_MODE>.json` in the config
//! directory plus the `NETWORK_*` environment overrides (a `.env` file is
//! honored). When mock data is configured, or `--mock-dir` is given, requests
//! are answered from JSON fixtures instead of the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use colored::Colorize;
use futures_util::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lib_network::configs::{CertificateSource, FileCertificateStore, NetworkConfig};
use lib_network::imaging::ImageLoader;
use lib_network::retrieve::{ApiClient, NetworkMockData, NetworkService, NetworkServicesMock};
use lib_network::users::{User, UsersEndpoint, fetch_users};

/// CLI arguments for fetch-users.
#[derive(Parser)]
#[clap(
    name = "fetch-users",
    version = "1.0.0",
    author = "ckir",
    about = "Lists users from the configured API.",
    long_about = "Fetches the first page of users by reputation through the certificate-pinned client, \
                  or from local JSON fixtures, and optionally downloads every profile image."
)]
pub struct Cli {
    /// Directory holding the network configuration files.
    #[clap(long, value_hint = ValueHint::DirPath, default_value = ".", env = "CONFIGS_LOCATION")]
    pub config_dir: PathBuf,

    /// Directory of JSON fixtures; `users.json` answers the users endpoint.
    #[clap(long, value_hint = ValueHint::DirPath)]
    pub mock_dir: Option<PathBuf>,

    /// Download every profile image and report its dimensions.
    #[clap(long, action = ArgAction::SetTrue)]
    pub avatars: bool,
}

fn setup_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let console_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    if let Err(e) = setup_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let args = Cli::parse();

    let config = NetworkConfig::load(&args.config_dir)
        .with_context(|| format!("loading configuration from {}", args.config_dir.display()))?;
    let service = build_service(&config, args.mock_dir.as_deref())?;
    let api = config.api_call(service)?;

    let users = fetch_users(&api).await.context("fetching users")?;
    info!("Fetched {} users", users.len());
    for user in &users {
        print_user(user);
    }

    if args.avatars {
        load_avatars(&users).await?;
    }
    Ok(())
}

/// Fixture transport when mock data or a fixture directory is given, the live
/// pinned client otherwise.
fn build_service(config: &NetworkConfig, mock_dir: Option<&Path>) -> Result<Arc<dyn NetworkService>> {
    let mock_data = match (&config.mock_data, mock_dir) {
        (Some(mock_data), _) => Some(mock_data.clone()),
        (None, Some(_)) => {
            let endpoint = UsersEndpoint::Users.endpoint(&config.custom_host)?;
            Some(vec![NetworkMockData::new(endpoint.url().path(), "users")])
        }
        (None, None) => None,
    };

    if let Some(mock_data) = mock_data {
        let base_dir = mock_dir.map(Path::to_path_buf).unwrap_or_else(|| config.config_dir.clone());
        info!("Serving {} mapped paths from {}", mock_data.len(), base_dir.display());
        return Ok(Arc::new(NetworkServicesMock::from_mock_data(base_dir, &mock_data)));
    }

    let certificates = FileCertificateStore::new(config.pinned_certificates.clone())
        .certificates()
        .context("loading pinned certificates")?;
    let client = ApiClient::with_certificates(certificates, config.trust_policy.clone())?;
    info!("Live client ready (pinned: {})", client.is_pinned());
    Ok(Arc::new(client))
}

fn print_user(user: &User) {
    let badges = user.badge_counts;
    println!(
        "{:>10}  {}  {}  [{} {} {}]",
        user.reputation.to_string().green(),
        user.display_name.bold(),
        user.location.as_deref().unwrap_or("-").dimmed(),
        badges.gold.to_string().yellow(),
        badges.silver.to_string().white(),
        badges.bronze.to_string().red(),
    );
}

/// Loads every avatar through one shared loader.
async fn load_avatars(users: &[User]) -> Result<()> {
    let loader = ImageLoader::live()?;

    let loads = users.iter().filter_map(|user| {
        let url = user.profile_image.clone()?;
        let loader = loader.clone();
        Some(async move { (user, loader.load_image(&url).await) })
    });

    for (user, outcome) in join_all(loads).await {
        match outcome {
            Ok(Some(image)) => println!("{}: {}x{}", user.display_name, image.width(), image.height()),
            Ok(None) => warn!("No displayable avatar for {}", user.display_name),
            Err(e) => warn!("Avatar for {} failed: {}", user.display_name, e),
        }
    }

    info!("{} avatars cached", loader.cached_count().await);
    Ok(())
}
