use crate::db::models::settings::AuctionSettings;
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "boostd", about = "Sealed-bid boost auction engine")]
pub struct Args {
    /// Path to a YAML configuration file
    #[arg(long, env = "BOOSTD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the database URL
    #[arg(long)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// How often the clearing scheduler wakes up. Should be comfortably
    /// shorter than the shortest configured window.
    #[serde(with = "humantime_serde")]
    pub clearing_tick: Duration,

    pub enable_metrics: bool,

    /// Auction settings seeded into the database on first startup. Later
    /// edits happen in the database; the seed never overwrites them.
    #[serde(default)]
    pub auction_settings: Vec<AuctionSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/boostd".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            clearing_tick: Duration::from_secs(30),
            enable_metrics: false,
            auction_settings: vec![],
        }
    }
}

impl Config {
    /// Defaults, overridden by the YAML file, overridden by `BOOSTD_*`
    /// environment variables, overridden by CLI flags.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = &args.config {
            figment = figment.merge(Yaml::file(path));
        }
        let mut config: Config = figment.merge(Env::prefixed("BOOSTD_").split("__")).extract()?;

        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(database_url) = &args.database_url {
            config.database_url = database_url.clone();
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
