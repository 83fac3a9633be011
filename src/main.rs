//! application entry point

use crate::server::model::config::ServerConfig;
use anyhow::Context;
use derive_more::Display;
use log::info;
use std::env;
use std::str::FromStr;

mod server;

#[actix_web::main()]
async fn main() -> Result<(), anyhow::Error> {
    // a. env, dev falls back to .env.dev; stg and prod get theirs from CI
    let app_env = env::var("APP_ENV")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(AppEnv::Dev);
    if let Some(file) = app_env.dotenv_file() {
        dotenvy::from_filename(file)
            .with_context(|| format!("failed to load envs from {file}, aborting"))?;
    }

    // b. logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // c. config and run
    let config = ServerConfig::from_lookup(|key| env::var(key).ok())?;
    info!("table-tab is starting in env={} on {}", app_env, config.addr);
    server::run(config).await
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
enum AppEnv {
    #[display("dev")]
    Dev,
    #[display("stg")]
    Stg,
    #[display("prod")]
    Prod,
}

impl AppEnv {
    fn dotenv_file(self) -> Option<&'static str> {
        match self {
            AppEnv::Dev => Some(".env.dev"),
            AppEnv::Stg | AppEnv::Prod => None,
        }
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "stg" | "staging" => Ok(Self::Stg),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(format!("Invalid APP_ENV: {other}")),
        }
    }
}
