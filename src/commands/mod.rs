pub mod abstracts;
pub mod search;
pub mod trends;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use publication_tracker::store::{StoreBackendConfig, create_store};
use publication_tracker::{
    ClientConfig, Provider, PubMedClient, Reconciler, ScopusClient, ScopusConfig, TrackerConfig,
};
use serde::Serialize;

/// Connection settings gathered from global flags and the environment
pub struct TrackerOptions {
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub tool: String,
    pub scopus_api_key: Option<String>,
    pub scopus_inst_token: Option<String>,
    /// `None` keeps everything in memory
    pub database: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ProviderArg {
    Pubmed,
    Scopus,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Pubmed => Provider::PubMed,
            ProviderArg::Scopus => Provider::Scopus,
        }
    }
}

pub fn create_pubmed_client(api_key: Option<&str>, email: Option<&str>, tool: &str) -> PubMedClient {
    let mut config = ClientConfig::new().with_tool(tool);

    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }

    if let Some(email) = email {
        config = config.with_email(email);
    }

    PubMedClient::with_config(config)
}

pub fn create_scopus_client(api_key: Option<&str>, inst_token: Option<&str>) -> ScopusClient {
    let mut config = ScopusConfig::new();

    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }

    if let Some(token) = inst_token {
        config = config.with_inst_token(token);
    }

    ScopusClient::with_config(config)
}

pub fn create_tracker(options: &TrackerOptions) -> Result<Reconciler> {
    let backend = match &options.database {
        Some(path) => StoreBackendConfig::Sqlite { path: path.clone() },
        None => StoreBackendConfig::Memory,
    };
    let store = create_store(&backend).context("Failed to open publication store")?;

    Ok(Reconciler::new(
        store,
        create_pubmed_client(
            options.api_key.as_deref(),
            options.email.as_deref(),
            &options.tool,
        ),
        create_scopus_client(
            options.scopus_api_key.as_deref(),
            options.scopus_inst_token.as_deref(),
        ),
        TrackerConfig::default(),
    ))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
