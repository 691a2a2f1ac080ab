use std::env;
use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, Arc};

use anyhow::{Context as AnyhowContext, Result};
use env_logger::Env;
use structopt::StructOpt;

use flowatch::context::Context;
use flowatch::run;
use flowatch_core::config::{SinkKind, WatcherConfig};
use flowatch_core::security;
use flowatch_core::types::FolderId;

#[derive(StructOpt, Debug)]
#[structopt(name = "flowatch")]
struct Opt {
    /// Configuration file path (default : ~/.flowatch.conf)
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Watched folder identifier (overrides the configuration file)
    #[structopt(long)]
    folder: Option<String>,

    /// Run exactly one poll cycle, then exit
    #[structopt(long)]
    once: bool,

    /// Save interactively prompted tokens in the keyring
    #[structopt(long)]
    store_tokens: bool,
}

/// A token comes from the named environment variable when one is
/// configured, else from the keyring, else from an interactive prompt.
fn resolve_token(
    token_env: &Option<String>,
    address: &str,
    prompt: &str,
    store: bool,
) -> Result<String> {
    if let Some(env_var) = token_env {
        return env::var(env_var).context(format!("No value set for env var {}", env_var));
    }

    let username = whoami::username();
    match security::get_token(address, &username) {
        Ok(token) => Ok(token),
        Err(error) => {
            log::debug!("No token in keyring for '{}': '{}'", address, error);
            let token = rpassword::prompt_password(prompt)?;
            if store {
                if let Err(error) = security::set_token(address, &username, &token) {
                    log::error!("Unable to store token in keyring: '{}'", error);
                }
            }
            Ok(token)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let opt = Opt::from_args();

    let mut config = match &opt.config {
        Some(config_file_path) => WatcherConfig::from_file(config_file_path)?,
        None => WatcherConfig::from_env()?,
    };
    if let Some(folder) = &opt.folder {
        config.folder_id = FolderId(folder.clone());
    }

    let remote_token = resolve_token(
        &config.remote.token_env,
        &config.remote.address,
        "Remote API token ? ",
        opt.store_tokens,
    )?;
    let record_token = match &config.record_sink {
        Some(record_config) if config.sinks.contains(&SinkKind::Record) => Some(resolve_token(
            &record_config.token_env,
            &record_config.address,
            "Record database token ? ",
            opt.store_tokens,
        )?),
        _ => None,
    };

    let context = Context::from_config(&config, remote_token, record_token, opt.once)?;
    log::debug!("Run with context {:?}", &context);

    let stop_signal = Arc::new(AtomicBool::new(false));
    run::run(context, stop_signal, None)?;
    log::info!("Exit application");
    Ok(())
}
