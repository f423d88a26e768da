use std::path::PathBuf;

use clap::Args;
use places_core::ClientConfig;

use crate::error::PerfError;

#[derive(Args, Clone, Debug)]
pub struct PerfArgs {
    /// TOML client config; flags and env vars override its values
    #[arg(long, env = "PLACES_CONFIG")]
    pub config: Option<PathBuf>,

    /// OAuth consumer key
    #[arg(long, env = "PLACES_KEY")]
    pub key: Option<String>,

    /// OAuth consumer secret
    #[arg(long, env = "PLACES_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    #[arg(long, env = "PLACES_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "PLACES_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "PLACES_API_VERSION")]
    pub api_version: Option<String>,

    /// Requests per operation
    #[arg(long, short = 'n', default_value_t = 1)]
    pub requests: usize,

    /// Seconds to wait after the add phase so new records become readable
    #[arg(long, default_value_t = 0)]
    pub settle_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Seed for the coordinate generator (random when absent)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Client config after merging: config file < env/CLI.
pub fn client_config(args: &PerfArgs) -> Result<ClientConfig, PerfError> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => {
            let (Some(key), Some(secret)) = (&args.key, &args.secret) else {
                return Err(PerfError::Config(
                    "either --config or both --key and --secret are required".to_string(),
                ));
            };
            ClientConfig::new(key, secret)
        }
    };

    if let Some(key) = &args.key {
        config.key = key.clone();
    }
    if let Some(secret) = &args.secret {
        config.secret = secret.clone();
    }
    if let Some(host) = &args.host {
        config = config.host(host);
    }
    if let Some(port) = args.port {
        config = config.port(port);
    }
    if let Some(version) = &args.api_version {
        config = config.api_version(version);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> PerfArgs {
        PerfArgs {
            config: None,
            key: None,
            secret: None,
            host: None,
            port: None,
            api_version: None,
            requests: 1,
            settle_secs: 0,
            timeout_secs: 30,
            seed: None,
        }
    }

    #[test]
    fn credentials_are_required_without_a_file() {
        let err = client_config(&PerfArgs {
            key: Some("k".to_string()),
            ..args()
        })
        .unwrap_err();
        assert!(matches!(err, PerfError::Config(_)));
    }

    #[test]
    fn flags_override_defaults() {
        let config = client_config(&PerfArgs {
            key: Some("k".to_string()),
            secret: Some("s".to_string()),
            host: Some("127.0.0.1".to_string()),
            port: Some(3000),
            api_version: Some("0.1".to_string()),
            ..args()
        })
        .unwrap();
        assert_eq!(config.key, "k");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_version, "0.1");
    }

    #[test]
    fn unreadable_config_file_is_an_api_config_error() {
        let err = client_config(&PerfArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..args()
        })
        .unwrap_err();
        assert!(matches!(err, PerfError::Api(places_core::ApiError::ConfigError(_))));
    }
}
