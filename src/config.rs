use std::path::PathBuf;

use url::Url;

pub const DEFAULT_CONF_PATH: &str = "/etc/nginx/conf.d/default.conf";
pub const DEFAULT_RELOAD_CMD: &str = "nginx -s reload";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set; upsync cannot talk to the orchestrator without it")]
    MissingVar(&'static str),
    #[error("{var} is not a valid url: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Credential passed verbatim in the Authorization header and as the
    /// stream's auth query parameter.
    pub auth: String,
    pub api_url: Url,
    pub stream_url: Url,
    /// Rendered configuration lands here; the same path is watched for
    /// outside modification.
    pub conf_path: PathBuf,
    pub reload_cmd: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |var| lookup(var).ok_or(ConfigError::MissingVar(var));

        let auth = require("UPSYNC_AUTH")?;
        let api_url = parse_url("UPSYNC_API_URL", &require("UPSYNC_API_URL")?)?;
        let stream_url = parse_url("UPSYNC_STREAM_URL", &require("UPSYNC_STREAM_URL")?)?;
        let conf_path = lookup("UPSYNC_CONF")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONF_PATH));
        let reload_cmd =
            lookup("UPSYNC_RELOAD_CMD").unwrap_or_else(|| DEFAULT_RELOAD_CMD.to_string());

        Ok(Self {
            auth,
            api_url,
            stream_url,
            conf_path,
            reload_cmd,
        })
    }

    /// Stream endpoint with the credential appended as the `auth` query
    /// parameter.
    pub fn stream_url_with_auth(&self) -> String {
        format!(
            "{}?auth={}",
            self.stream_url,
            urlencoding::encode(&self.auth)
        )
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { var, source })
}
