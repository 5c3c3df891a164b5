use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::{Error, Result, CONFIG_FALLBACK_PATH, CONFIG_PATH};

/// Everything a scrape run needs to know about the target and the user.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Sent as `codpes`.
    pub username: String,
    /// Sent as `senusu`.
    pub password: String,
    pub year: u16,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path scope of the fabricated session cookie.
    #[serde(default = "default_app_path")]
    pub app_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_auth_path")]
    pub auth_path: String,
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
    #[serde(default = "default_rpc_script")]
    pub rpc_script: String,
    #[serde(default = "default_rpc_method")]
    pub rpc_method: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_login_delay_ms")]
    pub login_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://uspdigital.usp.br".into()
}
fn default_app_path() -> String {
    "/apolo".into()
}
fn default_login_path() -> String {
    "/apolo/".into()
}
fn default_auth_path() -> String {
    "/apolo/autenticar".into()
}
fn default_listing_path() -> String {
    "/apolo/bolsaPublicacaoListar".into()
}
fn default_rpc_script() -> String {
    "BolsaPublicacaoControleDWR".into()
}
fn default_rpc_method() -> String {
    "listarBolsasPublicadas".into()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_login_delay_ms() -> u64 {
    1000
}

impl Config {
    /// Loads `path` if given, otherwise `config.json`, otherwise `config.json.example`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None if Path::new(CONFIG_PATH).exists() => PathBuf::from(CONFIG_PATH),
            None => PathBuf::from(CONFIG_FALLBACK_PATH),
        };
        let content = std::fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        // Fail early on a bad base URL rather than mid-run.
        config.base()?;
        Ok(config)
    }

    fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| Error::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base()?.join(path).map_err(|e| Error::InvalidUrl {
            url: format!("{}{}", self.base_url, path),
            reason: e.to_string(),
        })
    }

    pub fn login_url(&self) -> Result<Url> {
        self.join(&self.login_path)
    }

    pub fn auth_url(&self) -> Result<Url> {
        self.join(&self.auth_path)
    }

    pub fn listing_url(&self) -> Result<Url> {
        self.join(&self.listing_path)
    }

    /// `<app_path>/dwr/call/plaincall/<script>.<method>.dwr`
    pub fn rpc_url(&self) -> Result<Url> {
        let path = format!(
            "{}/dwr/call/plaincall/{}.{}.dwr",
            self.app_path.trim_end_matches('/'),
            self.rpc_script,
            self.rpc_method
        );
        self.join(&path)
    }

    /// Scheme and host of the target, as browsers send it in `Origin`.
    pub fn origin(&self) -> Result<String> {
        Ok(self.base()?.origin().ascii_serialization())
    }

    pub fn login_delay(&self) -> Duration {
        Duration::from_millis(self.login_delay_ms)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("bolsas_pub_{}.csv", self.year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{ "username": "123", "password": "secret", "year": 2023 }"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert_eq!(config.login_delay_ms, 1000);
        assert_eq!(config.output_path(), PathBuf::from("./bolsas_pub_2023.csv"));
        assert_eq!(
            config.rpc_url().unwrap().as_str(),
            "https://uspdigital.usp.br/apolo/dwr/call/plaincall/BolsaPublicacaoControleDWR.listarBolsasPublicadas.dwr"
        );
        assert_eq!(config.origin().unwrap(), "https://uspdigital.usp.br");
    }

    #[test]
    fn rejects_bad_base_url() {
        let json = r#"{ "username": "1", "password": "2", "year": 2023, "base_url": "not a url" }"#;
        assert!(matches!(Config::from_json(json), Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn missing_credentials_is_an_error() {
        assert!(matches!(Config::from_json(r#"{ "year": 2023 }"#), Err(Error::Config(_))));
    }
}
