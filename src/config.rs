use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default, skip_serializing)]
    pub bot_token: String,
    pub api_url: String,
    /// JSON endpoints publishing the server directory.
    pub directory_sources: Vec<String>,
    pub page_size: usize,
    /// Sweep ticks without new welcome messages before they are deleted.
    pub debounce_ticks: u32,
    pub sweep_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: "https://api.telegram.org".into(),
            directory_sources: vec!["https://iorestoacasa.work/hosts.json".into()],
            page_size: 5,
            debounce_ticks: 2,
            sweep_interval_secs: 60,
            poll_timeout_secs: 30,
            request_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("directory_sources", &self.directory_sources)
            .field("page_size", &self.page_size)
            .field("debounce_ticks", &self.debounce_ticks)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("hostbot.toml"))
            .merge(Json::file("hostbot.json"))
            .merge(Env::prefixed("HOSTBOT_"))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        // Support Docker-style secrets
        if let Ok(secret_file) = std::env::var("HOSTBOT_BOT_TOKEN_FILE") {
            config.bot_token = std::fs::read_to_string(secret_file)?
                .trim()
                .to_string();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("Missing bot token: set HOSTBOT_BOT_TOKEN or HOSTBOT_BOT_TOKEN_FILE");
        }
        if self.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_require_token() {
        Jail::expect_with(|_jail| {
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("Missing bot token"));
            Ok(())
        });
    }

    #[test]
    fn test_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "hostbot.toml",
                r#"
                    bot_token = "from-file"
                    page_size = 8
                    directory_sources = ["https://a/hosts.json", "https://b/fixed.json"]
                "#,
            )?;
            jail.set_env("HOSTBOT_PAGE_SIZE", "3");

            let config = Config::load().unwrap();
            assert_eq!(config.bot_token, "from-file");
            assert_eq!(config.page_size, 3);
            assert_eq!(config.directory_sources.len(), 2);
            assert_eq!(config.debounce_ticks, 2);
            assert_eq!(config.sweep_interval(), Duration::from_secs(60));
            Ok(())
        });
    }

    #[test]
    fn test_token_file() {
        Jail::expect_with(|jail| {
            jail.create_file("token.txt", "  secret-token\n")?;
            jail.set_env("HOSTBOT_BOT_TOKEN_FILE", "token.txt");

            let config = Config::load().unwrap();
            assert_eq!(config.bot_token, "secret-token");
            Ok(())
        });
    }

    #[test]
    fn test_rejects_zero_page_size() {
        Jail::expect_with(|jail| {
            jail.set_env("HOSTBOT_BOT_TOKEN", "t");
            jail.set_env("HOSTBOT_PAGE_SIZE", "0");
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("page_size"));
            Ok(())
        });
    }

    #[test]
    fn test_token_is_never_printed() {
        let config = Config {
            bot_token: "secret".into(),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
