use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub completion: CompletionSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub issuer: String,
}

/// OpenAI-compatible chat completion endpoint used for assistant replies.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionSettings {
    /// Base URL; requests go to `{endpoint}/chat/completions`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadSettings {
    pub dir: String,
    pub max_turn_files: usize,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("ATELIER"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 5000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "atelier")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 86400)?
            .set_default("jwt.issuer", "atelier")?
            .set_default("completion.endpoint", "https://models.inference.ai.azure.com")?
            .set_default("completion.api_key", None::<String>)?
            .set_default("completion.model", "gpt-4o-mini")?
            .set_default("completion.timeout_secs", 60)?
            .set_default("completion.system_prompt", "You are a helpful assistant.")?
            .set_default("uploads.dir", "/tmp/atelier-uploads")?
            .set_default("uploads.max_turn_files", 3)?
            .build()?;

        config.try_deserialize()
    }
}
