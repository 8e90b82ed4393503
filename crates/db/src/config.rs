use anyhow::{Context, Result};

pub const DATABASE_HOST: &str = "DATABASE_HOST";
pub const DATABASE_PORT: &str = "DATABASE_PORT";
pub const DATABASE_USER: &str = "DATABASE_USER";
pub const DATABASE_PASSWORD: &str = "DATABASE_PASSWORD";
pub const DATABASE_NAME: &str = "DATABASE_NAME";

/// Connection parameters for the hospital database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "aarogentix".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from a variable lookup, falling back to the defaults
    /// for anything unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup(DATABASE_HOST) {
            config.host = host;
        }
        if let Some(port) = lookup(DATABASE_PORT) {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("{DATABASE_PORT} `{port}` is not a valid port"))?;
        }
        if let Some(user) = lookup(DATABASE_USER) {
            config.user = user;
        }
        if let Some(password) = lookup(DATABASE_PASSWORD) {
            config.password = password;
        }
        if let Some(name) = lookup(DATABASE_NAME) {
            config.name = name;
        }
        Ok(config)
    }

    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            self.name
        )
    }

    /// The url with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            urlencoding::encode(&self.user),
            self.host,
            self.port,
            self.name
        )
    }
}
