use clap::Args;

/// Settings shared by every command. Each flag falls back to an environment
/// variable, and `.env` is loaded before parsing.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Postgres connection string for the document store
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
    #[arg(long, global = true, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
    /// Collection each upload is written to
    #[arg(long, global = true, env = "DASHBOARD_COLLECTION", default_value = "transactions")]
    pub collection: String,
    /// Symbol used when rendering money
    #[arg(long, global = true, env = "DASHBOARD_CURRENCY", default_value = "₹")]
    pub currency: String,
}

impl Settings {
    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set to reach the document store"))
    }
}
