//! Service configuration
//!
//! Resolution priority per setting: command-line argument, then environment
//! variable, then compiled default. All settings are optional; the defaults
//! give a working local development setup.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cohort-api", about = "Grade-records query backend")]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "COHORT_BIND_ADDR", default_value = "127.0.0.1:8000")]
    bind_addr: String,

    /// Path to the SQLite database file
    #[arg(long, env = "COHORT_DB_PATH", default_value = "cohort.db")]
    db_path: PathBuf,

    /// Secret used to sign bearer tokens. Change this in production.
    #[arg(long, env = "COHORT_SECRET", default_value = "dev-secret-change-me")]
    secret: String,

    /// Password for the seeded admin account
    #[arg(long, env = "COHORT_ADMIN_PASSWORD", default_value = "admin123")]
    admin_password: String,

    /// Comma-separated CORS origins, or "*" for any
    #[arg(long, env = "COHORT_ALLOWED_ORIGINS", default_value = "*")]
    allowed_origins: String,

    /// Wrap successful JSON responses in the payload codec
    #[arg(long, env = "COHORT_SHIELD", default_value_t = true, action = clap::ArgAction::Set)]
    shield: bool,
}

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub secret: String,
    pub admin_password: String,
    pub allowed_origins: Vec<String>,
    pub shield: bool,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn load() -> Self {
        Args::parse().into()
    }

    /// Configuration for tests: in-repo defaults, shield off, fixed secret.
    #[doc(hidden)]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: PathBuf::from(":memory:"),
            secret: "test-secret".to_string(),
            admin_password: "admin123".to_string(),
            allowed_origins: vec!["*".to_string()],
            shield: false,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let allowed_origins = args
            .allowed_origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        Self {
            bind_addr: args.bind_addr,
            db_path: args.db_path,
            secret: args.secret,
            admin_password: args.admin_password,
            allowed_origins,
            shield: args.shield,
        }
    }
}
