use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Google's authorization endpoint, used when `GOOGLE_AUTH_URL` is not set.
pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's token endpoint, used when `GOOGLE_TOKEN_URL` is not set.
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Google's user-info endpoint, used when `GOOGLE_USERINFO_URL` is not set.
pub const DEFAULT_GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The OAuth client ID registered with Google.
    #[arg(long, env)]
    google_client_id: Option<String>,

    /// The OAuth client secret registered with Google.
    #[arg(long, env, hide_env_values = true)]
    google_client_secret: Option<String>,

    /// Where Google sends the browser back after consent. Must match the registered value.
    #[arg(long, env, default_value = "http://localhost:4000/")]
    redirect_uri: String,

    /// Authorization endpoint. Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_GOOGLE_AUTH_URL)]
    google_auth_url: String,

    /// Token endpoint. Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_GOOGLE_TOKEN_URL)]
    google_token_url: String,

    /// User-info endpoint. Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_GOOGLE_USERINFO_URL)]
    google_userinfo_url: String,

    /// Scopes requested in the authorization URL
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "openid,https://www.googleapis.com/auth/userinfo.email,https://www.googleapis.com/auth/userinfo.profile"
    )]
    google_scopes: Vec<String>,

    /// Deadline in seconds for each call to the token and user-info endpoints
    #[arg(long, env, default_value_t = 10)]
    pub oauth_http_timeout_secs: u64,

    /// Seconds an issued CSRF state stays valid
    #[arg(long, env, default_value_t = 600)]
    pub oauth_state_ttl_secs: u64,

    /// Send a PKCE (S256) challenge with the authorization request
    #[arg(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    oauth_use_pkce: bool,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Session expiry duration in seconds (default: 24 hours = 86400 seconds)
    #[arg(long, env, default_value_t = 86400)]
    pub session_expiry_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn google_client_id(&self) -> Option<String> {
        self.google_client_id.clone()
    }

    pub fn google_client_secret(&self) -> Option<String> {
        self.google_client_secret.clone()
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn google_auth_url(&self) -> &str {
        &self.google_auth_url
    }

    pub fn google_token_url(&self) -> &str {
        &self.google_token_url
    }

    pub fn google_userinfo_url(&self) -> &str {
        &self.google_userinfo_url
    }

    pub fn google_scopes(&self) -> &[String] {
        &self.google_scopes
    }

    pub fn oauth_use_pkce(&self) -> bool {
        self.oauth_use_pkce
    }

    pub fn oauth_http_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth_http_timeout_secs)
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
