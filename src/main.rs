use google_auth::controller::AuthController;
use google_auth::http::HttpClientBuilder;
use google_auth::oauth::ProviderConfig;
use log::{error, info, warn};
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!("Starting Google sign-in service...");

    // A broken provider configuration is reported here once; the server still starts and
    // answers every sign-in request with the configuration error.
    let provider_config = ProviderConfig::load(&config);
    if let Err(e) = provider_config.validate() {
        error!("{}", e.user_message());
        warn!("Invalid OAuth configuration: {e}");
    }

    let http_client = match HttpClientBuilder::new()
        .with_timeout(config.oauth_http_timeout())
        .build()
    {
        Ok(http_client) => http_client,
        Err(e) => {
            error!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let auth_controller = AuthController::with_http_client(provider_config, http_client);
    let app_state = web::AppState::new(config, auth_controller);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with error: {e}");
        std::process::exit(1);
    }
}
