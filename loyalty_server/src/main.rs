use clap::Parser;
use dotenvy::dotenv;
use log::{info, warn};
use loyalty_server::{config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = ServerConfig::parse();
    preflight_check(&config);

    info!("🚀️ Starting loyalty server on {}", config.run_address);
    match run_server(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

fn preflight_check(config: &ServerConfig) {
    info!("🚦️ Running preflight checks...");
    if config.secret_key().is_empty() {
        warn!(
            "🚦️ KEY is not set. Session tokens will be signed with an empty secret and body-hash \
             verification is disabled. Do not run like this outside of development."
        );
    }
    if config.accrual_address.is_empty() {
        warn!(
            "🚦️ ACCRUAL_SYSTEM_ADDRESS is not set. Orders will stay NEW until an accrual service is \
             configured."
        );
    }
    info!("🚦️ Preflight checks complete.");
}
