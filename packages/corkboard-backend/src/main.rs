#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = corkboard_backend::run().await {
        log::error!(target: "corkboard.server", "Backend failed: {}", e);
        std::process::exit(1);
    }
}
