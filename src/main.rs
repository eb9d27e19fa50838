use newsletter::App;
use tracing::info;

#[tokio::main]
async fn main() {
    newsletter::telemetry::init(env!("CARGO_PKG_NAME"), std::io::stdout);

    let config = newsletter::Config::from_env().expect("invalid configuration in environment");

    let app = App::new(config);
    let server = app.serve().await.expect("failed to serve app");

    info!("Listening on {}", server.local_addr());
    newsletter::run_until_stopped(
        server,
        newsletter::shutdown_signal(),
        newsletter::SHUTDOWN_GRACE,
    )
    .await
    .expect("error while running server");
    info!("Server exited");
}
