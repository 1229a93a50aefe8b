// Standalone mock application for trying pageshot by hand

use std::net::SocketAddr;
use tracing::{Level, info};

// Include the shared mock application module
include!("../../tests/common/mock_app.rs");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let app = create_app().await;

    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    info!("Mock application listening on http://{}", addr);
    info!("Log in as {} / {}", MOCK_EMAIL, MOCK_PASSWORD);

    axum::serve(listener, app).await.expect("Server failed");
}
