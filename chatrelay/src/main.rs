use chatrelay::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let server = Server::new();
    tracing::info!(
        "💬 Chat relay starting on ws://{}",
        server.config().bind_addr
    );

    server.run().await
}
