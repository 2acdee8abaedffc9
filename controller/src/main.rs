mod app;
mod control;
mod hardware;
mod http;
mod relays;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
