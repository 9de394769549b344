use std::env;
use std::net::SocketAddr;

use bricklog_server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let mut port = 8000;
    if let Some(p) = env::args().nth(1) {
        port = p.parse()?;
    }
    let db = sled::open(format!("bricklog{port}.db"))?;
    let state = AppState::new(&db)?;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app(state).into_make_service())
        .await?;
    Ok(())
}
