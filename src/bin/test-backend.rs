//! Minimal upstream server for exercising the proxy by hand: answers every
//! request with its own listen address.

use std::net::SocketAddr;

use axum::{extract::State, routing::get, Router};
use clap::Parser;

#[derive(Parser)]
#[command(name = "test-backend")]
#[command(about = "Tiny backend for exercising the proxy", long_about = None)]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 9001)]
    port: u16,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let app = Router::new()
        .route("/", get(respond))
        .route("/{*path}", get(respond))
        .with_state(addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind test backend");
    println!("Test backend listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .expect("test backend server error");
}

async fn respond(State(addr): State<SocketAddr>) -> String {
    format!("Response from backend {addr}\n")
}
