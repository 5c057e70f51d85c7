use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod checks;
mod fs;
mod govern;
mod http;
mod linked;

use common::config::read_config;
use http::svc::{HttpEndpoint, serve_http};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "/etc/mediavault/config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("mediavault server starting up, processing config file");

    let config = read_config(PathBuf::from(args.config)).await;

    info!("performing filesystem sanity checks");

    checks::readable_dir(&config.fs.media_root).expect("media_root is not a readable directory");
    checks::writable_dir(&config.cache.thumbnail_dir)
        .expect("thumbnail cache directory is not writeable");
    checks::writable_dir(&config.fs.data_dir).expect("data directory is not writeable");

    let socket: SocketAddr = config
        .http
        .socket
        .parse()
        .expect("http.socket is not a valid address");

    let state = Arc::new(HttpEndpoint::new(config.clone()).await?);

    info!("startup complete");

    serve_http(socket, state).await
}
