pub mod listing;
pub mod paths;
pub mod routes;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::config::ServeArgs;
pub use routes::Site;

async fn log_request(req: Request<Body>, next: Next<Body>) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    tracing::info!("[{}] {} {:?}", remote, req.method(), req.uri().to_string());
    next.run(req).await
}

/// Every path is either a folder or a file under the site root.
pub fn app(site: Arc<Site>) -> Router<Body> {
    let handlers = get(routes::get_path)
        .post(routes::create_upload)
        .put(routes::replace_upload);

    // the catch-all also matches `/`
    Router::new()
        .route("/*path", handlers)
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(site))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to await for SIGINT: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    // runs the webserver
    let root = args.folder;
    if !root.is_dir() {
        anyhow::bail!("{} is not a folder", root.display());
    }

    let site = Arc::new(Site { root: root.clone() });
    let addr = SocketAddr::new(args.bind, args.port);
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("failed to bind {}", addr))?
        .serve(app(site).into_make_service_with_connect_info::<SocketAddr>());

    tracing::info!("serving {:?} on {}", root.display().to_string(), server.local_addr());
    server
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
