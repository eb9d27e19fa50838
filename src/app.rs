use std::{future::Future, net::SocketAddr, time::Duration};

use axum::{
    error_handling::HandleErrorLayer,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use tower::timeout::TimeoutLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
};
use tracing::{info, warn};

use crate::{
    error, routes, storage::PgSubscriberStore, subscriptions::Subscriptions, telemetry, Config,
};

const MAX_CONNECTIONS: u32 = 25;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest a request may take, from the first byte read to the response being produced.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How long in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// The full HTTP surface, with middleware, serving `subscriptions`.
pub(crate) fn router(subscriptions: Subscriptions, request_timeout: Duration) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    axum::Router::new()
        .route("/health", get(routes::health))
        .route("/api/newsletter/subscribe", post(routes::subscribe))
        .layer(
            tower::ServiceBuilder::new()
                .layer(telemetry::id_layer())
                .layer(telemetry::trace_layer())
                .layer(cors)
                .layer(CatchPanicLayer::custom(error::recover))
                .layer(HandleErrorLayer::new(error::handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(axum::Extension(subscriptions)),
        )
}

pub struct App {
    addr: SocketAddr,
    pool: sqlx::PgPool,
    ignore_missing_migrations: bool,
    service: axum::routing::IntoMakeService<axum::Router>,
}

pub type Server =
    axum::Server<hyper::server::conn::AddrIncoming, axum::routing::IntoMakeService<axum::Router>>;

impl App {
    pub fn new(config: Config) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_timeout(CONNECT_TIMEOUT)
            .connect_lazy_with(config.database_options());

        let subscriptions = Subscriptions::new(
            PgSubscriberStore::new(pool.clone()),
            config.client_token().clone(),
        );

        Self {
            addr: config.address(),
            pool,
            ignore_missing_migrations: config.ignore_missing_migrations(),
            service: router(subscriptions, REQUEST_TIMEOUT).into_make_service(),
        }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    /// Bring the schema up to date, then bind the listener.
    pub async fn serve(self) -> Result<Server, sqlx::migrate::MigrateError> {
        self.migrate().await.or_else(|error| match error {
            sqlx::migrate::MigrateError::VersionMissing(_) if self.ignore_missing_migrations => {
                warn!(
                    ?error,
                    "database schema is ahead of this build; continuing because \
                    IGNORE_MISSING_MIGRATIONS is set"
                );
                Ok(())
            }
            _ => Err(error),
        })?;
        Ok(axum::Server::bind(&self.addr).serve(self.service))
    }

    #[tracing::instrument(skip(self))]
    async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Run `server` until `signal` resolves, then wait at most `grace` for in-flight requests.
pub async fn run_until_stopped<F>(
    server: Server,
    signal: F,
    grace: Duration,
) -> Result<(), hyper::Error>
where
    F: Future<Output = ()>,
{
    let (stopping_tx, stopping_rx) = tokio::sync::oneshot::channel();
    let graceful = server.with_graceful_shutdown(async move {
        signal.await;
        info!("shutting down, draining in-flight requests");
        let _ = stopping_tx.send(());
    });
    let deadline = async move {
        match stopping_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => futures::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = graceful => result,
        () = deadline => {
            warn!(?grace, "in-flight requests did not finish in time, dropping them");
            Ok(())
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for SIGINT");
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
