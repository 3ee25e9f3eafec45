use perch_common::{
    feed::DEFAULT_FEED_LIMIT,
    model::auth::IdentityVerifier,
    snowflake::{ProcessId, WorkerId},
    social::Social,
};
use perch_db::client::{DbClient, DbError};
use secrecy::SecretString;
use serde::Deserialize;
use server::ServerState;
use sqlx::postgres::PgPoolOptions;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to the database: {0}")]
    DatabaseConnect(#[from] sqlx::Error),
    #[error("Error preparing the database: {0}")]
    DatabaseSetup(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Debug, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    jwt_secret: SecretString,
    #[serde(default = "default_feed_limit")]
    feed_limit: usize,
    #[serde(default)]
    worker_id: WorkerId,
    #[serde(default)]
    process_id: ProcessId,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_feed_limit() -> usize {
    DEFAULT_FEED_LIMIT
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "perch_api=debug,perch_common=debug,perch_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "Could not listen for ctrl-c, serving until killed");
        std::future::pending::<()>().await;
    }

    info!("Received ctrl-c, shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_connections)
        .connect(&env.database_url)
        .await?;
    let db_client = Arc::new(DbClient::new(pool, env.worker_id, env.process_id));
    db_client.migrate().await?;

    let social = Social::new(
        db_client.clone(),
        db_client.clone(),
        db_client,
        IdentityVerifier::new(&env.jwt_secret),
        env.feed_limit,
    );
    let app = server::app(ServerState {
        social: Arc::new(social),
    });

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, feed_limit = env.feed_limit, "Serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
