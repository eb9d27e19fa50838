use std::{env, net::Ipv4Addr};

use newsletter::domain::ClientToken;
use reqwest::Url;
use sqlx::{Connection as _, Executor as _};
use uuid::Uuid;

static TRACING_ENABLED: std::sync::Once = std::sync::Once::new();

pub(crate) const CLIENT_TOKEN: &str = "integration-client-token";

pub(crate) struct TestApp {
    pub(crate) pool: sqlx::PgPool,
    pub(crate) base_url: Url,
    client: reqwest::Client,
}

/// A row of the `emails` table.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StoredEmail {
    pub(crate) email: String,
    pub(crate) is_confirmed: bool,
    pub(crate) created_at: time::OffsetDateTime,
    pub(crate) updated_at: Option<time::OffsetDateTime>,
    pub(crate) confirmed_at: Option<time::OffsetDateTime>,
}

impl TestApp {
    pub(crate) async fn spawn() -> Self {
        TRACING_ENABLED.call_once(|| {
            if std::env::var("TEST_LOG").is_ok() {
                newsletter::telemetry::init("test", std::io::stdout);
            } else {
                newsletter::telemetry::init("test", std::io::sink);
            }
        });

        let config = newsletter::Config::new(
            (Ipv4Addr::LOCALHOST, 0).into(),
            ClientToken::new(CLIENT_TOKEN),
            env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set")
                .parse()
                .expect("invalid DATABASE_URL"),
        );

        // Create a unique test database
        let database = Uuid::new_v4().to_string();
        create_database(&config.database_options().database("postgres"), &database)
            .await
            .expect("failed to create test database");

        let app = newsletter::App::new(config.with_database(&database));
        let pool = app.pool().clone();
        let server = app.serve().await.expect("failed to serve app");
        let addr = server.local_addr();

        // Run the server in a background task
        tokio::spawn(server);

        Self {
            pool,
            base_url: format!("http://{}/", addr).parse().unwrap(),
            client: reqwest::Client::new(),
        }
    }

    pub(crate) fn url(&self, path: &str) -> Url {
        self.base_url.join(path).unwrap()
    }

    pub(crate) async fn post_subscribe(&self, body: impl Into<String>) -> reqwest::Response {
        self.client
            .post(self.url("/api/newsletter/subscribe"))
            .header("content-type", "application/json")
            .body(body.into())
            .send()
            .await
            .expect("failed to execute request")
    }

    pub(crate) async fn subscribe(&self, email: &str, client_token: &str) -> reqwest::Response {
        self.post_subscribe(
            serde_json::json!({ "email": email, "clientToken": client_token }).to_string(),
        )
        .await
    }

    pub(crate) async fn stored_emails(&self) -> Vec<StoredEmail> {
        sqlx::query_as(
            "SELECT email, is_confirmed, created_at, updated_at, confirmed_at FROM emails ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .expect("failed to fetch stored emails")
    }
}

async fn create_database(
    options: &sqlx::postgres::PgConnectOptions,
    database: &str,
) -> Result<(), sqlx::Error> {
    let mut connection = sqlx::PgConnection::connect_with(options).await?;

    connection
        .execute(format!(r#"CREATE DATABASE "{}""#, database).as_str())
        .await?;

    Ok(())
}
