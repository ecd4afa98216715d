use bookreview_api::{
    AppState,
    auth,
    config::{AppConfig, Env},
    create_router,
    models::{Role, User},
    repository::{PostgresRepository, Repository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// main
///
/// The asynchronous entry point for the application, responsible for initializing
/// all core components: Configuration, Logging, Database, and the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // AppConfig::load() implements the fail-fast principle for missing Production secrets.
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Prioritizes the RUST_LOG environment variable, falling back to sensible
    // defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bookreview_api=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    // The structured logging format is dynamically selected based on the APP_ENV.
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability during local debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON format output for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    // Creates a connection pool to the Postgres instance defined in the configuration.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // Apply the embedded schema migrations (unique keys, cascades) before serving.
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    // Instantiate the Repository, wrapping it in an Arc for thread-safe sharing.
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. LOCAL-ONLY: seed an admin account so role-gated endpoints are
    // exercisable during development. Never runs in Production.
    if config.env == Env::Local {
        seed_admin(&repo).await;
    }

    // 6. Unified State Assembly
    // Bundles all initialized dependencies into the shared AppState.
    let app_state = AppState {
        repo,
        config: config.clone(),
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    // Binds the TCP listener and initiates the HTTP server.
    let listener = TcpListener::bind(&config.bind_addr).await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on {}", config.bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: /swagger-ui");

    // The long-running Axum server process.
    axum::serve(listener, app).await.unwrap();
}

/// seed_admin
///
/// Development convenience: ensures an `admin` account exists. The password
/// comes from ADMIN_PASSWORD (default "admin123" for local setups only).
async fn seed_admin(repo: &RepositoryState) {
    let existing = repo
        .find_user_by_login("admin")
        .await
        .expect("FATAL: Failed to check for seeded admin.");
    if existing.is_some() {
        return;
    }

    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let admin = User {
        id: Uuid::new_v4(),
        username: "admin".to_string(),
        email: "admin@local.test".to_string(),
        password_hash: auth::hash_password(&password).expect("FATAL: Failed to hash admin password."),
        role: Role::Admin,
    };

    repo.create_user(admin)
        .await
        .expect("FATAL: Failed to seed admin account.");
    tracing::info!("Seeded local admin account 'admin'");
}
