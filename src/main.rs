use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use licensor::config::Config;
use licensor::db::{AppState, DbPool, create_pool, init_db, init_registry_db, queries};
use licensor::handlers;
use licensor::middleware::with_secure_headers;
use licensor::models::{CreateLicenses, CreateProduct};
use licensor::rate_limit::CheckRateLimiter;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const SEED_LICENSE_DURATION: i64 = 30 * 86400;

#[derive(Parser, Debug)]
#[command(name = "licensor", version)]
#[command(about = "License key issuance and hardware-bound validation service")]
struct Cli {
    /// Create a demo product with five 30-day licenses (dev mode, empty database)
    #[arg(long)]
    seed: bool,

    /// Remove both database files on shutdown (dev mode only)
    #[arg(long)]
    ephemeral: bool,
}

/// Open a pool and run `init` on one of its connections.
fn open_store(
    path: &str,
    init: fn(&rusqlite::Connection) -> rusqlite::Result<()>,
) -> Result<DbPool, String> {
    let pool = create_pool(path).map_err(|e| format!("{}: {}", path, e))?;
    let conn = pool.get().map_err(|e| format!("{}: {}", path, e))?;
    init(&conn).map_err(|e| format!("{}: schema: {}", path, e))?;
    drop(conn);
    Ok(pool)
}

fn seed_demo_product(state: &AppState) -> licensor::error::Result<()> {
    let mut conn = state.db.get()?;
    if queries::count_products(&conn)? > 0 {
        tracing::info!("Products already exist, not seeding");
        return Ok(());
    }

    let product = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Demo App".to_string(),
            product_code: "demo-app".to_string(),
        },
    )?;
    let licenses = queries::create_licenses(
        &mut conn,
        &CreateLicenses {
            product_id: product.id.clone(),
            duration: SEED_LICENSE_DURATION,
            is_lifetime: false,
            description: Some("Seeded dev license".to_string()),
            count: 5,
        },
        queries::now(),
    )?;
    tracing::info!(
        product_id = %product.id,
        licenses = licenses.len(),
        "Seeded demo product"
    );

    // Plain stdout so the keys can be pasted into a client
    println!("\nproduct_code  {}", product.product_code);
    for license in &licenses {
        println!("license_key   {}", license.license_key);
    }
    println!();
    Ok(())
}

fn purge_check_records(state: &AppState, retention_days: i64) {
    let purged = state
        .registry
        .get()
        .map_err(licensor::error::AppError::from)
        .and_then(|conn| queries::purge_old_check_records(&conn, retention_days));
    match purged {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, retention_days, "Purged old check records"),
        Err(e) => tracing::warn!("Check record purge failed: {}", e),
    }
}

/// Periodically purge the check registry and shrink the keyed limiters.
fn spawn_cleanup_task(state: AppState, retention_days: i64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        // First tick fires immediately; startup already purged.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            purge_check_records(&state, retention_days);
            state.check_limiter.retain_recent();
            tracing::debug!(tracked = state.check_limiter.len(), "Limiter state shrunk");
        }
    });
}

fn build_app(config: &Config, state: AppState) -> Router {
    let mut app = handlers::public::router(config.rate_limit);
    if config.admin_api_key.is_some() {
        app = app.merge(handlers::admin::router(state.clone()));
        tracing::info!("Admin API enabled under /admin");
    } else {
        tracing::warn!("ADMIN_API_KEY not set: admin API disabled");
    }

    with_secure_headers(app)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn remove_database_files(paths: [&str; 2]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!(path, "Removed database"),
            Err(e) => tracing::warn!(path, "Could not remove database: {}", e),
        }
        for suffix in ["-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "licensor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    if config.dev_mode {
        tracing::info!("Development mode");
    }
    if !config.require_tls {
        tracing::warn!("REQUIRE_TLS is off: plaintext license checks are accepted");
    }

    let (db, registry) = match (
        open_store(&config.database_path, init_db),
        open_store(&config.registry_database_path, init_registry_db),
    ) {
        (Ok(db), Ok(registry)) => (db, registry),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to open database {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState {
        db,
        registry,
        registry_enabled: config.registry_enabled,
        require_tls: config.require_tls,
        admin_api_key: config.admin_api_key.clone(),
        check_limiter: Arc::new(CheckRateLimiter::new(
            config.rate_limit.key_rpm,
            config.rate_limit.hwid_rpm,
        )),
    };

    purge_check_records(&state, config.registry_retention_days);

    match (cli.seed, config.dev_mode) {
        (true, true) => {
            if let Err(e) = seed_demo_product(&state) {
                tracing::error!("Seeding failed: {}", e);
            }
        }
        (true, false) => tracing::warn!("--seed ignored outside dev mode (LICENSOR_ENV=dev)"),
        _ => {}
    }

    spawn_cleanup_task(state.clone(), config.registry_retention_days);

    let app = build_app(&config, state);
    let addr = config.addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let ephemeral = cli.ephemeral && config.dev_mode;
    tracing::info!(%addr, ephemeral, "Licensor listening");

    // Connect info feeds the per-IP limiter
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;
    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
    }

    if ephemeral {
        remove_database_files([&config.database_path, &config.registry_database_path]);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
