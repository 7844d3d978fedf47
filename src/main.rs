use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use licensetrack::config::Config;
use licensetrack::crypto::FieldCipher;
use licensetrack::db::{AppState, create_pool, init_db};
use licensetrack::error::expose_error_details;
use licensetrack::jwt::Authenticator;
use licensetrack::ledger::Ledger;
use licensetrack::models::{CreateLicense, CreateProduct, LicenseStatus};
use licensetrack::storage::LocalBlobStore;
use licensetrack::{app, registry};

const SEED_USER_ID: &str = "demo-user";

#[derive(Parser, Debug)]
#[command(name = "licensetrack")]
#[command(about = "Track software licenses, subscriptions and renewal costs")]
struct Cli {
    /// Seed the database with a demo product and license (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Print a fresh FIELD_ENCRYPTION_KEY and exit
    #[arg(long)]
    generate_key: bool,
}

/// Seeds a demo product and license for the demo user and prints a token for it.
/// Skipped when the demo user already owns products.
fn seed_dev_data(state: &AppState) -> licensetrack::error::Result<()> {
    let conn = state.db.get()?;

    if !registry::list_products(&conn, SEED_USER_ID)?.is_empty() {
        tracing::info!("Database already has demo data, skipping seed");
        return Ok(());
    }

    let product = registry::create_product(
        &conn,
        SEED_USER_ID,
        &CreateProduct {
            name: "JetBrains All Products".to_string(),
            tags: vec!["Dev".to_string(), "IDE".to_string()],
        },
    )?;

    let ledger = Ledger::new(&conn, &state.cipher, state.blobs.as_ref(), state.key_search);
    let license = ledger.create(
        SEED_USER_ID,
        CreateLicense {
            product_id: product.id.clone(),
            license_key: "DEMO-1234-5678".to_string(),
            expiry_date: chrono::Utc::now().timestamp() + 45 * 86400,
            auto_renew: true,
            usage_limits: Some("3 seats".to_string()),
            status: LicenseStatus::Active,
            notes: Some("Seeded demo license".to_string()),
            client_project: Some("Internal".to_string()),
            monthly_cost: 24.9,
            annual_cost: 249.0,
        },
        None,
    )?;

    let token = state.auth.issue_token(SEED_USER_ID, 30)?;

    tracing::info!("Product: {} (id: {})", product.name, product.id);
    tracing::info!("License: {}", license.license.id);

    // Copy-paste friendly output
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  user_id: {}", SEED_USER_ID);
    println!("  token: {}", token);
    println!("  product_id: {}", product.id);
    println!("  license_id: {}", license.license.id);
    println!("--- END COPY ---");
    println!();

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.generate_key {
        println!("{}", FieldCipher::generate_secret());
        return;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "licensetrack=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::error!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).unwrap_or_else(|e| {
        tracing::error!("Failed to create database pool: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = db_pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|conn| init_db(&conn).map_err(|e| e.to_string()))
    {
        tracing::error!("Failed to initialize database: {}", e);
        std::process::exit(1);
    }

    let bypass_user = config.effective_bypass_user();
    if let Some(ref user_id) = bypass_user {
        tracing::warn!("AUTH BYPASS enabled: every request acts as {}", user_id);
    } else if config.auth_bypass_user_id.is_some() {
        tracing::warn!("AUTH_BYPASS_USER_ID ignored: not in dev mode (set LICENSETRACK_ENV=dev)");
    }

    let blobs = LocalBlobStore::new(&config.upload_dir, format!("{}/files", config.base_url));

    let state = AppState {
        db: db_pool,
        cipher: config.field_cipher.clone(),
        blobs: Arc::new(blobs),
        auth: Arc::new(Authenticator::new(&config.jwt_secret).with_bypass_user(bypass_user)),
        key_search: config.key_search,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set LICENSETRACK_ENV=dev)");
        } else if let Err(e) = seed_dev_data(&state) {
            tracing::error!("Failed to seed dev data: {}", e);
            std::process::exit(1);
        }
    }

    let mut router = app(state).nest_service("/files", ServeDir::new(&config.upload_dir));

    if config.dev_mode {
        router = router.layer(middleware::map_response(expose_error_details));
    }

    let router = router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
    );

    let addr = config.addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("LicenseTrack server listening on {}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
