//! trust-o-meter server: REST API plus a WebSocket push channel over a
//! SQLite store.

pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod state;
pub mod views;

use clap::Parser;

use crate::auth::TokenSigner;
use crate::storage::{db_path, Storage};

use config::{Cli, Config};
use state::AppState;

/// Entry point: parse CLI, resolve configuration, start server.
pub async fn run() {
    let cli = Cli::parse();
    crate::logging::init();

    let config = match Config::resolve(cli, |key| std::env::var(key).ok()) {
        Ok(c) => c,
        Err(e) => {
            crate::tlog!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    crate::tlog!("trust-o-meter starting");
    crate::tlog!("  data directory: {}", config.data_dir.display());

    let db = db_path(&config.data_dir);
    let storage = Storage::open(&db).expect("failed to open database");
    crate::tlog!("  database: {}", db.display());
    if config.admins.is_empty() {
        crate::tlog!("  admins: none configured (the status catalog is read-only)");
    } else {
        crate::tlog!("  admins: {}", config.admins.join(", "));
    }

    let signer = TokenSigner::new(config.token_secret.as_bytes(), config.token_ttl_secs)
        .expect("invalid token secret");

    let state = AppState::new(storage, signer, config.admins.clone()).into_shared();
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    crate::tlog!("trust-o-meter listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}
