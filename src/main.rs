//! Gatehouse - token + nonce authentication core

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse::{
    auth::{AuthService, PasswordParams, ProtocolParams},
    config::Args,
    db::{AuthStore, MemoryAuthStore, MongoAuthStore, MongoClient},
    logging::AuditLogger,
    routes, server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gatehouse={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Gatehouse - authentication core");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Token TTL: {} min", args.token_ttl_minutes);
    info!("PBKDF2 iterations: {}", args.pbkdf2_iterations);
    info!("======================================");

    // Connect to MongoDB; dev mode falls back to the in-memory store
    let store: Arc<dyn AuthStore> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db)
        .await
    {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Arc::new(MongoAuthStore::new(&client).await?)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryAuthStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Register the permissions declared by the route handlers
    routes::ensure_declared_permissions(store.as_ref()).await?;

    let params = ProtocolParams {
        token_ttl_minutes: args.token_ttl_minutes,
        nonce_ttl_minutes: args.nonce_ttl_minutes,
        token_size: args.token_size,
        password: PasswordParams {
            iterations: args.pbkdf2_iterations,
            salt_size: args.salt_size,
            derived_key_len: args.derived_key_len,
        },
    };

    let auth = AuthService::new(Arc::clone(&store), params);
    let audit = AuditLogger::new(Arc::clone(&store));

    // The in-memory store starts empty; give dev mode a superuser to log
    // in with
    if args.dev_mode {
        if let Err(e) = seed_dev_fixtures(&auth, store.as_ref()).await {
            warn!("Failed to seed dev fixtures: {}", e);
        }
    }

    let state = Arc::new(server::AppState::new(args, auth, audit));
    server::run(state).await?;

    Ok(())
}

/// Development accounts: an app, an all-powerful superuser, and a Default
/// role template. Skipped for any user that already exists.
async fn seed_dev_fixtures(auth: &AuthService, store: &dyn AuthStore) -> gatehouse::Result<()> {
    use gatehouse::auth::{hash_password, new_id};
    use gatehouse::db::schemas::{
        AppDoc, RoleDoc, UserDoc, UserPermissionDoc, ALL_ACTIONS_PERMISSION, DEFAULT_ROLE,
    };

    if store.find_user_by_username("superuser").await?.is_some() {
        return Ok(());
    }

    let hashed = hash_password("reallyBadHardcodedPassword", &auth.params().password)?;
    let user = UserDoc::new(
        new_id(),
        "superuser".into(),
        "superuser@localhost".into(),
        hashed.hash,
        hashed.salt,
        "Administrator".into(),
    );
    let user_id = user.id.clone();
    store.insert_user(user).await?;

    let mut app = AppDoc::new("defaultapp".into(), "Development app".into(), new_id());
    app.usernames.push("superuser".into());
    store.insert_app(app).await?;

    store
        .grant_permission(UserPermissionDoc::new(
            new_id(),
            user_id,
            new_id(),
            ALL_ACTIONS_PERMISSION.into(),
        ))
        .await?;

    if store.find_role_by_name(DEFAULT_ROLE).await?.is_none() {
        store
            .insert_role(RoleDoc::new(
                new_id(),
                DEFAULT_ROLE.into(),
                vec!["Get User".into(), "Query User".into()],
            ))
            .await?;
    }

    info!("Seeded dev fixtures (superuser / defaultapp)");
    Ok(())
}
