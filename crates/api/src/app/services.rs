//! Infrastructure wiring: stores, token codec, password hasher, request gate.

use std::sync::Arc;

use f1api_auth::{
    AuthorizationEngine, PasswordHasher, PermissionStore, RequestGate, TokenCodec,
};
use f1api_infra::{
    InMemoryStore, PermissionCatalog, SeedConfig, SeedReport, UserRepository, seed,
};

use crate::app::routes;
use crate::config::AppConfig;

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub users: Arc<dyn UserRepository>,
    pub catalog: Arc<dyn PermissionCatalog>,
    pub permissions: Arc<dyn PermissionStore>,
    pub codec: Arc<TokenCodec>,
    pub hasher: PasswordHasher,
    pub gate: Arc<RequestGate>,
}

impl AppServices {
    /// Wire services around one store implementing every storage trait.
    pub fn from_store<S>(store: Arc<S>, codec: TokenCodec, base_path: &str) -> Self
    where
        S: UserRepository + PermissionCatalog + PermissionStore + 'static,
    {
        let codec = Arc::new(codec);
        let permissions: Arc<dyn PermissionStore> = store.clone();
        let engine = AuthorizationEngine::new(permissions.clone());
        let gate = Arc::new(RequestGate::new(codec.clone(), engine, base_path));

        Self {
            users: store.clone(),
            catalog: store,
            permissions,
            codec,
            hasher: PasswordHasher::new(),
            gate,
        }
    }

    /// Create the administrator and register the route permission catalogue.
    pub async fn seed(&self, config: &SeedConfig) -> anyhow::Result<SeedReport> {
        let catalogue = routes::permission_catalogue();
        let report = seed(
            self.users.as_ref(),
            self.permissions.as_ref(),
            &self.hasher,
            config,
            &catalogue,
        )
        .await?;
        Ok(report)
    }
}

/// Build services from configuration and seed them.
///
/// Uses Postgres when built with the `postgres` feature and `database.url` is
/// set; otherwise an in-memory store.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let codec = TokenCodec::new(config.token_config())?;

    #[cfg(feature = "postgres")]
    let services = match config.database.url.as_deref() {
        Some(url) => {
            let store = f1api_infra::PostgresStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("using postgres store");
            AppServices::from_store(Arc::new(store), codec, config.base_path())
        }
        None => {
            tracing::warn!("database.url not set; using in-memory store");
            AppServices::from_store(Arc::new(InMemoryStore::new()), codec, config.base_path())
        }
    };

    #[cfg(not(feature = "postgres"))]
    let services = {
        if config.database.url.is_some() {
            tracing::warn!("database.url ignored; built without the postgres feature");
        }
        AppServices::from_store(Arc::new(InMemoryStore::new()), codec, config.base_path())
    };

    let report = services.seed(&config.seed).await?;
    tracing::info!(
        admin_id = %report.admin_id,
        permissions = report.permissions,
        "services ready"
    );

    Ok(services)
}
