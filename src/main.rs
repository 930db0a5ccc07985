use dotenvy::dotenv;
use order_buddy::{
    config::{catalog, database, settings::Settings},
    core::SeaOrmBackend,
    errors::Result,
    storage::LocalStore,
    store::Store,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Radius used for the startup summary of nearby restaurants.
const NEARBY_RADIUS_KM: f64 = 10.0;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();
    let settings = Settings::from_env();

    // 3. Connect and make sure the tables exist
    let db = database::connect(&settings.backend_url)
        .await
        .inspect_err(|e| error!("Failed to connect to backend: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Backend tables ready"))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    let backend = Arc::new(SeaOrmBackend::new(db));

    // 4. Seed the catalog into an empty backend
    if let Some(path) = &settings.catalog_path {
        let loaded = catalog::load_catalog(path)?;
        catalog::seed_catalog(&*backend, &loaded)
            .await
            .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
    }

    // 5. Build the state container the views talk to
    let local = LocalStore::new(&settings.storage_path);
    if local.remember_me() {
        info!("A previous session asked to be remembered");
    }
    let store = Store::new(backend).with_local_store(local);
    let restaurants = store.load_restaurants().await;
    info!("{} restaurants available", restaurants.len());

    if let Some(location) = store.user_location() {
        let nearby = store.restaurants_near_user(NEARBY_RADIUS_KM);
        info!(
            "{} restaurants within {} km of {}",
            nearby.len(),
            NEARBY_RADIUS_KM,
            location.address.as_deref().unwrap_or("the saved location")
        );
    }
    for notice in store.take_notices() {
        info!("{:?}: {}", notice.level, notice.message);
    }

    Ok(())
}
