use spotmap_backend::{
    clock::SystemClock,
    config::Config,
    create_app_with_frontend,
    database::{connect, setup_database},
    AppState,
};
use std::env;
use std::sync::Arc;
use tracing::info;

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> shuttle_axum::ShuttleAxum {
    dotenvy::dotenv().ok();

    let config = Config::load(|key| secrets.get(key).or_else(|| env::var(key).ok()))?;

    let pool = connect(&config.database_url).await?;
    let db = setup_database(pool).await?;
    info!("Database ready at {}", config.database_url);

    let app_state = AppState::new(db, &config, Arc::new(SystemClock));
    let app = create_app_with_frontend(app_state, &config);

    Ok(shuttle_axum::AxumService(app))
}
