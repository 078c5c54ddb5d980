use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, App, HttpServer};
use log::{error, info, warn};

use tasknest::auth::{PasswordHasher, TokenCodec};
use tasknest::store::{MemoryStore, PgStore};
use tasknest::{AppState, Config};

fn cors(config: &Config) -> Cors {
    if config.allowed_origins.is_empty() && !config.is_production() {
        return Cors::permissive();
    }
    config
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(3600)
}

async fn build_state(config: &Config) -> io::Result<AppState> {
    let codec = TokenCodec::new(&config.jwt_secret, config.token_lifetime);
    let hasher = PasswordHasher::new(config.bcrypt_cost);

    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            store
                .migrate()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            info!("connected to PostgreSQL, migrations applied");
            let store = Arc::new(store);
            Ok(AppState::new(store.clone(), store, codec, hasher))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok(AppState::new(store.clone(), store, codec, hasher))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    let state = build_state(&config).await?;
    let bind = (config.server_host.clone(), config.server_port);

    info!("Starting TaskNest server at {}", config.server_url());
    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(cors(&config))
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .bind(bind)?
    .run()
    .await
}
