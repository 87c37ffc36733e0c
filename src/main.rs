use std::sync::Arc;

use config::Config;
use repositories::{
    posts_repo::PostsRepository, token_repo::TokenRepository, user_repo::UserRepository,
    PostgresRepo,
};
use routes::create_routes;
use services::{auth::AuthService, posts::PostsService, uploads::ImageStore, user::UserService};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use self::errors::{Error, Result};

mod config;
mod errors;
mod handlers;
mod middleware;
mod models;
mod repositories;
mod routes;
mod services;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth_service: AuthService,
    pub users_service: UserService,
    pub posts_service: PostsService,
}

impl AppState {
    pub fn new<R>(config: Config, repo: Arc<R>) -> Self
    where
        R: UserRepository + PostsRepository + TokenRepository + 'static,
    {
        let images = ImageStore::new(config.upload_dir.clone(), config.max_upload_kb);

        Self {
            auth_service: AuthService::new(
                repo.clone(),
                repo.clone(),
                config.jwt_secret.clone(),
                config.jwt_maxage,
            ),
            users_service: UserService::new(repo.clone(), repo.clone(), images.clone()),
            posts_service: PostsService::new(repo, images),
            config,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("backend_userposts=debug,tower_http=debug")),
        )
        .init();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        error!("Failed to run migrations: {:?}", err);
        std::process::exit(1);
    }

    let port = config.port;
    let app_state = AppState::new(config, Arc::new(PostgresRepo::new(pool)));
    let app = create_routes(Arc::new(app_state));

    let listener = match tokio::net::TcpListener::bind(format!("[::]:{}", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind port {}: {:?}", port, err);
            std::process::exit(1);
        }
    };

    info!("Listening on port {}", port);
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {:?}", err);
    }
}
