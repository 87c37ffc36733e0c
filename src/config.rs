use std::{env, path::PathBuf};

use axum_extra::extract::cookie::SameSite;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token and cookie lifetime, in minutes.
    pub jwt_maxage: i64,
    pub port: u16,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub upload_dir: PathBuf,
    pub max_upload_kb: usize,
    pub frontend_url: Option<String>,
}

impl Config {
    pub fn init() -> Config {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: parse_var("JWT_MAXAGE").unwrap_or(1440),
            port: parse_var("PORT").unwrap_or(8080),
            cookie_secure: env::var("SESSION_SECURE_COOKIE")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            cookie_same_site: env::var("SESSION_SAME_SITE")
                .ok()
                .and_then(|v| parse_same_site(&v))
                .unwrap_or(SameSite::Lax),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage")),
            max_upload_kb: parse_var("MAX_UPLOAD_KB").unwrap_or(2048),
            frontend_url: env::var("FRONTEND_URL").ok().filter(|v| !v.is_empty()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        "none" => Some(SameSite::None),
        _ => None,
    }
}
