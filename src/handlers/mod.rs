use uuid::Uuid;

use crate::{Error, Result};

pub mod auth;
pub mod posts;
pub mod user;

#[cfg(test)]
mod tests;

/// Parses a path id; anything that is not a valid id cannot exist.
fn parse_id(id: &str, not_found: &'static str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| Error::NotFound(not_found))
}
