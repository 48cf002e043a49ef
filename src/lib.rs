pub mod classify;
pub mod config;
pub mod db;
pub mod discord;
pub mod error;
pub mod gate;
pub mod scope;
pub mod scraper;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ScrapeError;
