//! Image cache gateway: canonical keys and per-family freshness strategies.

pub mod gateway;
pub mod keys;

pub use gateway::{ImageGateway, CONTENT_IMAGES_CACHE};
