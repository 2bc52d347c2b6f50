pub mod config;
pub mod logging;

pub mod batch;
pub mod cancel;
pub mod client;
pub mod content_disposition;
pub mod error;
pub mod files;
pub mod image_folder;
pub mod models;
pub mod retry;
pub mod storage;
pub mod transport;

pub use error::{RedactError, Result};
