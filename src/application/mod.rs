// Application layer - use cases and orchestration over the stores.

mod config;
pub mod error;
mod locks;
mod service;

pub use config::*;
pub use error::*;
pub use service::*;
