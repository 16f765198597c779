pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod pagination;
pub mod policy;
pub mod profile;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod transition;
pub mod types;
pub mod upload;

pub use error::{MarketError, MarketResult};
pub use identity::{Identity, Role};
pub use service::MarketService;
