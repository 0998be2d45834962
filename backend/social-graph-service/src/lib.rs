pub mod api;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod media;
pub mod push;
pub mod repository;
pub mod services;

pub use api::SocialApi;
pub use config::Config;
pub use context::ServiceContext;
pub use error::{ServiceError, ServiceResult};
