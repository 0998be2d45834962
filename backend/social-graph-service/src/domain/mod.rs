pub mod models;
pub mod views;

pub use models::*;
pub use views::*;
