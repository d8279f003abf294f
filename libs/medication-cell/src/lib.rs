pub mod models;
pub mod seed;
pub mod services;

pub use models::*;
pub use services::*;
