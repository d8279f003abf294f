pub mod lifecycle;
pub mod store;

pub use lifecycle::*;
pub use store::*;
