pub mod persistence;
pub mod bus;
pub mod registry;
pub mod store;

pub use persistence::*;
pub use bus::*;
pub use registry::*;
pub use store::*;
