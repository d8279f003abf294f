pub mod projection;
pub mod progress;

pub use projection::*;
pub use progress::*;
