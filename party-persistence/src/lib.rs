pub mod repositories;
pub mod store;

pub use repositories::*;
pub use store::*;
