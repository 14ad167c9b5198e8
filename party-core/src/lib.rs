pub mod error;
pub mod room;
pub mod rules;
pub mod scoring;
pub mod store;

// Re-export main components
pub use error::*;
pub use room::*;
pub use rules::*;
pub use scoring::*;
pub use store::*;
