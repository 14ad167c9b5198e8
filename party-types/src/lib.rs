pub mod messages;
pub mod player;
pub mod quiz;
pub mod room;

// Re-export all types
pub use messages::*;
pub use player::*;
pub use quiz::*;
pub use room::*;
