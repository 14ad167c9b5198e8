pub mod highscore_repository;
pub mod quiz_repository;

pub use highscore_repository::*;
pub use quiz_repository::*;
