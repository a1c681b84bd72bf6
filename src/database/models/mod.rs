pub mod attendance;
pub mod employee;
pub mod holiday;
pub mod leave;
pub(crate) mod macros;
pub mod office;
pub mod transaction;

// Re-export all models for easy importing
pub use attendance::*;
pub use employee::*;
pub use holiday::*;
pub use leave::*;
pub use office::*;
pub use transaction::*;
