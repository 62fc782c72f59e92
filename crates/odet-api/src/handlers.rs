//! Request handlers.

pub mod detect;
pub mod health;
pub mod model;

pub use detect::*;
pub use health::*;
pub use model::*;
