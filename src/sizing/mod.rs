pub mod alternatives;
pub mod engine;
pub mod targets;

pub use alternatives::*;
pub use engine::*;
pub use targets::*;
