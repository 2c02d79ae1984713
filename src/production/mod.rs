pub mod client;
pub mod degradation;
pub mod error;
pub mod estimator;
pub mod losses;
pub mod synthetic;

pub use client::*;
pub use degradation::*;
pub use error::*;
pub use estimator::*;
pub use losses::*;
pub use synthetic::*;
