pub mod builder;
pub mod engine;
pub mod lifecycle;
pub mod tracking;

pub use builder::*;
pub use engine::*;
pub use lifecycle::*;
