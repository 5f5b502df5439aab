pub mod executor;
pub mod retry;
pub mod transport;

pub use executor::*;
pub use retry::*;
pub use transport::*;
