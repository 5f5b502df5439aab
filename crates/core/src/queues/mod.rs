pub mod event_buffer;

pub use event_buffer::*;
