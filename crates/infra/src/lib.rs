//! Infrastructure layer: storage engines and process wiring.

pub mod memory_store;
pub mod wiring;


pub use memory_store::InMemoryUserStore;
pub use wiring::{InMemoryStack, in_memory};
