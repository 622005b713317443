#[allow(clippy::module_inception)]
pub mod engine;
pub mod transaction;
pub mod worker;


pub use engine::Engine;
