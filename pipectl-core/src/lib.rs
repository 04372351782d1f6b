pub mod binder;
pub mod client;
pub mod error;
pub mod memory;
pub mod model;
pub mod template;
pub mod validation;

#[cfg(test)]
mod memory_test;
#[cfg(test)]
mod validation_test;

pub use error::{AppError, Result};
