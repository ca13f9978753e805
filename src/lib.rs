//! Driver for the ingot AOT compiler: CLI surface, module loading, the
//! reference backend and the flat object writer.

pub mod backend;
pub mod cli;
pub mod commands;
pub mod emit;
pub mod errors;

pub use backend::SummaryBackend;
pub use emit::FlatObjectWriter;
pub use errors::{DriverError, DriverResult};
