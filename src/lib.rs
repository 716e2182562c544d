pub mod anki;
pub mod core;
pub mod note;
pub mod parser;
pub mod renderer;

pub use crate::core::errors::AnkimdError;
