//! Compiler from stored records to the proxy engine's JSON configuration.

pub mod dns;
pub mod document;
pub mod outbound;
pub mod pac;
pub mod routing;
pub mod transport;
pub mod types;

pub use document::{compile_document, speed_test_document, speed_test_filename, CompileInputs};
pub use pac::PacRules;
pub use types::RayDocument;
