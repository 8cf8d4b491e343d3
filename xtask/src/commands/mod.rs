pub mod completions;
pub mod man;

/// Name of the installed binary.
pub const BIN_NAME: &str = "shelf";
