pub mod backup;
pub mod error;
pub mod format;
pub mod process;
