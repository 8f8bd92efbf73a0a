//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{calculate_checksum, collect_files, file_extension, file_name, read_file_bytes};
pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
pub use text::{TRUNCATION_MARKER, is_blank, preview};
