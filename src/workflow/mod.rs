pub mod retry;
pub mod title;

pub use retry::{failure_message, retry_with_backoff, RetryHarness, RetryPolicy};
pub use title::{clean_label, TitleClassifier, FALLBACK_LABEL};
