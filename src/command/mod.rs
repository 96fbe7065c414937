// ============================================================================
// Command Module - Dispatch with per-command retry policies
// ============================================================================
//
// Commands describe intent. A command may carry its own retry policy
// (RetryableCommand); the dispatcher runs the handler and applies whichever
// policy governs the command.
//
// ============================================================================

pub mod dispatcher;
pub mod retryable;

pub use dispatcher::{CommandDispatcher, RetryResult};
pub use retryable::{Command, RetryableCommand};
