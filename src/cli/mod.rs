//! Command-line interface for `promquery-poll`.

pub mod poll;
pub mod types;

pub use poll::execute;
pub use types::{parse_label, parse_log_format, Cli, LabelArg};

use crate::domain::errors::PollError;

/// Exit code for a run that hit its deadline before converging
pub const EXIT_DEADLINE: i32 = 2;

/// Exit code for a run cancelled by the user
pub const EXIT_CANCELLED: i32 = 130;

/// Process exit code for a failed run.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<PollError>() {
        Some(PollError::DeadlineExceeded { .. }) => EXIT_DEADLINE,
        Some(PollError::Cancelled { .. }) => EXIT_CANCELLED,
        _ => 1,
    }
}

/// Print the error chain and exit.
pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("Error: {err:#}");
    std::process::exit(exit_code(&err))
}
