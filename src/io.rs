//! File input/output.

pub mod table;
pub mod utils;

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;

/// Little- or big-endian byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine the program runs on.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

/// How much information to print while running.
#[derive(Clone)]
pub enum Verbosity {
    /// Print nothing except warnings and errors.
    Quiet,
    /// Print status messages.
    Messages,
    /// Print status messages and show a progress bar with the given style.
    Progress(ProgressStyle),
}

impl fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiet => f.write_str("Quiet"),
            Self::Messages => f.write_str("Messages"),
            Self::Progress(_) => f.write_str("Progress"),
        }
    }
}

impl Verbosity {
    /// Whether non-critical status messages should be printed.
    pub fn print_messages(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Whether a progress bar should be shown.
    pub fn show_progress(&self) -> bool {
        matches!(self, Self::Progress(_))
    }

    /// Creates a progress bar for the given number of steps, which is hidden
    /// unless progress should be shown.
    pub fn create_progress_bar(&self, n_steps: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => ProgressBar::new(n_steps as u64).with_style(style.clone()),
            _ => ProgressBar::hidden(),
        }
    }
}

/// Whether to overwrite existing files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwriteMode {
    Always,
    Never,
}

impl OverwriteMode {
    pub fn is_always(&self) -> bool {
        *self == Self::Always
    }
}
