//! Utilities for input/output.

use super::{OverwriteMode, Verbosity};
use crate::error::{Result, SimulationError};
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};
use tempfile::{NamedTempFile, TempPath};

/// Reads and returns the content of the specified text file.
pub fn read_text_file(file_path: &Path) -> io::Result<String> {
    let file = fs::File::open(file_path)?;
    let mut text = String::new();
    let _ = io::BufReader::new(file).read_to_string(&mut text)?;
    Ok(text)
}

/// Checks whether the file at the given path may be written to.
///
/// Returns an error if the file exists and overwriting is not allowed.
pub fn check_write_allowed(file_path: &Path, overwrite_mode: OverwriteMode) -> Result<()> {
    if file_path.exists() && !overwrite_mode.is_always() {
        Err(SimulationError::OutputExists(file_path.to_path_buf()))
    } else {
        Ok(())
    }
}

/// Context for writing output files.
#[derive(Clone, Debug)]
pub struct IOContext {
    overwrite_mode: OverwriteMode,
}

impl IOContext {
    /// Creates a new context that does not overwrite existing files.
    pub fn new() -> Self {
        Self {
            overwrite_mode: OverwriteMode::Never,
        }
    }

    pub fn overwrite_mode(&self) -> OverwriteMode {
        self.overwrite_mode
    }

    pub fn set_overwrite_mode(&mut self, overwrite_mode: OverwriteMode) {
        self.overwrite_mode = overwrite_mode;
    }

    /// Creates a temporary file next to the given target path, which will be
    /// moved to the target path when closed.
    pub fn create_atomic_output_file(&self, target_path: PathBuf) -> io::Result<AtomicOutputFile> {
        let directory = match target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&directory)?;
        let temporary_path = NamedTempFile::new_in(&directory)?.into_temp_path();
        Ok(AtomicOutputFile {
            temporary_path,
            target_path,
        })
    }

    /// Moves the temporary file to its target path.
    pub fn close_atomic_output_file(&self, atomic_output_file: AtomicOutputFile) -> io::Result<()> {
        atomic_output_file
            .temporary_path
            .persist(&atomic_output_file.target_path)
            .map_err(|err| err.error)
    }
}

impl Default for IOContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Output file that is written to a temporary location and only moved to
/// its target path when complete.
///
/// The temporary file is removed if the object is dropped without being
/// closed.
#[derive(Debug)]
pub struct AtomicOutputFile {
    temporary_path: TempPath,
    target_path: PathBuf,
}

impl AtomicOutputFile {
    pub fn temporary_path(&self) -> &Path {
        &self.temporary_path
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Checks whether the target file may be written, printing a message if
    /// not.
    pub fn check_if_write_allowed(&self, io_context: &IOContext, verbosity: &Verbosity) -> bool {
        match check_write_allowed(&self.target_path, io_context.overwrite_mode()) {
            Ok(()) => true,
            Err(err) => {
                if verbosity.print_messages() {
                    println!("{}", err);
                }
                false
            }
        }
    }
}
