//! HDF5's automatic error printing.
//!
//! With printing on, HDF5 dumps its error stack to stderr whenever a call
//! fails. [`silence`] clears the handler and [`unsilence`] installs
//! `H5Eprint2` again. Both act on process-wide library state.

use std::os::raw::c_void;
use std::ptr;

use tracing::debug;

use crate::error::{Result, check_status};
use crate::ffi::H5E_auto2_t;
use crate::library::{Hdf5Library, library};

/// Stop HDF5 from printing its error stack.
pub fn silence() -> Result<()> {
    silence_with(library()?)
}

/// Print HDF5's error stack to stderr again.
pub fn unsilence() -> Result<()> {
    unsilence_with(library()?)
}

/// Turn HDF5's error printing on or off.
pub fn display_errors(on: bool) -> Result<()> {
    display_errors_with(library()?, on)
}

/// Whether HDF5's error printing is currently off.
pub fn is_silenced() -> Result<bool> {
    let (func, _) = library()?.get_auto()?;
    Ok(func.is_none())
}

pub(crate) fn silence_with(lib: &Hdf5Library) -> Result<()> {
    check_status("H5Eset_auto2", lib.set_auto(None, ptr::null_mut()))?;
    debug!("HDF5 error printing off");
    Ok(())
}

pub(crate) fn unsilence_with(lib: &Hdf5Library) -> Result<()> {
    // A null client data pointer makes H5Eprint2 write to stderr.
    check_status(
        "H5Eset_auto2",
        lib.set_auto(lib.default_printer(), ptr::null_mut()),
    )?;
    debug!("HDF5 error printing on");
    Ok(())
}

pub(crate) fn display_errors_with(lib: &Hdf5Library, on: bool) -> Result<()> {
    if on {
        unsilence_with(lib)
    } else {
        silence_with(lib)
    }
}

/// Silences HDF5's error printing until dropped, then restores whatever
/// handler was installed before.
#[must_use = "printing is restored as soon as the guard is dropped"]
pub struct SilenceGuard {
    lib: &'static Hdf5Library,
    previous: (H5E_auto2_t, *mut c_void),
}

impl SilenceGuard {
    /// Save the current handler and silence.
    pub fn new() -> Result<Self> {
        let lib = library()?;
        let previous = lib.get_auto()?;
        silence_with(lib)?;
        Ok(Self { lib, previous })
    }
}

impl Drop for SilenceGuard {
    fn drop(&mut self) {
        let (func, data) = self.previous;
        if self.lib.set_auto(func, data) < 0 {
            debug!("failed to restore HDF5 error handler");
        }
    }
}

impl std::fmt::Debug for SilenceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilenceGuard")
            .field("previous_enabled", &self.previous.0.is_some())
            .finish()
    }
}

/// Run `f` with HDF5's error printing off, restoring it afterwards.
pub fn with_silenced<T>(f: impl FnOnce() -> T) -> Result<T> {
    let _guard = SilenceGuard::new()?;
    Ok(f())
}
