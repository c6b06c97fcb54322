//! Error types for the HDF5 string conversion shim.

use std::ffi::NulError;
use std::fmt;

use crate::ffi::{herr_t, hid_t};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported on the Rust side of the shim.
///
/// Nothing here crosses the C boundary: the conversion function reports
/// failures to HDF5 as a negative `herr_t` only.
#[derive(Debug)]
pub enum Error {
    /// No candidate path for the HDF5 shared library could be loaded.
    LibraryNotFound {
        /// Every path or library name that was tried, in order.
        tried: Vec<String>,
    },
    /// The shared library was found but could not be loaded.
    Load {
        /// Path or name passed to the loader.
        path: String,
        /// Loader error.
        source: libloading::Error,
    },
    /// A required C entry point is missing from the loaded library.
    MissingSymbol {
        /// Symbol name.
        name: &'static str,
        /// Loader error.
        source: libloading::Error,
    },
    /// The loaded HDF5 is older than 1.10.
    UnsupportedVersion(u32, u32, u32),
    /// The library has not been loaded with [`crate::init`].
    NotInitialized,
    /// An HDF5 call returned a negative status.
    Status {
        /// Name of the C function.
        call: &'static str,
        /// Status code, verbatim.
        code: herr_t,
    },
    /// An HDF5 call that creates an identifier returned an invalid one.
    InvalidId {
        /// Name of the C function.
        call: &'static str,
        /// The identifier returned.
        id: hid_t,
    },
    /// A string passed to HDF5 contained an interior NUL byte.
    InvalidString(NulError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LibraryNotFound { tried } => {
                write!(f, "HDF5 library not found (tried: {})", tried.join(", "))
            }
            Error::Load { path, source } => {
                write!(f, "failed to load HDF5 library {path}: {source}")
            }
            Error::MissingSymbol { name, source } => {
                write!(f, "HDF5 symbol {name} not found: {source}")
            }
            Error::UnsupportedVersion(maj, min, rel) => {
                write!(f, "unsupported HDF5 version {maj}.{min}.{rel} (need 1.10 or later)")
            }
            Error::NotInitialized => write!(f, "HDF5 library not initialized"),
            Error::Status { call, code } => write!(f, "{call} failed with status {code}"),
            Error::InvalidId { call, id } => write!(f, "{call} returned invalid id {id}"),
            Error::InvalidString(e) => write!(f, "invalid C string: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Load { source, .. } | Error::MissingSymbol { source, .. } => Some(source),
            Error::InvalidString(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NulError> for Error {
    fn from(e: NulError) -> Self {
        Error::InvalidString(e)
    }
}

/// Map a raw `herr_t` to a result; negative values are failures.
pub fn check_status(call: &'static str, code: herr_t) -> Result<herr_t> {
    if code < 0 {
        Err(Error::Status { call, code })
    } else {
        Ok(code)
    }
}

/// Map a raw `hid_t` to a result; negative values are failures.
pub fn check_id(call: &'static str, id: hid_t) -> Result<hid_t> {
    if id < 0 {
        Err(Error::InvalidId { call, id })
    } else {
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::ffi::CString;

    #[test]
    fn negative_status_is_error() {
        let err = check_status("H5Tregister", -1).unwrap_err();
        assert!(matches!(err, Error::Status { call: "H5Tregister", code: -1 }));
        assert_eq!(err.to_string(), "H5Tregister failed with status -1");
    }

    #[test]
    fn non_negative_status_passes_through() {
        assert_eq!(check_status("H5open", 0).unwrap(), 0);
        assert_eq!(check_status("H5Tis_variable_str", 1).unwrap(), 1);
    }

    #[test]
    fn invalid_id() {
        let err = check_id("H5Tcopy", -1).unwrap_err();
        assert_eq!(err.to_string(), "H5Tcopy returned invalid id -1");
        assert_eq!(check_id("H5Tcopy", 42).unwrap(), 42);
    }

    #[test]
    fn library_not_found_lists_candidates() {
        let err = Error::LibraryNotFound {
            tried: vec!["libhdf5.so".into(), "libhdf5_serial.so".into()],
        };
        assert_eq!(
            err.to_string(),
            "HDF5 library not found (tried: libhdf5.so, libhdf5_serial.so)"
        );
    }

    #[test]
    fn nul_error_converts_and_keeps_source() {
        let nul = CString::new("a\0b").unwrap_err();
        let err: Error = nul.into();
        assert!(err.to_string().starts_with("invalid C string"));
        assert!(err.source().is_some());
    }

    #[test]
    fn unsupported_version_display() {
        let err = Error::UnsupportedVersion(1, 8, 22);
        assert_eq!(
            err.to_string(),
            "unsupported HDF5 version 1.8.22 (need 1.10 or later)"
        );
    }
}
