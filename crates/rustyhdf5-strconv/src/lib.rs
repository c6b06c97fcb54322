//! String conversion and error-printer control for the HDF5 C library.
//!
//! The crate loads HDF5 at runtime and does two things with it:
//!
//! - registers a soft datatype conversion, named `"gostring->cstring"`,
//!   that turns `(pointer, length)` string headers ([`StrHeader`]) into
//!   NUL-terminated C strings during HDF5 conversions;
//! - switches HDF5's automatic error-stack printing off and on.
//!
//! ```no_run
//! use rustyhdf5_strconv::{Config, convert_strs, init};
//!
//! init(&Config::from_env()).unwrap();
//! let out = convert_strs(&["hello"]).unwrap();
//! assert_eq!(out[0].bytes_with_nul(), b"hello\0");
//! ```
//!
//! Strings produced by the converter are allocated with `calloc` and owned
//! by whoever receives the converted buffer; release them with `free`
//! ([`release_cstring`], or drop a [`ConvertedString`]).

pub mod config;
pub mod convert;
pub mod datatype;
pub mod diagnostics;
pub mod error;
pub mod ffi;
pub mod header;
pub mod library;
pub mod registry;

pub use config::Config;
pub use convert::{
    CONVERTER_NAME, Command, Rejection, TypeDescriptor, TypeResolver, convert_str_to_cstring,
    release_cstring,
};
pub use datatype::{
    ConvertedString, Datatype, StringConversion, convert_strs, str_header_type,
    variable_cstring_type,
};
pub use diagnostics::{
    SilenceGuard, display_errors, is_silenced, silence, unsilence, with_silenced,
};
pub use error::{Error, Result};
pub use header::{STR_HEADER_SIZE, StrHeader};
pub use library::{Hdf5Library, init, library};
pub use registry::{Registrar, Registration, register};

/// HDF5 version as `(major, minor, release)`.
pub fn hdf5_version() -> Result<(u32, u32, u32)> {
    Ok(library()?.version())
}

/// Release memory held on HDF5's internal free lists.
pub fn garbage_collect() -> Result<()> {
    library()?.garbage_collect()
}

/// Flush and close every open HDF5 identifier, then reopen the library.
///
/// Registered conversions and type handles from before this call are gone.
/// HDF5 resets its error printer when it reinitializes, so the printing
/// state chosen at [`init`] is applied again.
pub fn close() -> Result<()> {
    let lib = library()?;
    lib.h5close()?;
    registry::forget_all();
    datatype::forget_shared();
    lib.h5open()?;
    diagnostics::display_errors_with(lib, lib.print_errors())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_helpers_need_a_loaded_library() {
        if library::loaded().is_some() {
            return;
        }
        assert!(matches!(hdf5_version(), Err(Error::NotInitialized)));
        assert!(matches!(garbage_collect(), Err(Error::NotInitialized)));
        assert!(matches!(close(), Err(Error::NotInitialized)));
    }

    #[test]
    fn converter_name_is_stable() {
        assert_eq!(CONVERTER_NAME.to_bytes(), b"gostring->cstring");
    }
}
