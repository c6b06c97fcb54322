//! Registration of the string converter in HDF5's soft conversion table.
//!
//! HDF5's table is process-wide, so this module keeps a matching
//! process-wide ledger of the `(source, destination)` pairs it installed.
//! Registering a pair twice is a no-op instead of a second `H5Tregister`.

use std::sync::Mutex;

use tracing::debug;

use crate::convert::{CONVERTER_NAME, convert_str_to_cstring};
use crate::error::{Result, check_status};
use crate::ffi::{H5T_PERS_SOFT, H5T_conv_t, herr_t, hid_t};
use crate::library::{Hdf5Library, library};

static INSTALLED: Mutex<Vec<(hid_t, hid_t)>> = Mutex::new(Vec::new());

/// Outcome of [`Registrar::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// `H5Tregister` was called and succeeded.
    Installed,
    /// The pair was already installed by this process.
    AlreadyInstalled,
}

/// The conversion function as HDF5 sees it.
pub fn converter() -> H5T_conv_t {
    convert_str_to_cstring
}

/// Register the converter for `(src_id, dst_id)` as a soft conversion and
/// return HDF5's status verbatim.
///
/// No ledger bookkeeping happens here; repeated calls reach HDF5 each time.
pub fn register_raw(lib: &Hdf5Library, src_id: hid_t, dst_id: hid_t) -> herr_t {
    debug!(src_id, dst_id, name = ?CONVERTER_NAME, "registering soft conversion");
    lib.register_raw(H5T_PERS_SOFT, CONVERTER_NAME, src_id, dst_id, converter())
}

/// Idempotent front end to the soft conversion table.
///
/// The registered converter resolves handles through the library loaded by
/// [`crate::init`], so registrars only exist for that handle.
#[derive(Debug, Clone, Copy)]
pub struct Registrar<'a> {
    lib: &'a Hdf5Library,
}

impl Registrar<'static> {
    /// Registrar over the library loaded by [`crate::init`].
    pub fn global() -> Result<Self> {
        Ok(Self { lib: library()? })
    }
}

impl<'a> Registrar<'a> {
    /// Registrar over the handle returned by [`crate::init`].
    pub(crate) fn new(lib: &'a Hdf5Library) -> Self {
        Self { lib }
    }

    /// Install the converter for `(src_id, dst_id)` unless this process
    /// already did.
    ///
    /// A negative `H5Tregister` status comes back as
    /// [`crate::Error::Status`] with the code unchanged, and the pair is not
    /// recorded.
    pub fn register(&self, src_id: hid_t, dst_id: hid_t) -> Result<Registration> {
        let mut installed = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
        if installed.contains(&(src_id, dst_id)) {
            return Ok(Registration::AlreadyInstalled);
        }
        check_status("H5Tregister", register_raw(self.lib, src_id, dst_id))?;
        installed.push((src_id, dst_id));
        Ok(Registration::Installed)
    }

    /// Remove the converter for the type classes of `(src_id, dst_id)`.
    ///
    /// HDF5 drops every soft entry for this function whose classes match,
    /// which may cover pairs registered separately, so the whole ledger is
    /// reset and later [`Registrar::register`] calls reach HDF5 again.
    pub fn unregister(&self, src_id: hid_t, dst_id: hid_t) -> Result<()> {
        let mut installed = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
        let status = self.lib.unregister_raw(
            H5T_PERS_SOFT,
            CONVERTER_NAME,
            src_id,
            dst_id,
            Some(converter()),
        );
        check_status("H5Tunregister", status)?;
        installed.clear();
        debug!(src_id, dst_id, "unregistered soft conversion");
        Ok(())
    }

    /// Whether this process installed the converter for the pair.
    pub fn is_installed(&self, src_id: hid_t, dst_id: hid_t) -> bool {
        INSTALLED
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(src_id, dst_id))
    }

    /// Whether HDF5 currently resolves the pair to this converter.
    pub fn is_active(&self, src_id: hid_t, dst_id: hid_t) -> bool {
        self.lib
            .find(src_id, dst_id)
            .is_some_and(|f| f as usize == converter() as usize)
    }
}

/// Clear the ledger after `H5close` wiped HDF5's conversion table.
pub(crate) fn forget_all() {
    INSTALLED.lock().unwrap_or_else(|e| e.into_inner()).clear();
}

/// Register the converter with the library loaded by [`crate::init`].
pub fn register(src_id: hid_t, dst_id: hid_t) -> Result<Registration> {
    Registrar::global()?.register(src_id, dst_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn converter_is_the_exported_function() {
        assert_eq!(converter() as usize, convert_str_to_cstring as usize);
    }

    #[test]
    fn register_without_library_fails() {
        if crate::library::loaded().is_some() {
            return;
        }
        assert!(matches!(register(1, 2), Err(Error::NotInitialized)));
    }

    #[test]
    fn registrars_come_from_the_loaded_library() {
        match crate::library::loaded() {
            Some(lib) => {
                let global = Registrar::global().unwrap();
                assert!(std::ptr::eq(global.lib, lib));
            }
            None => assert!(matches!(Registrar::global(), Err(Error::NotInitialized))),
        }
    }
}
