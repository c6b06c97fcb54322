//! Runtime loading of the HDF5 shared library.
//!
//! The shim resolves every C entry point it uses once, at [`init`], and
//! keeps the library mapped for the rest of the process. Nothing links
//! against HDF5 at build time.

use std::ffi::{CStr, CString};
use std::os::raw::{c_uint, c_void};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use libloading::Library;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result, check_id, check_status};
use crate::ffi::*;

static LIBRARY: OnceLock<Hdf5Library> = OnceLock::new();
static LOAD_LOCK: Mutex<()> = Mutex::new(());

/// A loaded HDF5 library and the entry points the shim calls.
///
/// Function pointers stay valid for as long as `_lib` is alive, which is
/// the whole process once the handle is stored by [`init`].
pub struct Hdf5Library {
    _lib: Library,
    path: String,
    version: (u32, u32, u32),
    print_errors: bool,

    h5_open: H5openFn,
    h5_close: H5closeFn,
    h5_garbage_collect: H5garbage_collectFn,
    h5_get_libversion: H5get_libversionFn,

    h5i_get_type: H5Iget_typeFn,

    h5t_register: H5TregisterFn,
    h5t_unregister: H5TunregisterFn,
    h5t_find: H5TfindFn,
    h5t_convert: H5TconvertFn,
    h5t_create: H5TcreateFn,
    h5t_copy: H5TcopyFn,
    h5t_close: H5TcloseFn,
    h5t_set_size: H5Tset_sizeFn,
    h5t_get_size: H5Tget_sizeFn,
    h5t_get_class: H5Tget_classFn,
    h5t_is_variable_str: H5Tis_variable_strFn,
    h5t_set_tag: H5Tset_tagFn,
    h5t_c_s1: *const hid_t,

    h5e_set_auto2: H5Eset_auto2Fn,
    h5e_get_auto2: H5Eget_auto2Fn,
    h5e_print2: H5Eprint2Fn,
}

// SAFETY: the struct only holds the library handle, plain function
// pointers and the address of a read-only library global.
unsafe impl Send for Hdf5Library {}
unsafe impl Sync for Hdf5Library {}

impl std::fmt::Debug for Hdf5Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hdf5Library")
            .field("path", &self.path)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Copy a symbol's value (a function pointer or a global's address) out of
/// the library.
///
/// # Safety
///
/// `T` must match the C declaration of `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    // SAFETY: upheld by the caller.
    let sym = unsafe { lib.get::<T>(&bytes) }
        .map_err(|source| Error::MissingSymbol { name, source })?;
    Ok(*sym)
}

impl Hdf5Library {
    /// Load the library at `path` and resolve every entry point.
    ///
    /// This does not call `H5open`; [`init`] does.
    pub fn open(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        // SAFETY: loading HDF5 runs its library constructors, which have no
        // preconditions.
        let lib = unsafe { Library::new(path) }.map_err(|source| Error::Load {
            path: display.clone(),
            source,
        })?;

        // SAFETY: every type below mirrors the HDF5 >= 1.10 declaration.
        unsafe {
            Ok(Self {
                h5_open: symbol(&lib, "H5open")?,
                h5_close: symbol(&lib, "H5close")?,
                h5_garbage_collect: symbol(&lib, "H5garbage_collect")?,
                h5_get_libversion: symbol(&lib, "H5get_libversion")?,
                h5i_get_type: symbol(&lib, "H5Iget_type")?,
                h5t_register: symbol(&lib, "H5Tregister")?,
                h5t_unregister: symbol(&lib, "H5Tunregister")?,
                h5t_find: symbol(&lib, "H5Tfind")?,
                h5t_convert: symbol(&lib, "H5Tconvert")?,
                h5t_create: symbol(&lib, "H5Tcreate")?,
                h5t_copy: symbol(&lib, "H5Tcopy")?,
                h5t_close: symbol(&lib, "H5Tclose")?,
                h5t_set_size: symbol(&lib, "H5Tset_size")?,
                h5t_get_size: symbol(&lib, "H5Tget_size")?,
                h5t_get_class: symbol(&lib, "H5Tget_class")?,
                h5t_is_variable_str: symbol(&lib, "H5Tis_variable_str")?,
                h5t_set_tag: symbol(&lib, "H5Tset_tag")?,
                h5t_c_s1: symbol::<*mut hid_t>(&lib, "H5T_C_S1_g")? as *const hid_t,
                h5e_set_auto2: symbol(&lib, "H5Eset_auto2")?,
                h5e_get_auto2: symbol(&lib, "H5Eget_auto2")?,
                h5e_print2: symbol(&lib, "H5Eprint2")?,
                _lib: lib,
                path: display,
                version: (0, 0, 0),
                print_errors: false,
            })
        }
    }

    /// Path or name the library was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `(major, minor, release)` of the loaded library.
    pub fn version(&self) -> (u32, u32, u32) {
        self.version
    }

    /// Whether [`init`] left HDF5's error printing on.
    pub fn print_errors(&self) -> bool {
        self.print_errors
    }

    // -----------------------------------------------------------------------
    // H5
    // -----------------------------------------------------------------------

    /// `H5open`: initialize the library.
    pub fn h5open(&self) -> Result<()> {
        // SAFETY: no preconditions.
        check_status("H5open", unsafe { (self.h5_open)() }).map(drop)
    }

    /// `H5close`: flush and close every open identifier and release
    /// library memory. Type handles created before this call become
    /// invalid.
    pub fn h5close(&self) -> Result<()> {
        // SAFETY: no preconditions.
        check_status("H5close", unsafe { (self.h5_close)() }).map(drop)
    }

    /// `H5garbage_collect`: release memory held on HDF5's free lists.
    pub fn garbage_collect(&self) -> Result<()> {
        // SAFETY: no preconditions.
        check_status("H5garbage_collect", unsafe { (self.h5_garbage_collect)() }).map(drop)
    }

    /// `H5get_libversion`.
    pub fn query_version(&self) -> Result<(u32, u32, u32)> {
        let (mut maj, mut min, mut rel): (c_uint, c_uint, c_uint) = (0, 0, 0);
        // SAFETY: the out-pointers are valid for writes.
        let status = unsafe { (self.h5_get_libversion)(&mut maj, &mut min, &mut rel) };
        check_status("H5get_libversion", status)?;
        Ok((maj, min, rel))
    }

    // -----------------------------------------------------------------------
    // H5I / H5T
    // -----------------------------------------------------------------------

    /// `H5Iget_type`. Returns `H5I_BADID` for unknown handles.
    pub fn id_type(&self, id: hid_t) -> H5I_type_t {
        // SAFETY: any value is accepted; invalid ids yield H5I_BADID.
        unsafe { (self.h5i_get_type)(id) }
    }

    /// `H5Tget_size`. Zero means the call failed.
    pub fn type_size(&self, type_id: hid_t) -> usize {
        // SAFETY: invalid ids are reported through the return value.
        unsafe { (self.h5t_get_size)(type_id) }
    }

    /// `H5Tget_class`.
    pub fn type_class(&self, type_id: hid_t) -> H5T_class_t {
        // SAFETY: invalid ids yield H5T_NO_CLASS.
        unsafe { (self.h5t_get_class)(type_id) }
    }

    /// `H5Tis_variable_str`. Negative means the call failed.
    pub fn is_variable_str(&self, type_id: hid_t) -> htri_t {
        // SAFETY: invalid ids are reported through the return value.
        unsafe { (self.h5t_is_variable_str)(type_id) }
    }

    /// The predefined `H5T_C_S1` type.
    pub fn c_s1(&self) -> Result<hid_t> {
        // The global is only valid once the library is open; H5close resets it.
        self.h5open()?;
        // SAFETY: the address came from the library and H5open has run.
        check_id("H5T_C_S1", unsafe { *self.h5t_c_s1 })
    }

    /// `H5Tcreate`.
    pub fn create_type(&self, class: H5T_class_t, size: usize) -> Result<hid_t> {
        // SAFETY: no pointer arguments.
        check_id("H5Tcreate", unsafe { (self.h5t_create)(class, size) })
    }

    /// `H5Tcopy`.
    pub fn copy_type(&self, type_id: hid_t) -> Result<hid_t> {
        // SAFETY: no pointer arguments.
        check_id("H5Tcopy", unsafe { (self.h5t_copy)(type_id) })
    }

    /// `H5Tclose`.
    pub fn close_type(&self, type_id: hid_t) -> Result<()> {
        // SAFETY: no pointer arguments.
        check_status("H5Tclose", unsafe { (self.h5t_close)(type_id) }).map(drop)
    }

    /// `H5Tset_size`.
    pub fn set_type_size(&self, type_id: hid_t, size: usize) -> Result<()> {
        // SAFETY: no pointer arguments.
        check_status("H5Tset_size", unsafe { (self.h5t_set_size)(type_id, size) }).map(drop)
    }

    /// `H5Tset_tag`. Fails with [`Error::InvalidString`] if `tag` holds a
    /// NUL byte.
    pub fn set_type_tag(&self, type_id: hid_t, tag: &str) -> Result<()> {
        let tag = CString::new(tag)?;
        // SAFETY: `tag` is NUL-terminated and outlives the call.
        check_status("H5Tset_tag", unsafe { (self.h5t_set_tag)(type_id, tag.as_ptr()) }).map(drop)
    }

    /// `H5Tregister`, status returned verbatim.
    pub fn register_raw(
        &self,
        pers: H5T_pers_t,
        name: &CStr,
        src_id: hid_t,
        dst_id: hid_t,
        func: H5T_conv_t,
    ) -> herr_t {
        // SAFETY: `name` is NUL-terminated; HDF5 copies it.
        unsafe { (self.h5t_register)(pers, name.as_ptr(), src_id, dst_id, func) }
    }

    /// `H5Tunregister`, status returned verbatim.
    pub fn unregister_raw(
        &self,
        pers: H5T_pers_t,
        name: &CStr,
        src_id: hid_t,
        dst_id: hid_t,
        func: Option<H5T_conv_t>,
    ) -> herr_t {
        // SAFETY: `name` is NUL-terminated and outlives the call.
        unsafe { (self.h5t_unregister)(pers, name.as_ptr(), src_id, dst_id, func) }
    }

    /// `H5Tfind`: the conversion function HDF5 would use for a pair.
    pub fn find(&self, src_id: hid_t, dst_id: hid_t) -> Option<H5T_conv_t> {
        let mut cdata: *mut H5T_cdata_t = std::ptr::null_mut();
        // SAFETY: the out-pointer is valid for writes; the returned cdata is
        // owned by HDF5 and not touched here.
        unsafe { (self.h5t_find)(src_id, dst_id, &mut cdata) }
    }

    /// `H5Tconvert` over a raw buffer.
    ///
    /// # Safety
    ///
    /// `buf` must hold `nelmts` elements of the larger of the two type
    /// sizes; `background` must be null or sized likewise.
    pub unsafe fn convert_raw(
        &self,
        src_id: hid_t,
        dst_id: hid_t,
        nelmts: usize,
        buf: *mut c_void,
        background: *mut c_void,
    ) -> Result<()> {
        // SAFETY: upheld by the caller.
        let status =
            unsafe { (self.h5t_convert)(src_id, dst_id, nelmts, buf, background, H5P_DEFAULT) };
        check_status("H5Tconvert", status).map(drop)
    }

    // -----------------------------------------------------------------------
    // H5E
    // -----------------------------------------------------------------------

    /// `H5Eset_auto2` on the default error stack.
    pub fn set_auto(&self, func: H5E_auto2_t, client_data: *mut c_void) -> herr_t {
        // SAFETY: HDF5 stores the pointers; a null func disables printing.
        unsafe { (self.h5e_set_auto2)(H5E_DEFAULT, func, client_data) }
    }

    /// `H5Eget_auto2` on the default error stack.
    pub fn get_auto(&self) -> Result<(H5E_auto2_t, *mut c_void)> {
        let mut func: H5E_auto2_t = None;
        let mut data: *mut c_void = std::ptr::null_mut();
        // SAFETY: the out-pointers are valid for writes.
        let status = unsafe { (self.h5e_get_auto2)(H5E_DEFAULT, &mut func, &mut data) };
        check_status("H5Eget_auto2", status)?;
        Ok((func, data))
    }

    /// HDF5's default error printer, as an automatic error callback.
    pub fn default_printer(&self) -> H5E_auto2_t {
        Some(self.h5e_print2)
    }
}

/// Load HDF5 once per process, initialize it and apply `config`.
///
/// Later calls return the handle loaded by the first successful call and
/// ignore `config`.
pub fn init(config: &Config) -> Result<&'static Hdf5Library> {
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }
    let _guard = LOAD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let mut tried = Vec::new();
    let mut lib = None;
    for candidate in config.candidates() {
        match Hdf5Library::open(&candidate) {
            Ok(l) => {
                lib = Some(l);
                break;
            }
            Err(e) => {
                debug!(candidate = %candidate.display(), error = %e, "HDF5 candidate rejected");
                if config.library_path.is_some() {
                    return Err(e);
                }
                tried.push(candidate.display().to_string());
            }
        }
    }
    let mut lib = lib.ok_or(Error::LibraryNotFound { tried })?;

    lib.h5open()?;
    let version = lib.query_version()?;
    if version < (1, 10, 0) {
        return Err(Error::UnsupportedVersion(version.0, version.1, version.2));
    }
    lib.version = version;
    lib.print_errors = config.print_errors;
    debug!(path = %lib.path, ?version, "HDF5 library loaded");

    let lib = LIBRARY.get_or_init(|| lib);
    crate::diagnostics::display_errors_with(lib, lib.print_errors)?;
    Ok(lib)
}

/// The library loaded by [`init`].
pub fn library() -> Result<&'static Hdf5Library> {
    LIBRARY.get().ok_or(Error::NotInitialized)
}

/// The library loaded by [`init`], if any.
pub fn loaded() -> Option<&'static Hdf5Library> {
    LIBRARY.get()
}
