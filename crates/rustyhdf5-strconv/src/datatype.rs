//! Datatypes the converter is registered for, and a safe front end that
//! runs an in-memory conversion through HDF5.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::Mutex;

use tracing::debug;

use crate::convert::{CSTRING_ELEMENT_SIZE, release_cstring};
use crate::error::Result;
use crate::ffi::{H5T_OPAQUE, H5T_VARIABLE, hid_t};
use crate::header::{STR_HEADER_SIZE, StrHeader};
use crate::library::{Hdf5Library, library};
use crate::registry::Registrar;

static SHARED: Mutex<Option<StringConversion>> = Mutex::new(None);

/// Tag attached to the opaque source type.
pub const STR_HEADER_TAG: &str = "rust:str-header";

/// An owned HDF5 datatype handle, closed on drop.
#[derive(Debug)]
pub struct Datatype {
    id: hid_t,
    lib: &'static Hdf5Library,
}

impl Datatype {
    /// The raw handle.
    pub fn id(&self) -> hid_t {
        self.id
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        self.lib.type_size(self.id)
    }

    /// Whether this is a variable-length string type.
    pub fn is_variable_str(&self) -> bool {
        self.lib.is_variable_str(self.id) > 0
    }

    /// Attach an opaque-type tag.
    pub fn set_tag(&self, tag: &str) -> Result<()> {
        self.lib.set_type_tag(self.id, tag)
    }
}

impl Drop for Datatype {
    fn drop(&mut self) {
        if let Err(e) = self.lib.close_type(self.id) {
            debug!(id = self.id, error = %e, "closing datatype failed");
        }
    }
}

/// Opaque type one [`StrHeader`] wide, tagged [`STR_HEADER_TAG`]: the
/// source side of the conversion.
pub fn str_header_type() -> Result<Datatype> {
    let lib = library()?;
    let dt = Datatype {
        id: lib.create_type(H5T_OPAQUE, STR_HEADER_SIZE)?,
        lib,
    };
    dt.set_tag(STR_HEADER_TAG)?;
    Ok(dt)
}

/// Copy of `H5T_C_S1` with variable size: the destination side of the
/// conversion, one `char *` per element.
pub fn variable_cstring_type() -> Result<Datatype> {
    let lib = library()?;
    let dt = Datatype {
        id: lib.copy_type(lib.c_s1()?)?,
        lib,
    };
    lib.set_type_size(dt.id, H5T_VARIABLE)?;
    Ok(dt)
}

/// A NUL-terminated string allocated by the converter. Freed on drop.
///
/// The converter copies every source byte, interior NULs included, so the
/// length of the source is kept alongside the pointer.
#[derive(Debug)]
pub struct ConvertedString {
    ptr: *mut c_char,
    len: usize,
}

impl ConvertedString {
    /// Take ownership of a pointer written by the converter, measuring the
    /// string up to its first NUL.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null, come from the converter and not be owned by
    /// anything else.
    pub unsafe fn from_raw(ptr: *mut c_char) -> Self {
        // SAFETY: upheld by the caller; the converter writes a terminator.
        let len = unsafe { CStr::from_ptr(ptr) }.to_bytes().len();
        Self { ptr, len }
    }

    /// Take ownership of a pointer written by the converter for a source
    /// of `len` bytes.
    ///
    /// # Safety
    ///
    /// As for [`ConvertedString::from_raw`]; `ptr` must also hold `len + 1`
    /// bytes.
    pub unsafe fn from_raw_parts(ptr: *mut c_char, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Number of bytes copied from the source, without the terminator.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the source string was empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every copied byte, without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes_with_nul()[..self.len]
    }

    /// Every copied byte plus the terminator.
    pub fn bytes_with_nul(&self) -> &[u8] {
        // SAFETY: the allocation holds len bytes and a terminator.
        unsafe { std::slice::from_raw_parts(self.ptr.cast::<u8>(), self.len + 1) }
    }

    /// The string as C code sees it: up to the first NUL, which is earlier
    /// than [`ConvertedString::len`] when the source held interior NULs.
    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the converter always writes a terminator.
        unsafe { CStr::from_ptr(self.ptr) }
    }

    /// Give the pointer back to the caller, who must free it.
    pub fn into_raw(self) -> *mut c_char {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for ConvertedString {
    fn drop(&mut self) {
        // SAFETY: the pointer is owned and came from calloc.
        unsafe { release_cstring(self.ptr) }
    }
}

/// A source/destination type pair with the converter registered for it.
#[derive(Debug)]
pub struct StringConversion {
    src: Datatype,
    dst: Datatype,
}

impl StringConversion {
    /// Create the source and destination types and register the converter
    /// for them.
    pub fn new() -> Result<Self> {
        let src = str_header_type()?;
        let dst = variable_cstring_type()?;
        Registrar::new(src.lib).register(src.id, dst.id)?;
        Ok(Self { src, dst })
    }

    /// Source type handle.
    pub fn source(&self) -> &Datatype {
        &self.src
    }

    /// Destination type handle.
    pub fn destination(&self) -> &Datatype {
        &self.dst
    }

    /// Convert `values` to C strings through `H5Tconvert`.
    ///
    /// Re-registers the converter first if the ledger was reset by
    /// [`Registrar::unregister`].
    pub fn convert(&self, values: &[&str]) -> Result<Vec<ConvertedString>> {
        Registrar::new(self.src.lib).register(self.src.id, self.dst.id)?;
        let step = STR_HEADER_SIZE.max(CSTRING_ELEMENT_SIZE);
        let mut buf = vec![0u8; values.len() * step];
        for (i, v) in values.iter().enumerate() {
            // SAFETY: element i lies within `buf`.
            unsafe {
                let slot = buf.as_mut_ptr().add(i * STR_HEADER_SIZE);
                ptr::write_unaligned(slot.cast(), StrHeader::new(v));
            }
        }

        // SAFETY: `buf` holds one header-sized slot per element.
        unsafe {
            self.src.lib.convert_raw(
                self.src.id,
                self.dst.id,
                values.len(),
                buf.as_mut_ptr().cast::<c_void>(),
                ptr::null_mut(),
            )?;
        }

        let out = (0..values.len())
            .map(|i| {
                // SAFETY: the converter wrote one pointer per element.
                unsafe {
                    let slot = buf.as_ptr().add(i * CSTRING_ELEMENT_SIZE);
                    let p = ptr::read_unaligned(slot.cast());
                    ConvertedString::from_raw_parts(p, values[i].len())
                }
            })
            .collect();
        Ok(out)
    }
}

/// Convert `values` to C strings with a process-wide [`StringConversion`].
///
/// Soft conversions match by type class, so one registered pair serves
/// every call.
pub fn convert_strs(values: &[&str]) -> Result<Vec<ConvertedString>> {
    let mut shared = SHARED.lock().unwrap_or_else(|e| e.into_inner());
    let conv = match shared.take() {
        Some(conv) => conv,
        None => StringConversion::new()?,
    };
    let result = conv.convert(values);
    *shared = Some(conv);
    result
}

/// Drop the shared conversion without closing its handles, which `H5close`
/// has already invalidated.
pub(crate) fn forget_shared() {
    let mut shared = SHARED.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(conv) = shared.take() {
        std::mem::forget(conv);
    }
}
