//! The string-header to C string conversion function.
//!
//! HDF5 drives the function through `H5T_CONV_INIT`, any number of
//! `H5T_CONV_CONV` passes and `H5T_CONV_FREE`. Each source element is a
//! [`StrHeader`]; each destination element is a `char *` pointing at a
//! freshly `calloc`'d, NUL-terminated copy of the header's bytes.
//!
//! Destination strings are owned by whoever receives the converted buffer
//! and must be released with `free` (see [`release_cstring`]).

use std::ffi::CStr;
use std::mem;
use std::os::raw::{c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use tracing::{trace, warn};

use crate::ffi::*;
use crate::header::{self, STR_HEADER_SIZE};

/// Name the converter is registered under. Tools may look converters up by
/// this name, so it never changes.
pub const CONVERTER_NAME: &CStr = c"gostring->cstring";

/// Size of one destination element: a `char *`.
pub const CSTRING_ELEMENT_SIZE: usize = mem::size_of::<*mut c_char>();

/// Status returned to HDF5 on success.
const SUCCEED: herr_t = 0;
/// Status returned to HDF5 on any failure.
const FAIL: herr_t = -1;

/// Conversion phase requested by HDF5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Negotiate a new conversion path.
    Init,
    /// Convert a batch of elements.
    Convert,
    /// Tear the conversion path down.
    Free,
}

impl TryFrom<H5T_cmd_t> for Command {
    type Error = H5T_cmd_t;

    fn try_from(raw: H5T_cmd_t) -> Result<Self, Self::Error> {
        match raw {
            H5T_CONV_INIT => Ok(Command::Init),
            H5T_CONV_CONV => Ok(Command::Convert),
            H5T_CONV_FREE => Ok(Command::Free),
            other => Err(other),
        }
    }
}

impl From<Command> for H5T_cmd_t {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Init => H5T_CONV_INIT,
            Command::Convert => H5T_CONV_CONV,
            Command::Free => H5T_CONV_FREE,
        }
    }
}

/// What a datatype handle resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// The handle that was resolved.
    pub id: hid_t,
    /// Element size in bytes.
    pub size: usize,
    /// Whether the type is a variable-length string.
    pub variable_string: bool,
}

/// Resolves datatype handles passed in by HDF5.
pub trait TypeResolver {
    /// Descriptor for `id`, or `None` if the handle does not name a datatype.
    fn resolve(&self, id: hid_t) -> Option<TypeDescriptor>;
}

impl TypeResolver for crate::library::Hdf5Library {
    fn resolve(&self, id: hid_t) -> Option<TypeDescriptor> {
        if self.id_type(id) != H5I_DATATYPE {
            return None;
        }
        let size = self.type_size(id);
        if size == 0 {
            return None;
        }
        Some(TypeDescriptor {
            id,
            size,
            variable_string: self.is_variable_str(id) > 0,
        })
    }
}

/// Why a conversion call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A type handle did not resolve.
    Unresolved(hid_t),
    /// The source type is narrower than a string header.
    SourceTooSmall(usize),
    /// The destination is not a variable-length string of `char *`
    /// elements.
    UnsupportedDestination(hid_t),
    /// A header had a null data pointer and a non-zero length.
    NullData(usize),
    /// `calloc` failed for the element at this index.
    OutOfMemory(usize),
    /// HDF5 passed a command outside `INIT`/`CONV`/`FREE`.
    UnknownCommand(H5T_cmd_t),
    /// The control record pointer was null.
    NullControl,
}

/// Run one converter call against `resolver`.
///
/// This is the whole state machine behind [`convert_str_to_cstring`]; the
/// exported function only supplies the loaded library as the resolver.
///
/// # Safety
///
/// For `CONV`, `buf` must be valid for reads and writes of `nelmts`
/// elements at the steps derived from `buf_stride` or the resolved type
/// sizes, and every source header must describe readable bytes.
pub unsafe fn run<R: TypeResolver + ?Sized>(
    resolver: &R,
    src_id: hid_t,
    dst_id: hid_t,
    cdata: &mut H5T_cdata_t,
    nelmts: usize,
    buf_stride: usize,
    buf: *mut u8,
) -> Result<(), Rejection> {
    let command = Command::try_from(cdata.command).map_err(Rejection::UnknownCommand)?;
    trace!(?command, src_id, dst_id, nelmts, "string conversion");

    match command {
        Command::Init => {
            accept_pair(resolver, src_id, dst_id)?;
            cdata.need_bkg = H5T_BKG_NO;
            Ok(())
        }
        Command::Convert => {
            let (src, dst) = accept_pair(resolver, src_id, dst_id)?;
            let (src_step, dst_step) = if buf_stride != 0 {
                (buf_stride, buf_stride)
            } else {
                (src.size, dst.size)
            };
            if src_step < STR_HEADER_SIZE {
                return Err(Rejection::SourceTooSmall(src_step));
            }
            // SAFETY: upheld by the caller.
            unsafe { convert_elements(buf, nelmts, src_step, dst_step) }
        }
        Command::Free => Ok(()),
    }
}

/// Resolve both handles and check the pair is one this converter handles:
/// a source at least one header wide and a variable-length string
/// destination whose elements are `char *`.
fn accept_pair<R: TypeResolver + ?Sized>(
    resolver: &R,
    src_id: hid_t,
    dst_id: hid_t,
) -> Result<(TypeDescriptor, TypeDescriptor), Rejection> {
    let src = resolver.resolve(src_id).ok_or(Rejection::Unresolved(src_id))?;
    let dst = resolver.resolve(dst_id).ok_or(Rejection::Unresolved(dst_id))?;
    if src.size < STR_HEADER_SIZE {
        return Err(Rejection::SourceTooSmall(src.size));
    }
    if !dst.variable_string || dst.size != CSTRING_ELEMENT_SIZE {
        return Err(Rejection::UnsupportedDestination(dst_id));
    }
    Ok((src, dst))
}

/// Convert `nelmts` headers in place into `char *` elements.
///
/// The buffer is rewritten in place, so when destination elements are wider
/// than source elements the pass runs from the last element to the first.
///
/// # Safety
///
/// See [`run`].
unsafe fn convert_elements(
    buf: *mut u8,
    nelmts: usize,
    src_step: usize,
    dst_step: usize,
) -> Result<(), Rejection> {
    if nelmts == 0 {
        return Ok(());
    }
    let backward = dst_step > src_step;
    let mut done: Vec<*mut c_char> = Vec::with_capacity(nelmts);

    for n in 0..nelmts {
        let i = if backward { nelmts - 1 - n } else { n };
        // SAFETY: element i lies inside the caller's buffer.
        let header = unsafe { header::read_raw(buf.add(i * src_step)) };
        let copied = if !header.is_empty() && header.data().is_null() {
            Err(Rejection::NullData(i))
        } else {
            // SAFETY: the header describes readable bytes.
            unsafe { copy_to_cstring(header.data(), header.len()) }.ok_or(Rejection::OutOfMemory(i))
        };
        let cstr = match copied {
            Ok(p) => p,
            Err(rejection) => {
                for p in done {
                    // SAFETY: every pointer in `done` came from calloc.
                    unsafe { libc::free(p.cast()) };
                }
                return Err(rejection);
            }
        };
        // SAFETY: the header for element i has already been read, so its
        // bytes may be overwritten.
        unsafe { ptr::write_unaligned(buf.add(i * dst_step).cast::<*mut c_char>(), cstr) };
        done.push(cstr);
    }
    Ok(())
}

/// `calloc` a `len + 1` byte buffer, copy `len` bytes from `data` and
/// terminate it. Returns `None` on allocation failure.
///
/// # Safety
///
/// When `len > 0`, `data` must be valid for reads of `len` bytes.
unsafe fn copy_to_cstring(data: *const u8, len: usize) -> Option<*mut c_char> {
    let size = len.checked_add(1)?;
    // SAFETY: calloc has no preconditions; the result is checked below.
    let dst = unsafe { libc::calloc(size, 1) }.cast::<u8>();
    if dst.is_null() {
        return None;
    }
    // SAFETY: dst holds len + 1 bytes; data holds len readable bytes.
    unsafe {
        if len > 0 {
            ptr::copy_nonoverlapping(data, dst, len);
        }
        *dst.add(len) = 0;
    }
    Some(dst.cast())
}

/// Release a string produced by the converter.
///
/// # Safety
///
/// `ptr` must be null or a pointer written by the converter that has not
/// been released yet.
pub unsafe fn release_cstring(ptr: *mut c_char) {
    // SAFETY: upheld by the caller; free(NULL) is a no-op.
    unsafe { libc::free(ptr.cast::<c_void>()) }
}

/// The conversion function registered with HDF5.
///
/// Matches `H5T_conv_t`. Every failure, including a panic, is reported as a
/// negative status so HDF5 can reject the path or fail the operation.
///
/// # Safety
///
/// Called by HDF5 with the arguments its conversion contract guarantees.
pub unsafe extern "C" fn convert_str_to_cstring(
    src_id: hid_t,
    dst_id: hid_t,
    cdata: *mut H5T_cdata_t,
    nelmts: usize,
    buf_stride: usize,
    _bkg_stride: usize,
    buf: *mut c_void,
    _bkg: *mut c_void,
    _dxpl_id: hid_t,
) -> herr_t {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: HDF5 passes a valid control record or null.
        let Some(cdata) = (unsafe { cdata.as_mut() }) else {
            return Err(Rejection::NullControl);
        };
        let Some(lib) = crate::library::loaded() else {
            return Err(Rejection::Unresolved(src_id));
        };
        // SAFETY: HDF5 guarantees the buffer contract described on `run`.
        unsafe { run(lib, src_id, dst_id, cdata, nelmts, buf_stride, buf.cast()) }
    }));
    match outcome {
        Ok(Ok(())) => SUCCEED,
        Ok(Err(rejection)) => {
            warn!(?rejection, src_id, dst_id, "string conversion rejected");
            FAIL
        }
        Err(_) => {
            warn!(src_id, dst_id, "string conversion panicked");
            FAIL
        }
    }
}
