//! The host string header read by the converter.
//!
//! Layout contract, shared by the host and the conversion function:
//!
//! | offset            | field  | type         |
//! |-------------------|--------|--------------|
//! | 0                 | `data` | `*const u8`  |
//! | `size_of::<usize>()` | `len`  | `usize`      |
//!
//! Both fields are pointer width and there is no padding, so the header is
//! layout-compatible with a Rust `&str` split into parts and with a Go
//! `string` header on the same target.

use std::marker::PhantomData;
use std::mem;

use static_assertions::{assert_eq_align, assert_eq_size, const_assert_eq};

/// Size in bytes of one [`StrHeader`], i.e. one source element.
pub const STR_HEADER_SIZE: usize = mem::size_of::<StrHeader<'static>>();

/// Borrowed `(pointer, length)` view of a string's bytes.
///
/// The header never owns the bytes it points at.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StrHeader<'a> {
    data: *const u8,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

assert_eq_size!(StrHeader<'static>, [usize; 2]);
assert_eq_align!(StrHeader<'static>, usize);
const_assert_eq!(mem::offset_of!(StrHeader<'static>, data), 0);
const_assert_eq!(mem::offset_of!(StrHeader<'static>, len), mem::size_of::<usize>());

impl<'a> StrHeader<'a> {
    /// Header over the bytes of a string slice.
    pub fn new(s: &'a str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Header over an arbitrary byte slice.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self {
            data: bytes.as_ptr(),
            len: bytes.len(),
            _marker: PhantomData,
        }
    }

    /// Pointer to the first byte.
    pub fn data(&self) -> *const u8 {
        self.data
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the header describes zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bytes this header points at.
    pub fn as_bytes(&self) -> &'a [u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: headers are only built from live slices of lifetime 'a.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }
}

impl<'a> From<&'a str> for StrHeader<'a> {
    fn from(s: &'a str) -> Self {
        StrHeader::new(s)
    }
}

/// Read a header out of a raw conversion buffer.
///
/// # Safety
///
/// `ptr` must be valid for reads of [`STR_HEADER_SIZE`] bytes. Alignment is
/// not required. The returned header's bytes must stay alive for as long
/// as the header is used.
pub(crate) unsafe fn read_raw<'a>(ptr: *const u8) -> StrHeader<'a> {
    // SAFETY: upheld by the caller.
    unsafe { std::ptr::read_unaligned(ptr.cast::<StrHeader<'a>>()) }
}
