//! Raw HDF5 C ABI types and constants used by the shim.
//!
//! Layouts follow `H5public.h`, `H5Ipublic.h`, `H5Tpublic.h` and
//! `H5Epublic.h` for HDF5 1.10 and later, where `hid_t` is 64-bit and
//! `hbool_t` is C `bool`.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_uint, c_void};

use static_assertions::{assert_eq_align, assert_eq_size};

pub type hid_t = i64;
pub type herr_t = c_int;
pub type htri_t = c_int;
pub type hbool_t = bool;

/// `H5E_DEFAULT`: the default error stack.
pub const H5E_DEFAULT: hid_t = 0;
/// `H5P_DEFAULT`: the default property list.
pub const H5P_DEFAULT: hid_t = 0;

/// `H5T_VARIABLE`: size marker for variable-length strings.
pub const H5T_VARIABLE: usize = usize::MAX;

// ---------------------------------------------------------------------------
// H5I
// ---------------------------------------------------------------------------

pub type H5I_type_t = c_int;
pub const H5I_BADID: H5I_type_t = -1;
pub const H5I_DATATYPE: H5I_type_t = 3;

// ---------------------------------------------------------------------------
// H5T
// ---------------------------------------------------------------------------

pub type H5T_class_t = c_int;
pub const H5T_NO_CLASS: H5T_class_t = -1;
pub const H5T_STRING: H5T_class_t = 3;
pub const H5T_OPAQUE: H5T_class_t = 5;

/// Conversion function persistence (`H5T_pers_t`).
pub type H5T_pers_t = c_int;
pub const H5T_PERS_HARD: H5T_pers_t = 0;
pub const H5T_PERS_SOFT: H5T_pers_t = 1;

/// Raw `H5T_cmd_t`. Kept as an integer so that values outside the C enum
/// can be read without undefined behavior.
pub type H5T_cmd_t = c_int;
pub const H5T_CONV_INIT: H5T_cmd_t = 0;
pub const H5T_CONV_CONV: H5T_cmd_t = 1;
pub const H5T_CONV_FREE: H5T_cmd_t = 2;

/// Background buffer requirement (`H5T_bkg_t`).
pub type H5T_bkg_t = c_int;
pub const H5T_BKG_NO: H5T_bkg_t = 0;
pub const H5T_BKG_TEMP: H5T_bkg_t = 1;
pub const H5T_BKG_YES: H5T_bkg_t = 2;

/// Conversion control record passed to every conversion function call.
#[repr(C)]
#[derive(Debug)]
pub struct H5T_cdata_t {
    pub command: H5T_cmd_t,
    pub need_bkg: H5T_bkg_t,
    pub recalc: hbool_t,
    pub priv_: *mut c_void,
}

assert_eq_align!(H5T_cdata_t, *mut c_void);

/// Signature every HDF5 datatype conversion function must have.
pub type H5T_conv_t = unsafe extern "C" fn(
    src_id: hid_t,
    dst_id: hid_t,
    cdata: *mut H5T_cdata_t,
    nelmts: usize,
    buf_stride: usize,
    bkg_stride: usize,
    buf: *mut c_void,
    bkg: *mut c_void,
    dxpl_id: hid_t,
) -> herr_t;

// ---------------------------------------------------------------------------
// H5E
// ---------------------------------------------------------------------------

/// Automatic error reporting callback (`H5E_auto2_t`).
pub type H5E_auto2_t = Option<unsafe extern "C" fn(estack: hid_t, client_data: *mut c_void) -> herr_t>;

assert_eq_size!(H5E_auto2_t, *const c_void);

// ---------------------------------------------------------------------------
// Entry point signatures resolved from the shared library
// ---------------------------------------------------------------------------

pub type H5openFn = unsafe extern "C" fn() -> herr_t;
pub type H5closeFn = unsafe extern "C" fn() -> herr_t;
pub type H5garbage_collectFn = unsafe extern "C" fn() -> herr_t;
pub type H5get_libversionFn =
    unsafe extern "C" fn(majnum: *mut c_uint, minnum: *mut c_uint, relnum: *mut c_uint) -> herr_t;

pub type H5Iget_typeFn = unsafe extern "C" fn(id: hid_t) -> H5I_type_t;

pub type H5TregisterFn = unsafe extern "C" fn(
    pers: H5T_pers_t,
    name: *const c_char,
    src_id: hid_t,
    dst_id: hid_t,
    func: H5T_conv_t,
) -> herr_t;
pub type H5TunregisterFn = unsafe extern "C" fn(
    pers: H5T_pers_t,
    name: *const c_char,
    src_id: hid_t,
    dst_id: hid_t,
    func: Option<H5T_conv_t>,
) -> herr_t;
pub type H5TfindFn =
    unsafe extern "C" fn(src_id: hid_t, dst_id: hid_t, pcdata: *mut *mut H5T_cdata_t) -> Option<H5T_conv_t>;
pub type H5TconvertFn = unsafe extern "C" fn(
    src_id: hid_t,
    dst_id: hid_t,
    nelmts: usize,
    buf: *mut c_void,
    background: *mut c_void,
    plist_id: hid_t,
) -> herr_t;
pub type H5TcreateFn = unsafe extern "C" fn(class: H5T_class_t, size: usize) -> hid_t;
pub type H5TcopyFn = unsafe extern "C" fn(type_id: hid_t) -> hid_t;
pub type H5TcloseFn = unsafe extern "C" fn(type_id: hid_t) -> herr_t;
pub type H5Tset_sizeFn = unsafe extern "C" fn(type_id: hid_t, size: usize) -> herr_t;
pub type H5Tget_sizeFn = unsafe extern "C" fn(type_id: hid_t) -> usize;
pub type H5Tget_classFn = unsafe extern "C" fn(type_id: hid_t) -> H5T_class_t;
pub type H5Tis_variable_strFn = unsafe extern "C" fn(type_id: hid_t) -> htri_t;
pub type H5Tset_tagFn = unsafe extern "C" fn(type_id: hid_t, tag: *const c_char) -> herr_t;

pub type H5Eset_auto2Fn =
    unsafe extern "C" fn(estack_id: hid_t, func: H5E_auto2_t, client_data: *mut c_void) -> herr_t;
pub type H5Eget_auto2Fn = unsafe extern "C" fn(
    estack_id: hid_t,
    func: *mut H5E_auto2_t,
    client_data: *mut *mut c_void,
) -> herr_t;
pub type H5Eprint2Fn = unsafe extern "C" fn(estack_id: hid_t, stream: *mut c_void) -> herr_t;
