//! Round trips through a real HDF5 library.
//!
//! Tests are skipped if no HDF5 shared library can be loaded (set
//! `RUSTYHDF5_HDF5_LIB` or `HDF5_DIR` to point at one).

use std::ptr;

use rustyhdf5_strconv::ffi::{H5P_DEFAULT, H5T_BKG_YES, H5T_CONV_INIT, H5T_STRING, H5T_cdata_t};
use rustyhdf5_strconv::registry::register_raw;
use rustyhdf5_strconv::{
    Config, Error, Registrar, Registration, STR_HEADER_SIZE, StringConversion,
    convert_str_to_cstring, convert_strs, init, library, str_header_type, variable_cstring_type,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hdf5_available() -> bool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    init(&Config::from_env()).is_ok()
}

macro_rules! skip_if_no_hdf5 {
    () => {
        if !hdf5_available() {
            eprintln!("SKIP: HDF5 shared library not available");
            return;
        }
    };
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

#[test]
fn hello_converts_to_six_bytes() {
    skip_if_no_hdf5!();
    let out = convert_strs(&["hello"]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].bytes_with_nul(), b"hello\0");
    assert_eq!(out[0].bytes_with_nul().len(), 6);
}

#[test]
fn empty_string_round_trips() {
    skip_if_no_hdf5!();
    let out = convert_strs(&[""]).unwrap();
    assert_eq!(out[0].bytes_with_nul(), b"\0");
}

#[test]
fn batch_keeps_order() {
    skip_if_no_hdf5!();
    let values = ["north", "", "south-east", "wëst", "up"];
    let out = convert_strs(&values).unwrap();
    assert_eq!(out.len(), values.len());
    for (v, s) in values.iter().zip(&out) {
        assert_eq!(s.as_c_str().to_bytes(), v.as_bytes());
    }
}

#[test]
fn interior_nul_survives_conversion() {
    skip_if_no_hdf5!();
    let out = convert_strs(&["a\0b", "c"]).unwrap();
    assert_eq!(out[0].len(), 3);
    assert_eq!(out[0].as_bytes(), b"a\0b");
    assert_eq!(out[0].bytes_with_nul(), b"a\0b\0");
    assert_eq!(out[1].as_bytes(), b"c");
}

#[test]
fn zero_elements() {
    skip_if_no_hdf5!();
    assert!(convert_strs(&[]).unwrap().is_empty());
}

#[test]
fn repeated_conversions() {
    skip_if_no_hdf5!();
    let long = "z".repeat(4096);
    for _ in 0..200 {
        let out = convert_strs(&[long.as_str(), "a"]).unwrap();
        assert_eq!(out[0].as_c_str().to_bytes().len(), 4096);
        assert_eq!(out[1].bytes_with_nul(), b"a\0");
    }
}

// ---------------------------------------------------------------------------
// Datatypes and registration
// ---------------------------------------------------------------------------

#[test]
fn datatypes_have_the_expected_shape() {
    skip_if_no_hdf5!();
    let lib = library().unwrap();
    let src = str_header_type().unwrap();
    let dst = variable_cstring_type().unwrap();
    assert_eq!(src.size(), STR_HEADER_SIZE);
    assert!(!src.is_variable_str());
    assert!(dst.is_variable_str());
    assert_eq!(dst.size(), std::mem::size_of::<*mut std::os::raw::c_char>());
    assert_eq!(lib.type_class(dst.id()), H5T_STRING);
}

#[test]
fn tags_with_interior_nul_are_rejected() {
    skip_if_no_hdf5!();
    let src = str_header_type().unwrap();
    assert!(matches!(src.set_tag("a\0b"), Err(Error::InvalidString(_))));
    src.set_tag("another-tag").unwrap();
}

#[test]
fn registration_is_idempotent() {
    skip_if_no_hdf5!();
    let src = str_header_type().unwrap();
    let dst = variable_cstring_type().unwrap();
    let registrar = Registrar::global().unwrap();

    assert_eq!(registrar.register(src.id(), dst.id()).unwrap(), Registration::Installed);
    assert_eq!(
        registrar.register(src.id(), dst.id()).unwrap(),
        Registration::AlreadyInstalled
    );
    assert!(registrar.is_installed(src.id(), dst.id()));
    assert!(registrar.is_active(src.id(), dst.id()));
}

#[test]
fn raw_registration_reaches_hdf5_every_time() {
    skip_if_no_hdf5!();
    let lib = library().unwrap();
    let src = str_header_type().unwrap();
    let dst = variable_cstring_type().unwrap();

    // HDF5 appends a soft entry per call and reports success each time.
    assert!(register_raw(lib, src.id(), dst.id()) >= 0);
    assert!(register_raw(lib, src.id(), dst.id()) >= 0);
    assert!(Registrar::global().unwrap().is_active(src.id(), dst.id()));
    assert_eq!(convert_strs(&["again"]).unwrap()[0].as_bytes(), b"again");
}

#[test]
fn shared_conversion_types() {
    skip_if_no_hdf5!();
    let conv = StringConversion::new().unwrap();
    assert_eq!(conv.source().size(), STR_HEADER_SIZE);
    assert!(conv.destination().is_variable_str());
    let out = conv.convert(&["abc", "de"]).unwrap();
    assert_eq!(out[1].bytes_with_nul(), b"de\0");
}

#[test]
fn init_rejects_handles_that_are_not_datatypes() {
    skip_if_no_hdf5!();
    let src = str_header_type().unwrap();
    let mut cdata = H5T_cdata_t {
        command: H5T_CONV_INIT,
        need_bkg: H5T_BKG_YES,
        recalc: false,
        priv_: ptr::null_mut(),
    };
    let status = unsafe {
        convert_str_to_cstring(
            src.id(),
            -1,
            &mut cdata,
            0,
            0,
            0,
            ptr::null_mut(),
            ptr::null_mut(),
            H5P_DEFAULT,
        )
    };
    assert!(status < 0);
    assert_eq!(cdata.need_bkg, H5T_BKG_YES);
}

#[test]
fn init_rejects_fixed_length_string_destination() {
    skip_if_no_hdf5!();
    let lib = library().unwrap();
    let src = str_header_type().unwrap();
    let fixed = lib.copy_type(lib.c_s1().unwrap()).unwrap();
    lib.set_type_size(fixed, 4).unwrap();

    let mut cdata = H5T_cdata_t {
        command: H5T_CONV_INIT,
        need_bkg: H5T_BKG_YES,
        recalc: false,
        priv_: ptr::null_mut(),
    };
    let status = unsafe {
        convert_str_to_cstring(
            src.id(),
            fixed,
            &mut cdata,
            0,
            0,
            0,
            ptr::null_mut(),
            ptr::null_mut(),
            H5P_DEFAULT,
        )
    };
    lib.close_type(fixed).unwrap();
    assert!(status < 0);
    assert_eq!(cdata.need_bkg, H5T_BKG_YES);
}

#[test]
fn version_is_supported() {
    skip_if_no_hdf5!();
    let version = rustyhdf5_strconv::hdf5_version().unwrap();
    assert!(version >= (1, 10, 0));
    assert_eq!(library().unwrap().query_version().unwrap(), version);
}
