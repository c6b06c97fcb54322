//! Operations that reset process-wide HDF5 state.
//!
//! Kept in their own test binary, and in a single test, so they cannot race
//! the conversions in `hdf5_interop.rs`.

use rustyhdf5_strconv::{
    Config, Registrar, close, convert_strs, garbage_collect, init, is_silenced, library, silence,
    str_header_type, unsilence, variable_cstring_type,
};

fn hdf5_available() -> bool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    init(&Config::from_env()).is_ok()
}

#[test]
fn unregister_close_and_recover() {
    if !hdf5_available() {
        eprintln!("SKIP: HDF5 shared library not available");
        return;
    }
    let lib = library().unwrap();

    // Shared conversion works, then its converter is unregistered.
    assert_eq!(convert_strs(&["one"]).unwrap()[0].bytes_with_nul(), b"one\0");
    let src = str_header_type().unwrap();
    let dst = variable_cstring_type().unwrap();
    let registrar = Registrar::global().unwrap();
    registrar.register(src.id(), dst.id()).unwrap();
    registrar.unregister(src.id(), dst.id()).unwrap();
    assert!(!registrar.is_installed(src.id(), dst.id()));
    assert!(!registrar.is_active(src.id(), dst.id()));

    // The shared conversion registers again on its next use.
    assert_eq!(convert_strs(&["two"]).unwrap()[0].bytes_with_nul(), b"two\0");
    drop(src);
    drop(dst);

    // After H5close every handle is gone; the next call starts over.
    close().unwrap();
    assert_eq!(is_silenced().unwrap(), !lib.print_errors());
    assert_eq!(convert_strs(&["three"]).unwrap()[0].bytes_with_nul(), b"three\0");
    garbage_collect().unwrap();

    // HDF5 reinstalls its default printer on reinit; close keeps the
    // configured state either way.
    unsilence().unwrap();
    silence().unwrap();
    close().unwrap();
    assert_eq!(is_silenced().unwrap(), !lib.print_errors());
}
