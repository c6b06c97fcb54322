//! HDF5's automatic error printing, observed on the process's stderr.
//!
//! Error-printer state is process-wide and fd 2 is redirected while a
//! failing call runs, so everything lives in one test in its own binary.

#![cfg(unix)]

use std::os::raw::c_int;
use std::ptr;

use rustyhdf5_strconv::{
    Config, SilenceGuard, init, is_silenced, library, silence, unsilence, with_silenced,
};

fn hdf5_available() -> bool {
    init(&Config::from_env()).is_ok()
}

/// Run `f` with fd 2 pointed at a pipe and return what was written to it.
fn capture_stderr(f: impl FnOnce()) -> String {
    let mut fds: [c_int; 2] = [0; 2];
    let mut out = Vec::new();
    unsafe {
        assert_eq!(libc::pipe(fds.as_mut_ptr()), 0);
        let saved = libc::dup(2);
        assert!(saved >= 0);
        assert!(libc::dup2(fds[1], 2) >= 0);
        libc::close(fds[1]);

        f();

        libc::fflush(ptr::null_mut());
        assert!(libc::dup2(saved, 2) >= 0);
        libc::close(saved);

        let mut chunk = [0u8; 4096];
        loop {
            let n = libc::read(fds[0], chunk.as_mut_ptr().cast(), chunk.len());
            if n <= 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n as usize]);
        }
        libc::close(fds[0]);
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Make an HDF5 call fail: -1 is never a datatype handle.
fn fail_once() {
    let lib = library().unwrap();
    assert!(lib.close_type(-1).is_err());
}

#[test]
fn printing_follows_the_toggle() {
    if !hdf5_available() {
        eprintln!("SKIP: HDF5 shared library not available");
        return;
    }

    silence().unwrap();
    assert!(is_silenced().unwrap());
    assert_eq!(capture_stderr(fail_once), "");

    unsilence().unwrap();
    assert!(!is_silenced().unwrap());
    let printed = capture_stderr(fail_once);
    assert!(printed.contains("HDF5-DIAG"), "stderr was: {printed:?}");
    assert!(printed.contains("H5Tclose"), "stderr was: {printed:?}");

    // The guard silences, then restores the printer it found.
    {
        let _guard = SilenceGuard::new().unwrap();
        assert!(is_silenced().unwrap());
        assert_eq!(capture_stderr(fail_once), "");
    }
    assert!(!is_silenced().unwrap());
    assert!(capture_stderr(fail_once).contains("HDF5-DIAG"));

    assert_eq!(capture_stderr(|| with_silenced(fail_once).unwrap()), "");
    assert!(!is_silenced().unwrap());

    // A guard taken while silenced leaves printing off.
    silence().unwrap();
    {
        let _guard = SilenceGuard::new().unwrap();
        assert!(is_silenced().unwrap());
    }
    assert!(is_silenced().unwrap());
    assert_eq!(capture_stderr(fail_once), "");
}
