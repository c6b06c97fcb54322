//! Runtime configuration: where to find the HDF5 shared library and the
//! initial state of HDF5's error printer.

use std::path::{Path, PathBuf};

/// Environment variable holding an explicit path to the HDF5 shared library.
pub const ENV_LIBRARY_PATH: &str = "RUSTYHDF5_HDF5_LIB";
/// Environment variable holding an HDF5 install prefix (`$HDF5_DIR/lib`).
pub const ENV_HDF5_DIR: &str = "HDF5_DIR";
/// Environment variable enabling HDF5's automatic error printing at init.
pub const ENV_PRINT_ERRORS: &str = "RUSTYHDF5_PRINT_ERRORS";

#[cfg(target_os = "linux")]
const LIBRARY_NAMES: &[&str] = &[
    "libhdf5.so",
    "libhdf5_serial.so",
    "libhdf5.so.320",
    "libhdf5.so.310",
    "libhdf5.so.200",
    "libhdf5.so.103",
    "libhdf5_serial.so.310",
    "libhdf5_serial.so.200",
    "libhdf5_serial.so.103",
];

#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &["libhdf5.dylib"];

#[cfg(target_os = "windows")]
const LIBRARY_NAMES: &[&str] = &["hdf5.dll", "libhdf5.dll"];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LIBRARY_NAMES: &[&str] = &["libhdf5.so"];

/// Configuration for [`crate::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Explicit library path. When set, no other candidate is tried.
    pub library_path: Option<PathBuf>,
    /// HDF5 install prefix searched before bare library names.
    pub hdf5_dir: Option<PathBuf>,
    /// Leave HDF5's automatic error printing on after init.
    pub print_errors: bool,
}

impl Config {
    /// Create a configuration with defaults: search the usual library names
    /// and silence HDF5's error printer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            library_path: non_empty(ENV_LIBRARY_PATH).map(PathBuf::from),
            hdf5_dir: non_empty(ENV_HDF5_DIR).map(PathBuf::from),
            print_errors: non_empty(ENV_PRINT_ERRORS).is_some_and(|v| parse_flag(&v)),
        }
    }

    /// Use an explicit library path.
    pub fn with_library_path(mut self, path: impl AsRef<Path>) -> Self {
        self.library_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Search an HDF5 install prefix.
    pub fn with_hdf5_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.hdf5_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Choose whether HDF5 prints its error stack after init.
    pub fn with_print_errors(mut self, on: bool) -> Self {
        self.print_errors = on;
        self
    }

    /// Library paths to try, in order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.library_path {
            return vec![path.clone()];
        }
        let mut out = Vec::new();
        if let Some(dir) = &self.hdf5_dir {
            for name in LIBRARY_NAMES {
                out.push(dir.join("lib").join(name));
            }
        }
        out.extend(LIBRARY_NAMES.iter().map(PathBuf::from));
        out
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
