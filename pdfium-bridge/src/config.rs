//! Engine binding configuration

use std::env;
use std::path::PathBuf;

/// Environment variable naming a directory that contains the PDFium library.
pub const PDFIUM_LIB_DIR_ENV: &str = "PDFIUM_LIB_DIR";

/// Where to look for the PDFium shared library.
///
/// Candidates are tried in order: the explicit directory, the directory of
/// the running executable, the current directory, and finally the system
/// library search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Explicit library directory (highest priority).
    pub library_dir: Option<PathBuf>,
    /// Search next to the running executable.
    pub search_executable_dir: bool,
    /// Search the current working directory.
    pub search_current_dir: bool,
    /// Fall back to the system library search path.
    pub use_system_library: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            library_dir: None,
            search_executable_dir: true,
            search_current_dir: true,
            use_system_library: true,
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with `PDFIUM_LIB_DIR` applied if set.
    pub fn from_env() -> Self {
        let library_dir = env::var_os(PDFIUM_LIB_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        if let Some(dir) = &library_dir {
            log::debug!("Using {}={}", PDFIUM_LIB_DIR_ENV, dir.display());
        }
        Self {
            library_dir,
            ..Self::default()
        }
    }

    /// Set an explicit library directory.
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    /// Disable the system library fallback.
    pub fn without_system_library(mut self) -> Self {
        self.use_system_library = false;
        self
    }

    /// Directories to probe for the platform library, in priority order.
    ///
    /// The system library fallback is not a directory and is governed by
    /// [`BridgeConfig::use_system_library`].
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();

        if let Some(dir) = &self.library_dir {
            dirs.push(dir.clone());
        }

        if self.search_executable_dir {
            if let Some(dir) = env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
            {
                dirs.push(dir);
            }
        }

        if self.search_current_dir {
            dirs.push(PathBuf::from("./"));
        }

        dirs.dedup();
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_comes_first() {
        let config = BridgeConfig::new().with_library_dir("/opt/pdfium/lib");
        let dirs = config.search_dirs();
        assert_eq!(dirs.first(), Some(&PathBuf::from("/opt/pdfium/lib")));
        assert_eq!(dirs.last(), Some(&PathBuf::from("./")));
    }

    #[test]
    fn test_disabled_locations_are_skipped() {
        let config = BridgeConfig {
            library_dir: None,
            search_executable_dir: false,
            search_current_dir: false,
            use_system_library: true,
        };
        assert!(config.search_dirs().is_empty());
    }

    #[test]
    fn test_without_system_library() {
        let config = BridgeConfig::new().without_system_library();
        assert!(!config.use_system_library);
        assert!(config.search_current_dir);
    }
}
