//! Worker binary resolution
//!
//! GPT4All ships one prebuilt chat executable per platform. The table below maps
//! `std::env::consts::{OS, ARCH}` identifiers to the file name of that executable.

use crate::error::{Result, TransportError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Platform variants with a published worker executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// macOS on Intel
    MacOsIntel,
    /// macOS on Apple silicon
    MacOsArm,
    /// Linux on x86-64
    LinuxX86_64,
    /// Windows on x86-64
    WindowsX86_64,
}

impl Platform {
    /// Executable file name for this platform
    pub fn binary_name(self) -> &'static str {
        match self {
            Platform::MacOsIntel => "gpt4all-lora-quantized-OSX-intel",
            Platform::MacOsArm => "gpt4all-lora-quantized-OSX-m1",
            Platform::LinuxX86_64 => "gpt4all-lora-quantized-linux-x86",
            Platform::WindowsX86_64 => "gpt4all-lora-quantized-win64.exe",
        }
    }
}

/// Resolved worker executable for a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinaryDescriptor {
    /// Platform the executable targets
    pub platform: Platform,
    /// File name inside the binaries directory
    pub file_name: &'static str,
}

static HOST_DESCRIPTOR: OnceLock<Option<BinaryDescriptor>> = OnceLock::new();

impl BinaryDescriptor {
    /// Map an OS/architecture pair to its executable.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedPlatform`] when the pair has no entry.
    pub fn resolve(os: &str, arch: &str) -> Result<Self> {
        let platform = match (os, arch) {
            ("macos", "x86_64") => Platform::MacOsIntel,
            ("macos", "aarch64") => Platform::MacOsArm,
            ("linux", "x86_64") => Platform::LinuxX86_64,
            ("windows", "x86_64") => Platform::WindowsX86_64,
            _ => {
                return Err(TransportError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                });
            }
        };

        Ok(Self {
            platform,
            file_name: platform.binary_name(),
        })
    }

    /// Descriptor for the host this process runs on, computed once
    pub fn host() -> Result<Self> {
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;
        HOST_DESCRIPTOR
            .get_or_init(|| Self::resolve(os, arch).ok())
            .ok_or_else(|| TransportError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
    }

    /// Full path of the executable inside `dir`
    pub fn path_in(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(self.file_name)
    }
}
