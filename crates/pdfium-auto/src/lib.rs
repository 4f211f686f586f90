//! # pdfium-auto
//!
//! Finds a usable PDFium shared library for docvoice's page rasteriser and
//! binds [`pdfium_render`] to it.
//!
//! Resolution order, first hit wins:
//!
//! 1. an explicit path handed to [`PdfiumLocator::with_library_path`]
//! 2. the `PDFIUM_LIB_PATH` environment variable
//! 3. the per-version cache directory (see [`default_cache_dir`])
//! 4. a download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    unless downloads were disabled with [`PdfiumLocator::offline`]
//!
//! ```rust,no_run
//! use pdfium_auto::PdfiumLocator;
//!
//! let pdfium = PdfiumLocator::new().offline().bind().expect("PDFium unavailable");
//! ```
//!
//! Set `PDFIUM_AUTO_CACHE_DIR` to move the cache.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Errors returned while locating or binding PDFium.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    #[error("PDFium library not found (looked in {searched}) and downloads are disabled")]
    NotFound { searched: String },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

struct PlatformAsset {
    archive: &'static str,
    member: &'static str,
    file_name: &'static str,
}

fn platform_asset() -> Result<PlatformAsset, PdfiumAutoError> {
    let asset = |archive, member, file_name| PlatformAsset {
        archive,
        member,
        file_name,
    };
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Ok(asset("pdfium-linux-x64.tgz", "lib/libpdfium.so", "libpdfium.so")),
        ("linux", "aarch64") => Ok(asset("pdfium-linux-arm64.tgz", "lib/libpdfium.so", "libpdfium.so")),
        ("macos", "aarch64") => Ok(asset("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib")),
        ("macos", "x86_64") => Ok(asset("pdfium-mac-x64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib")),
        ("windows", "x86_64") => Ok(asset("pdfium-win-x64.tgz", "bin/pdfium.dll", "pdfium.dll")),
        ("windows", "aarch64") => Ok(asset("pdfium-win-arm64.tgz", "bin/pdfium.dll", "pdfium.dll")),
        (os, arch) => Err(PdfiumAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

/// Per-version cache directory, `~/.cache/docvoice/pdfium-{VERSION}` on Linux.
///
/// Overridden by `PDFIUM_AUTO_CACHE_DIR`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PDFIUM_AUTO_CACHE_DIR") {
        return PathBuf::from(dir).join(format!("pdfium-{PDFIUM_VERSION}"));
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("docvoice")
        .join(format!("pdfium-{PDFIUM_VERSION}"))
}

// Downloads happen at most once per process.
static DOWNLOADED: OnceLock<PathBuf> = OnceLock::new();

/// Resolves the PDFium library path and binds to it.
#[derive(Debug, Clone)]
pub struct PdfiumLocator {
    library_path: Option<PathBuf>,
    cache_dir: PathBuf,
    allow_download: bool,
}

impl Default for PdfiumLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfiumLocator {
    pub fn new() -> Self {
        Self {
            library_path: None,
            cache_dir: default_cache_dir(),
            allow_download: true,
        }
    }

    /// Use this library file instead of searching.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Never touch the network; fail with [`PdfiumAutoError::NotFound`] instead.
    pub fn offline(mut self) -> Self {
        self.allow_download = false;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of an already-present library, without downloading.
    pub fn find_local(&self) -> Option<PathBuf> {
        if let Some(p) = self.library_path.as_ref().filter(|p| p.exists()) {
            return Some(p.clone());
        }
        if let Some(p) = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
            if p.exists() {
                return Some(p);
            }
            warn!("PDFIUM_LIB_PATH '{}' does not exist", p.display());
        }
        let asset = platform_asset().ok()?;
        let cached = self.cache_dir.join(asset.file_name);
        cached.exists().then_some(cached)
    }

    /// Path of the library, downloading it into the cache if needed.
    pub fn locate(&self) -> Result<PathBuf, PdfiumAutoError> {
        if let Some(path) = self.find_local() {
            debug!("Using PDFium at {}", path.display());
            return Ok(path);
        }
        if !self.allow_download {
            return Err(PdfiumAutoError::NotFound {
                searched: self.cache_dir.display().to_string(),
            });
        }
        if let Some(path) = DOWNLOADED.get() {
            return Ok(path.clone());
        }

        let asset = platform_asset()?;
        let dest = self.cache_dir.join(asset.file_name);
        std::fs::create_dir_all(&self.cache_dir).map_err(PdfiumAutoError::CacheDir)?;

        let url = format!("{BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", asset.archive);
        info!("Downloading PDFium from {}", url);
        let archive = download(&url)?;
        extract_member(&archive, asset.member, &dest)?;
        info!("PDFium cached at {}", dest.display());

        let _ = DOWNLOADED.set(dest.clone());
        Ok(dest)
    }

    /// Locate the library and bind a fresh [`Pdfium`] instance to it.
    pub fn bind(&self) -> Result<Pdfium, PdfiumAutoError> {
        let path = self.locate()?;
        Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| PdfiumAutoError::Bind {
                path,
                reason: e.to_string(),
            })
    }
}

fn download(url: &str) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let mut buf = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    response
        .read_to_end(&mut buf)
        .map_err(|e| PdfiumAutoError::Download(format!("Read error: {e}")))?;
    Ok(buf)
}

fn extract_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut tar = Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        let matches = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        if matches {
            entry
                .unpack(dest)
                .map_err(|e| PdfiumAutoError::Extract(format!("Unpack failed: {e}")))?;
            return Ok(());
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{member}' not found in archive"
    )))
}
