//! Pipeline stages for document, image and voice requests.
//!
//! Each submodule implements exactly one transformation step so it can be
//! tested on its own and swapped (behind its trait) without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ sniff ──▶ office ──▶ render ──▶ analyze ──▶ (classify) ──▶ respond
//! (bytes)   (magic)  (→ PDF)   (pdfium)  (vision)     (parse)       (TTS+Opus)
//! ```
//!
//! 1. [`sniff`]: decide the real format from the leading bytes
//! 2. [`office`]: convert office formats to PDF in a scratch directory
//! 3. [`render`]: rasterise pages; runs in `spawn_blocking` because pdfium
//!    is not async-safe
//! 4. [`encode`]: PNG bytes and base64 for the vision request body
//! 5. [`analyze`]: one vision call per page, strictly in order
//! 6. [`postprocess`]: deterministic cleanup of each vision answer
//! 7. [`classify`]: parse the classifier's `KEY: value` answer
//! 8. [`respond`]: synthesise speech and transcode it to Opus
//!
//! [`input`] is only used by the command line to load a path or URL.

pub mod analyze;
pub mod classify;
pub mod encode;
pub mod input;
pub mod office;
pub mod postprocess;
pub mod render;
pub mod respond;
pub mod sniff;
