//! Format sniffing: decide what an upload really is from its bytes.
//!
//! Filenames and declared content types are ignored; only the leading bytes
//! count. The check order matters: signatures are tried top to bottom and the
//! first match wins.

use serde::Serialize;
use std::fmt;

/// How far into a ZIP container to look for the Office part directories.
const ZIP_SCAN_LIMIT: usize = 2000;

const PDF_MAGIC: &[u8] = b"%PDF";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8";
const GIF_MAGIC: &[u8] = b"GIF8";
const RIFF_MAGIC: &[u8] = b"RIFF";
const WEBP_MAGIC: &[u8] = b"WEBP";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1";

/// Office Open XML part prefixes, in priority order.
const OOXML_MARKERS: [(&[u8], DetectedFormat); 3] = [
    (b"word/", DetectedFormat::Docx),
    (b"xl/", DetectedFormat::Xlsx),
    (b"ppt/", DetectedFormat::Pptx),
];

/// The closed set of formats the sniffer can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectedFormat {
    Pdf,
    Png,
    Jpeg,
    Gif,
    Webp,
    Docx,
    Doc,
    Xlsx,
    Xls,
    Pptx,
    Ppt,
    Zip,
    Unknown,
}

impl DetectedFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectedFormat::Pdf => "pdf",
            DetectedFormat::Png => "png",
            DetectedFormat::Jpeg => "jpeg",
            DetectedFormat::Gif => "gif",
            DetectedFormat::Webp => "webp",
            DetectedFormat::Docx => "docx",
            DetectedFormat::Doc => "doc",
            DetectedFormat::Xlsx => "xlsx",
            DetectedFormat::Xls => "xls",
            DetectedFormat::Pptx => "pptx",
            DetectedFormat::Ppt => "ppt",
            DetectedFormat::Zip => "zip",
            DetectedFormat::Unknown => "unknown",
        }
    }

    /// Formats that go through the office converter before rasterisation.
    pub fn is_office(self) -> bool {
        matches!(
            self,
            DetectedFormat::Docx
                | DetectedFormat::Doc
                | DetectedFormat::Xlsx
                | DetectedFormat::Xls
                | DetectedFormat::Pptx
                | DetectedFormat::Ppt
        )
    }

    /// Formats sent to the vision model as-is.
    pub fn is_image(self) -> bool {
        matches!(
            self,
            DetectedFormat::Png | DetectedFormat::Jpeg | DetectedFormat::Gif | DetectedFormat::Webp
        )
    }

    /// MIME type for image formats, used when handing the bytes to a vision provider.
    pub fn image_mime(self) -> Option<&'static str> {
        match self {
            DetectedFormat::Png => Some("image/png"),
            DetectedFormat::Jpeg => Some("image/jpeg"),
            DetectedFormat::Gif => Some("image/gif"),
            DetectedFormat::Webp => Some("image/webp"),
            _ => None,
        }
    }
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `bytes` by signature. Total: anything unrecognised is
/// [`DetectedFormat::Unknown`].
///
/// Legacy OLE2 containers are always reported as [`DetectedFormat::Doc`];
/// Word, Excel and PowerPoint binaries share that signature and are not told
/// apart.
pub fn detect(bytes: &[u8]) -> DetectedFormat {
    if bytes.starts_with(PDF_MAGIC) {
        DetectedFormat::Pdf
    } else if bytes.starts_with(PNG_MAGIC) {
        DetectedFormat::Png
    } else if bytes.starts_with(JPEG_MAGIC) {
        DetectedFormat::Jpeg
    } else if bytes.starts_with(GIF_MAGIC) {
        DetectedFormat::Gif
    } else if bytes.starts_with(RIFF_MAGIC) && bytes.get(8..12) == Some(WEBP_MAGIC) {
        DetectedFormat::Webp
    } else if bytes.starts_with(ZIP_MAGIC) {
        detect_ooxml(bytes)
    } else if bytes.starts_with(OLE2_MAGIC) {
        DetectedFormat::Doc
    } else {
        DetectedFormat::Unknown
    }
}

fn detect_ooxml(bytes: &[u8]) -> DetectedFormat {
    let head = &bytes[..bytes.len().min(ZIP_SCAN_LIMIT)];
    OOXML_MARKERS
        .iter()
        .find(|(marker, _)| contains(head, marker))
        .map(|&(_, format)| format)
        .unwrap_or(DetectedFormat::Zip)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_with(entry: &str) -> Vec<u8> {
        let mut v = b"PK\x03\x04\x14\x00\x06\x00".to_vec();
        v.extend_from_slice(&[0u8; 22]);
        v.extend_from_slice(entry.as_bytes());
        v
    }

    #[test]
    fn signature_table() {
        let cases: &[(&[u8], DetectedFormat)] = &[
            (b"%PDF-1.7\n", DetectedFormat::Pdf),
            (b"\x89PNG\r\n\x1a\n\x00\x00", DetectedFormat::Png),
            (b"\xff\xd8\xff\xe0", DetectedFormat::Jpeg),
            (b"GIF89a", DetectedFormat::Gif),
            (b"RIFF\x24\x00\x00\x00WEBPVP8 ", DetectedFormat::Webp),
            (b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1\x00", DetectedFormat::Doc),
            (b"hello world", DetectedFormat::Unknown),
            (b"", DetectedFormat::Unknown),
        ];
        for (bytes, expected) in cases {
            assert_eq!(detect(bytes), *expected, "bytes {:?}", bytes);
        }
    }

    #[test]
    fn riff_without_webp_is_unknown() {
        assert_eq!(detect(b"RIFF\x24\x00\x00\x00WAVEfmt "), DetectedFormat::Unknown);
        assert_eq!(detect(b"RIFF\x24"), DetectedFormat::Unknown);
    }

    #[test]
    fn ooxml_markers() {
        assert_eq!(detect(&zip_with("word/document.xml")), DetectedFormat::Docx);
        assert_eq!(detect(&zip_with("xl/workbook.xml")), DetectedFormat::Xlsx);
        assert_eq!(detect(&zip_with("ppt/presentation.xml")), DetectedFormat::Pptx);
        assert_eq!(detect(&zip_with("mimetype")), DetectedFormat::Zip);
    }

    #[test]
    fn ooxml_marker_priority() {
        // Both markers present: word/ wins.
        assert_eq!(
            detect(&zip_with("xl/media word/document.xml")),
            DetectedFormat::Docx
        );
    }

    #[test]
    fn ooxml_marker_beyond_scan_window_is_zip() {
        let mut bytes = zip_with("");
        bytes.resize(ZIP_SCAN_LIMIT, b'.');
        bytes.extend_from_slice(b"xl/workbook.xml");
        assert_eq!(detect(&bytes), DetectedFormat::Zip);
    }

    #[test]
    fn format_groups() {
        assert!(DetectedFormat::Doc.is_office());
        assert!(!DetectedFormat::Zip.is_office());
        assert!(DetectedFormat::Webp.is_image());
        assert_eq!(DetectedFormat::Jpeg.image_mime(), Some("image/jpeg"));
        assert_eq!(DetectedFormat::Pdf.image_mime(), None);
    }
}
