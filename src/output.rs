//! Data model flowing through the pipeline.
//!
//! Everything here lives for exactly one request: created from the upload,
//! transformed stage by stage, and dropped once the reply is sent.

use crate::pipeline::classify::escape_continuation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An uploaded payload plus the filename the client claimed for it.
///
/// The filename is never trusted for format decisions; it is only logged and
/// forwarded to collaborators that want a name for multipart fields.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
}

impl RawUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Filename for logs, `"<unnamed>"` when the client sent none.
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or("<unnamed>")
    }
}

/// One analysable image: a rasterised PDF page or a directly uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based position in the source document.
    pub page_num: usize,
    /// Encoded image bytes (PNG for rasterised pages).
    pub data: Vec<u8>,
    pub mime_type: &'static str,
}

/// Text the vision collaborator produced for one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageAnalysis {
    pub page_num: usize,
    pub text: String,
    pub duration_ms: u64,
}

/// The closed set of document categories the classifier may answer with.
///
/// Anything the model answers outside this set becomes [`DocumentType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    TaxStatusCertificate,
    NationalIdCard,
    Passport,
    PropertyTitle,
    ElectricityBill,
    WaterBill,
    GasBill,
    PropertyTaxStatement,
    ArticlesOfIncorporation,
    PowerOfAttorney,
    ProofOfAddress,
    BankStatement,
    NationalPopulationRegistryCode,
    BirthCertificate,
    ProofOfIncome,
    Contract,
    Invoice,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 18] = [
        DocumentType::TaxStatusCertificate,
        DocumentType::NationalIdCard,
        DocumentType::Passport,
        DocumentType::PropertyTitle,
        DocumentType::ElectricityBill,
        DocumentType::WaterBill,
        DocumentType::GasBill,
        DocumentType::PropertyTaxStatement,
        DocumentType::ArticlesOfIncorporation,
        DocumentType::PowerOfAttorney,
        DocumentType::ProofOfAddress,
        DocumentType::BankStatement,
        DocumentType::NationalPopulationRegistryCode,
        DocumentType::BirthCertificate,
        DocumentType::ProofOfIncome,
        DocumentType::Contract,
        DocumentType::Invoice,
        DocumentType::Other,
    ];

    /// The label shown to users and expected from the model.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::TaxStatusCertificate => "Tax-status certificate",
            DocumentType::NationalIdCard => "National ID card",
            DocumentType::Passport => "Passport",
            DocumentType::PropertyTitle => "Property title",
            DocumentType::ElectricityBill => "Electricity bill",
            DocumentType::WaterBill => "Water bill",
            DocumentType::GasBill => "Gas bill",
            DocumentType::PropertyTaxStatement => "Property-tax statement",
            DocumentType::ArticlesOfIncorporation => "Articles of incorporation",
            DocumentType::PowerOfAttorney => "Power of attorney",
            DocumentType::ProofOfAddress => "Proof of address",
            DocumentType::BankStatement => "Bank statement",
            DocumentType::NationalPopulationRegistryCode => "National population registry code",
            DocumentType::BirthCertificate => "Birth certificate",
            DocumentType::ProofOfIncome => "Proof of income",
            DocumentType::Contract => "Contract",
            DocumentType::Invoice => "Invoice",
            DocumentType::Other => "Other",
        }
    }

    /// Exact (byte-for-byte) lookup of a label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DocumentType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How sure the classifier claimed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    /// Case-insensitive parse; Spanish labels are accepted too since the
    /// models often answer in the document's language.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" | "alta" => Some(Confidence::High),
            "medium" | "media" => Some(Confidence::Medium),
            "low" | "baja" => Some(Confidence::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed classifier answer. `document_type` is always a member of
/// [`DocumentType::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationRecord {
    pub document_type: DocumentType,
    pub confidence: Confidence,
    pub description: String,
}

impl ClassificationRecord {
    /// Render back to the `KEY: value` line format the model is asked for.
    ///
    /// Multi-line descriptions keep their extra lines, escaped where they
    /// would otherwise read as a key or end the description.
    pub fn render(&self) -> String {
        let mut lines = self.description.lines();
        let mut out = format!(
            "TYPE: {}\nCONFIDENCE: {}\nDESCRIPTION: {}",
            self.document_type,
            self.confidence,
            lines.next().unwrap_or_default()
        );
        for line in lines {
            out.push('\n');
            out.push_str(&escape_continuation(line));
        }
        out
    }
}

/// The reply every endpoint converges on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReply {
    pub text: String,
    /// Compressed (Ogg/Opus) speech for `text`.
    pub audio: Vec<u8>,
    pub language: String,
}

/// `/classify` reply: the parsed record plus the spoken summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationReply {
    pub record: ClassificationRecord,
    pub reply: PipelineReply,
}
