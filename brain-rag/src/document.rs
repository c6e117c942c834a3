//! Data types for documents, chunks, points and search hits.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The file format of an uploaded document, derived from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Anything else, decoded as UTF-8 text.
    PlainText,
}

impl DocumentFormat {
    /// Detect the format from a filename's extension, ignoring case.
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            _ => Self::PlainText,
        }
    }

    /// Short lowercase label used in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "plain",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file awaiting ingestion. Lives only for one ingestion call.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The original filename, kept as the chunk `source`.
    pub filename: String,
    /// The declared format.
    pub format: DocumentFormat,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Document {
    /// Create a document, detecting its format from `filename`.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let format = DocumentFormat::from_filename(&filename);
        Self { filename, format, bytes: bytes.into() }
    }

    /// Stable identifier derived from the document contents.
    pub fn id(&self) -> String {
        content_id(&self.bytes)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_id(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Point identifier for chunk `chunk_index` of document `document_id`.
///
/// Identifiers are UUIDv5 so the vector store accepts them natively; the same
/// document always maps to the same ids, distinct documents never share one.
pub fn point_id(document_id: &str, chunk_index: usize) -> String {
    let name = format!("{document_id}:{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// A window of a document's extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position within one ingestion call.
    pub index: usize,
    /// The chunk text.
    pub text: String,
    /// Character offset (inclusive) of the chunk in the source text.
    pub start: usize,
    /// Character offset (exclusive) of the chunk in the source text.
    pub end: usize,
}

/// Similarity metric a collection is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity.
    Cosine,
    /// Raw dot product.
    Dot,
    /// Euclidean distance (lower is closer).
    Euclidean,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclidean => "euclidean",
        })
    }
}

/// The fixed schema of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Vector dimensionality.
    pub dimensions: usize,
    /// Similarity metric.
    pub metric: DistanceMetric,
}

impl CollectionSchema {
    /// Create a schema.
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self { dimensions, metric }
    }

    /// Cosine schema of the given dimensionality.
    pub fn cosine(dimensions: usize) -> Self {
        Self::new(dimensions, DistanceMetric::Cosine)
    }
}

impl fmt::Display for CollectionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dimensions, self.metric)
    }
}

/// Data stored alongside a vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    /// The chunk text.
    pub text: String,
    /// Content id of the source document.
    pub document_id: String,
    /// Chunk position within the source document.
    pub chunk_index: usize,
    /// Filename of the source document.
    pub source: String,
}

/// The persisted unit in the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// Point identifier (a UUID string).
    pub id: String,
    /// The embedding.
    pub vector: Vec<f32>,
    /// Stored payload.
    pub payload: PointPayload,
}

/// A retrieved point paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    /// Point identifier.
    pub id: String,
    /// Similarity score (higher is more relevant).
    pub score: f32,
    /// Stored payload.
    pub payload: PointPayload,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Content id of the ingested document.
    pub document_id: String,
    /// Number of chunks stored.
    pub chunks: usize,
}

/// A generated answer and the hits it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Completion text, verbatim.
    pub answer: String,
    /// Hits in ranked order.
    pub hits: Vec<Hit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_ignores_case() {
        assert_eq!(DocumentFormat::from_filename("report.PDF"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("notes.Docx"), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_filename("readme.md"), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_filename("no_extension"), DocumentFormat::PlainText);
    }

    #[test]
    fn point_ids_are_stable_and_distinct() {
        let a = content_id(b"alpha");
        let b = content_id(b"beta");
        assert_eq!(point_id(&a, 0), point_id(&a, 0));
        assert_ne!(point_id(&a, 0), point_id(&a, 1));
        assert_ne!(point_id(&a, 0), point_id(&b, 0));
        assert!(Uuid::parse_str(&point_id(&a, 3)).is_ok());
    }

    #[test]
    fn content_id_is_hex_sha256() {
        let id = content_id(b"");
        assert_eq!(id, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }
}
