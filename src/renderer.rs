//! Certificate-document collaborators: an opaque renderer that turns
//! structured certificate fields into a document, and a document store that
//! persists the artifact and returns a retrievable URL.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CertificateData {
    pub learner_name: String,
    pub course_title: String,
    pub completion_date: DateTime<Utc>,
    pub certificate_id: String,
}

#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    async fn render(&self, data: &CertificateData) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists the document under `filename` and returns its public URL.
    async fn put(&self, filename: &str, bytes: &[u8]) -> anyhow::Result<String>;
}

/// Single-page PDF renderer. The layout is deliberately minimal; the engine
/// treats the document format as opaque.
#[derive(Default, Clone)]
pub struct PdfCertificateRenderer;

#[async_trait]
impl CertificateRenderer for PdfCertificateRenderer {
    async fn render(&self, data: &CertificateData) -> anyhow::Result<Vec<u8>> {
        let lines = [
            "Certificate of Completion".to_string(),
            format!("Awarded to {}", data.learner_name),
            format!("for completing {}", data.course_title),
            format!("on {}", data.completion_date.format("%Y-%m-%d")),
            data.certificate_id.clone(),
        ];
        Ok(build_pdf(&lines))
    }
}

fn pdf_escape(text: &str) -> String {
    text.chars()
        .flat_map(|c| match c {
            '(' | ')' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect()
}

fn build_pdf(lines: &[String]) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 24 Tf\n72 700 Td\n");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str("0 -40 Td\n");
        }
        content.push_str(&format!("({}) Tj\n", pdf_escape(line)));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

/// Writes certificate documents under `<data_dir>/certificates`, served by
/// the static file layer at `/certificates`.
#[derive(Clone)]
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into().join("certificates"),
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, filename: &str, bytes: &[u8]) -> anyhow::Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(filename), bytes).await?;
        Ok(format!("/certificates/{filename}"))
    }
}
