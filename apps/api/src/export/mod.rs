//! Proposal document exports.

pub mod docx;
pub mod handlers;
pub mod markdown;
pub mod pdf;

use thiserror::Error;

use crate::errors::AppError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("DOCX packaging failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PDF service returned {status}: {message}")]
    Service { status: u16, message: String },
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Zip(_) | ExportError::Io(_) => AppError::Internal(e.into()),
            ExportError::Http(_) | ExportError::Service { .. } => AppError::Upstream {
                message: e.to_string(),
                details: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Docx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Docx => docx::DOCX_CONTENT_TYPE,
            ExportFormat::Pdf => "application/pdf",
        }
    }
}
