use reqwest::multipart::{Form, Part};
use tracing::info;

use crate::export::docx::DOCX_CONTENT_TYPE;
use crate::export::ExportError;

const CONVERT_PATH: &str = "/forms/libreoffice/convert";

/// Sends a DOCX to the conversion service and returns the PDF bytes.
pub async fn convert_docx_to_pdf(
    http: &reqwest::Client,
    service_url: &str,
    filename: &str,
    docx: Vec<u8>,
) -> Result<Vec<u8>, ExportError> {
    let part = Part::bytes(docx)
        .file_name(filename.to_string())
        .mime_str(DOCX_CONTENT_TYPE)?;
    let form = Form::new().part("files", part);

    let url = format!("{}{CONVERT_PATH}", service_url.trim_end_matches('/'));
    let response = http.post(&url).multipart(form).send().await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ExportError::Service {
            status: status.as_u16(),
            message,
        });
    }

    let pdf = response.bytes().await?;
    info!("Converted {filename} to PDF ({} bytes)", pdf.len());
    Ok(pdf.to_vec())
}
