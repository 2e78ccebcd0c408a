//! PDF documents
//!
//! Detection by URL shape or the document's content type, and text
//! retrieval that prefers what the browser already has loaded before
//! fetching the bytes a second time.

use crate::browser::{js_string, PageDriver};
use crate::error::{ExtractionError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Text of a PDF.js viewer, if the page is one
const VIEWER_TEXT_SCRIPT: &str = r#"
(async () => {
    if (typeof PDFViewerApplication === 'undefined' || !PDFViewerApplication.pdfDocument) {
        return null;
    }
    const doc = PDFViewerApplication.pdfDocument;
    const pages = [];
    for (let i = 1; i <= doc.numPages; i++) {
        const page = await doc.getPage(i);
        const content = await page.getTextContent();
        pages.push(content.items.map(item => item.str).join(' '));
    }
    return pages.join('\f');
})()
"#;

/// Whether the URL alone marks a PDF
pub fn looks_like_pdf_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    path.ends_with(".pdf") || lower.contains("/pdf/") || lower.contains("type=pdf")
}

/// URL check, then a content-type sniff of the loaded document
pub async fn is_pdf(page: &dyn PageDriver, url: &str) -> bool {
    if looks_like_pdf_url(url) {
        return true;
    }
    match page.evaluate("document.contentType || ''").await {
        Ok(Value::String(ct)) => ct.to_ascii_lowercase().contains("pdf"),
        Ok(_) => false,
        Err(e) => {
            debug!("Content type sniff failed: {}", e);
            false
        }
    }
}

/// Page-ordered text of the PDF at `url`
#[instrument(skip(page, http))]
pub async fn pdf_text(page: &dyn PageDriver, http: &reqwest::Client, url: &str) -> Result<String> {
    if let Some(text) = viewer_text(page).await {
        info!("Read PDF text from the in-browser viewer");
        return Ok(text);
    }

    let bytes = match browser_fetch(page, url).await {
        Some(bytes) => bytes,
        None => {
            debug!("Fetching PDF over HTTP");
            http_fetch(http, url).await?
        }
    };

    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::PdfFailed(e.to_string()))?
        .map_err(|e| ExtractionError::PdfFailed(e.to_string()))?;

    let text = join_pages(&raw);
    info!("Extracted {} chars of PDF text", text.len());
    Ok(text)
}

/// Form-feed separated pages to blank-line separated text
pub fn join_pages(raw: &str) -> String {
    raw.split('\x0C')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn viewer_text(page: &dyn PageDriver) -> Option<String> {
    match page.evaluate(VIEWER_TEXT_SCRIPT).await {
        Ok(Value::String(text)) => Some(join_pages(&text)).filter(|t| !t.is_empty()),
        Ok(_) => None,
        Err(e) => {
            debug!("PDF viewer text unavailable: {}", e);
            None
        }
    }
}

/// Fetch with the page's own cookies and session, base64 across the bridge
async fn browser_fetch(page: &dyn PageDriver, url: &str) -> Option<Vec<u8>> {
    let script = format!(
        r#"
        (async () => {{
            const response = await fetch({});
            if (!response.ok) return null;
            const bytes = new Uint8Array(await response.arrayBuffer());
            let binary = '';
            for (let i = 0; i < bytes.length; i += 0x8000) {{
                binary += String.fromCharCode.apply(null, bytes.subarray(i, i + 0x8000));
            }}
            return btoa(binary);
        }})()
        "#,
        js_string(url)
    );

    match page.evaluate(&script).await {
        Ok(Value::String(encoded)) => match BASE64.decode(encoded.trim()) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                warn!("In-browser PDF download was not valid base64: {}", e);
                None
            }
        },
        Ok(_) => None,
        Err(e) => {
            debug!("In-browser PDF download failed: {}", e);
            None
        }
    }
}

async fn http_fetch(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ExtractionError::PdfFailed(e.to_string()))?
        .error_for_status()
        .map_err(|e| ExtractionError::PdfFailed(e.to_string()))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractionError::PdfFailed(e.to_string()))?;
    Ok(bytes.to_vec())
}
