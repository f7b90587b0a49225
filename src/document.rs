use std::path::Path;

use anyhow::Context as _;

use crate::gemini::GenerationService;
use crate::prompt;

/// An opened document, addressed by 1-based page number.
pub trait ParsedDocument: Send {
    fn page_count(&self) -> usize;
    fn page_fragments(&self, page: usize) -> anyhow::Result<Vec<String>>;
}

pub trait DocumentParser: Send + Sync {
    fn open(&self, bytes: &[u8]) -> anyhow::Result<Box<dyn ParsedDocument>>;
}

/// Joins fragments with spaces and terminates every page with a newline.
pub fn extract_text(parser: &dyn DocumentParser, bytes: &[u8]) -> anyhow::Result<String> {
    let document = parser.open(bytes).context("open document")?;
    let pages = document.page_count();

    let mut text = String::new();
    for page in 1..=pages {
        let fragments = document
            .page_fragments(page)
            .with_context(|| format!("extract text from page {page}"))?;
        text.push_str(&fragments.join(" "));
        text.push('\n');
    }

    tracing::info!(pages, chars = text.chars().count(), "extracted document text");
    Ok(text)
}

pub async fn extract_file(
    parser: std::sync::Arc<dyn DocumentParser>,
    path: &Path,
) -> anyhow::Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read document: {}", path.display()))?;
    tokio::task::spawn_blocking(move || extract_text(parser.as_ref(), &bytes))
        .await
        .context("join document extraction task")?
}

/// PDF text via `pdf-extract`; fragments are the whitespace-separated runs of
/// each page's text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

struct PdfDocument {
    pages: Vec<String>,
}

impl DocumentParser for PdfParser {
    fn open(&self, bytes: &[u8]) -> anyhow::Result<Box<dyn ParsedDocument>> {
        // pdf-extract panics on some malformed files instead of erroring.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| anyhow::anyhow!("parse PDF: extractor panicked on malformed input"))?
            .map_err(|err| anyhow::anyhow!("parse PDF: {err}"))?;
        Ok(Box::new(PdfDocument { pages }))
    }
}

impl ParsedDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_fragments(&self, page: usize) -> anyhow::Result<Vec<String>> {
        let text = page
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .ok_or_else(|| anyhow::anyhow!("page {page} out of range 1..={}", self.pages.len()))?;
        Ok(text.split_whitespace().map(str::to_owned).collect())
    }
}

/// Answers from the (truncated) document text only.
pub async fn answer_question(
    service: &dyn GenerationService,
    model: &str,
    document_text: &str,
    question: &str,
) -> anyhow::Result<String> {
    tracing::info!(
        model,
        chars = document_text.chars().count(),
        sent_chars = prompt::truncate_document(document_text).chars().count(),
        "answer from document"
    );
    let request = prompt::document_answer_request(model, document_text, question);
    let answer = service
        .generate(&request)
        .await
        .context("Failed to get answer")?;
    Ok(answer.trim().to_owned())
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
