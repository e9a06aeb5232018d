
use anyhow::{Context, Result, anyhow};
use fancy_regex::Regex;
use std::fs::{self, File};
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error, warn};

/// Extensions accepted for ingestion, lower-case and without the dot
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "docx", "txt", "md", "text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Detect the format from a file extension, case-insensitively
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "md" | "text" => Some(Self::PlainText),
            _ => None,
        }
    }
}

#[inline]
pub fn is_supported(path: &Path) -> bool {
    DocumentFormat::from_path(path).is_some()
}

/// Extract the text content of a document.
///
/// Unsupported formats and extraction failures are logged and yield an empty
/// string, which callers treat as "nothing to index".
#[inline]
pub fn load_document(path: &Path) -> String {
    let name = display_name(path);

    let Some(format) = DocumentFormat::from_path(path) else {
        warn!(
            "Unsupported format: {} ({})",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default(),
            name
        );
        return String::new();
    };

    let result = match format {
        DocumentFormat::Pdf => load_pdf(path),
        DocumentFormat::Docx => load_docx(path),
        DocumentFormat::PlainText => load_text(path),
    };

    match result {
        Ok(text) => {
            debug!("Extracted {} characters from {}", text.chars().count(), name);
            text
        }
        Err(e) => {
            error!("Error loading {:?} document {}: {:#}", format, name, e);
            String::new()
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn load_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_pdf(path: &Path) -> Result<String> {
    // The extractor panics on some malformed inputs
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }))
    .map_err(|_| anyhow!("PDF extractor panicked on {}", path.display()))?
    .with_context(|| format!("Failed to extract text from {}", path.display()))?;

    Ok(join_pdf_pages(&pages))
}

/// Prefix each non-empty page with its 1-based number
#[inline]
pub fn join_pdf_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("[Page {}]\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn load_docx(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a valid DOCX archive", path.display()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX archive has no word/document.xml")?
        .read_to_string(&mut xml)
        .context("Failed to read word/document.xml")?;

    Ok(extract_docx_paragraphs(&xml).join("\n\n"))
}

static PARAGRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>.*?</w:p>").expect("valid regex"));

static RUN_CONTENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:(tab|br|cr)\s*/>").expect("valid regex")
});

/// Paragraph texts of a `word/document.xml` body, skipping blank paragraphs
#[inline]
pub fn extract_docx_paragraphs(xml: &str) -> Vec<String> {
    PARAGRAPH_REGEX
        .find_iter(xml)
        .flatten()
        .map(|paragraph| paragraph_text(paragraph.as_str()))
        .filter(|text| !text.trim().is_empty())
        .collect()
}

fn paragraph_text(paragraph: &str) -> String {
    let mut text = String::new();

    for captures in RUN_CONTENT_REGEX.captures_iter(paragraph).flatten() {
        if let Some(run) = captures.get(1) {
            text.push_str(&decode_xml_entities(run.as_str()));
        } else if let Some(tag) = captures.get(2) {
            text.push(if tag.as_str() == "tab" { '\t' } else { '\n' });
        }
    }

    text
}

/// Decode the predefined XML entities and numeric character references
#[inline]
pub fn decode_xml_entities(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        output.push_str(rest.get(..amp).unwrap_or_default());
        let tail = rest.get(amp..).unwrap_or_default();

        let decoded = tail.find(';').and_then(|end| {
            let entity = tail.get(1..end)?;
            let ch = match entity {
                "amp" => '&',
                "lt" => '<',
                "gt" => '>',
                "quot" => '"',
                "apos" => '\'',
                _ => {
                    let code = if let Some(hex) = entity
                        .strip_prefix("#x")
                        .or_else(|| entity.strip_prefix("#X"))
                    {
                        u32::from_str_radix(hex, 16).ok()?
                    } else {
                        entity.strip_prefix('#')?.parse().ok()?
                    };
                    char::from_u32(code)?
                }
            };
            Some((ch, end + 1))
        });

        match decoded {
            Some((ch, consumed)) => {
                output.push(ch);
                rest = tail.get(consumed..).unwrap_or_default();
            }
            None => {
                output.push('&');
                rest = tail.get(1..).unwrap_or_default();
            }
        }
    }

    output.push_str(rest);
    output
}
