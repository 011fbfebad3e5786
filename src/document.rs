use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// The actual text content of the document
    pub content: String,
    /// Path relative to the source folder (used as document ID)
    pub document_id: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Create a new document from a file path, identified by `document_id`
    pub fn from_file<P: AsRef<Path>>(file_path: P, document_id: String) -> Result<Self> {
        let path = file_path.as_ref();

        // Detect MIME type
        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type for {}: {}", document_id, mime_type);

        // Read content based on file type
        let content = read_document_content(path, &mime_type)?;

        Ok(Document {
            content,
            document_id,
            mime_type,
        })
    }
}

/// A file the loader could not turn into a document
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Load every supported file below `dir`.
///
/// A missing folder yields no documents. Hidden files and directories are
/// skipped, as are formats without a text extractor and files whose text
/// cannot be extracted. Only a folder that cannot be walked is a failure.
pub fn load_directory(dir: &Path) -> std::result::Result<Vec<Document>, LoadFailure> {
    if !dir.exists() {
        warn!("Source folder {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    if !dir.is_dir() {
        return Err(LoadFailure {
            path: dir.to_path_buf(),
            error: anyhow::anyhow!("not a directory"),
        });
    }

    let mut documents = Vec::new();

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|e| LoadFailure {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            error: e.into(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let mime_type = from_path(path).first_or_octet_stream().to_string();
        if !is_supported(&mime_type) {
            warn!(
                "Skipping {}: unsupported document format {}",
                path.display(),
                mime_type
            );
            continue;
        }

        let document_id = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        match Document::from_file(path, document_id) {
            Ok(document) => documents.push(document),
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );

    Ok(documents)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_supported(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
        || mime_type.starts_with("application/pdf")
        || mime_type == DOCX_MIME
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        // Handle PDF documents
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", path.display());
            let content = extract_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        // Handle Word documents
        DOCX_MIME => {
            info!("Processing Word document: {}", path.display());
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read Word document: {}", path.display()))?;
            let content = extract_docx_text(&bytes)
                .with_context(|| format!("Failed to parse Word document: {}", path.display()))?;
            Ok(normalize_whitespace(&content))
        }

        // Handle plain text documents
        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", path.display());
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            // Invalid UTF-8 sequences become U+FFFD
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }

        // Unsupported format
        _ => Err(anyhow::anyhow!(
            "Unsupported document format: {}. Only text, PDF and Word files are supported.",
            mime_type
        )),
    }
}

/// Concatenate the paragraph and table text of a .docx file, separated by
/// blank lines. Table cells are read row by row.
fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut content = String::new();
    for child in docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => push_paragraph(&mut content, &paragraph),
            docx_rs::DocumentChild::Table(table) => push_table(&mut content, &table),
            _ => {}
        }
    }

    Ok(content)
}

fn push_paragraph(content: &mut String, paragraph: &docx_rs::Paragraph) {
    for child in &paragraph.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for child in &run.children {
                if let docx_rs::RunChild::Text(text) = child {
                    content.push_str(&text.text);
                }
            }
        }
    }
    content.push_str("\n\n");
}

fn push_table(content: &mut String, table: &docx_rs::Table) {
    for docx_rs::TableChild::TableRow(row) in &table.rows {
        for docx_rs::TableRowChild::TableCell(cell) in &row.cells {
            for child in &cell.children {
                match child {
                    docx_rs::TableCellContent::Paragraph(paragraph) => {
                        push_paragraph(content, paragraph)
                    }
                    docx_rs::TableCellContent::Table(nested) => push_table(content, nested),
                    _ => {}
                }
            }
        }
    }
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Collapse runs of newlines to at most a paragraph break
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}
