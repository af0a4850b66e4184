//! Document Parser Module
//!
//! Pure Rust text extraction from paginated and office documents.
//!
//! ## Supported Formats
//! - PDF: per-page text via pdf-extract
//! - Spreadsheets: .xlsx, .xlsm, .xls, .ods via calamine
//! - Word: .docx via docx-rs
//!
//! Only the leading pages / sheets are read; the caller caps the result
//! to the excerpt length anyway.

use calamine::{open_workbook_auto, Reader};
use std::path::Path;

/// Document parser using pure Rust crates
#[derive(Debug, Clone, Copy)]
pub struct DocumentParser {
    /// Pages (PDF) or sheets (spreadsheets) to read
    max_pages: usize,
    /// Stop collecting text once this many characters are gathered
    max_chars: usize,
}

impl DocumentParser {
    pub fn new(max_pages: usize, max_chars: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
            max_chars,
        }
    }

    /// Extract text from the first pages of a PDF
    /// Wrapped in catch_unwind to handle panics from malformed PDFs
    pub fn extract_pdf(&self, path: &Path) -> Result<String, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("Failed to read PDF file: {}", e))?;

        tracing::debug!("[DocumentParser] PDF file size: {} bytes", bytes.len());

        // The pdf_extract crate (and its cff-parser dependency) can panic on certain fonts/glyphs
        let pages = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })) {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => return Err(format!("PDF extraction failed: {}", e)),
            Err(_panic) => {
                return Err("PDF extraction panicked - likely contains malformed fonts".to_string())
            }
        };

        let total_pages = pages.len();
        let text = pages
            .into_iter()
            .take(self.max_pages)
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(
            "[DocumentParser] PDF: read {} of {} pages from {}",
            total_pages.min(self.max_pages),
            total_pages,
            path.display()
        );

        Ok(clean_text(&text))
    }

    /// Extract text from the first sheets of a workbook
    pub fn extract_spreadsheet(&self, path: &Path) -> Result<String, String> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| format!("Failed to open workbook: {}", e))?;

        let mut all_text = String::new();
        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

        for sheet_name in sheet_names.iter().take(self.max_pages) {
            if let Ok(range) = workbook.worksheet_range(sheet_name) {
                all_text.push_str(&format!("\n=== Sheet: {} ===\n", sheet_name));

                for row in range.rows() {
                    let row_text: Vec<String> = row
                        .iter()
                        .map(|cell| cell.to_string())
                        .filter(|s| !s.is_empty())
                        .collect();

                    if !row_text.is_empty() {
                        all_text.push_str(&row_text.join(" | "));
                        all_text.push('\n');
                    }

                    if all_text.len() >= self.byte_budget() {
                        break;
                    }
                }
            }
        }

        Ok(clean_text(&all_text))
    }

    /// Extract text from a DOCX body, stopping once the budget is filled
    pub fn extract_docx(&self, path: &Path) -> Result<String, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("Failed to read DOCX file: {}", e))?;

        let doc = docx_rs::read_docx(&bytes).map_err(|e| format!("Failed to parse DOCX: {}", e))?;

        let mut all_text = String::new();
        for child in &doc.document.children {
            extract_docx_content(child, &mut all_text);
            if all_text.len() >= self.byte_budget() {
                break;
            }
        }

        Ok(clean_text(&all_text))
    }

    /// Upper bound in bytes for `max_chars` characters
    fn byte_budget(&self) -> usize {
        self.max_chars.saturating_mul(4)
    }
}

fn push_run_text(run: &docx_rs::Run, output: &mut String) {
    for run_child in &run.children {
        if let docx_rs::RunChild::Text(text) = run_child {
            output.push_str(&text.text);
        }
    }
}

/// Recursively extract text from DOCX document elements
fn extract_docx_content(element: &docx_rs::DocumentChild, output: &mut String) {
    match element {
        docx_rs::DocumentChild::Paragraph(para) => {
            for child in &para.children {
                match child {
                    docx_rs::ParagraphChild::Run(run) => push_run_text(run, output),
                    docx_rs::ParagraphChild::Hyperlink(link) => {
                        for run in &link.children {
                            if let docx_rs::ParagraphChild::Run(r) = run {
                                push_run_text(r, output);
                            }
                        }
                    }
                    _ => {}
                }
            }
            output.push('\n');
        }
        docx_rs::DocumentChild::Table(table) => {
            for row in &table.rows {
                let docx_rs::TableChild::TableRow(tr) = row;
                for cell in &tr.cells {
                    let docx_rs::TableRowChild::TableCell(tc) = cell;
                    for child in &tc.children {
                        if let docx_rs::TableCellContent::Paragraph(para) = child {
                            for p_child in &para.children {
                                if let docx_rs::ParagraphChild::Run(run) = p_child {
                                    push_run_text(run, output);
                                }
                            }
                            output.push_str(" | ");
                        }
                    }
                }
                output.push('\n');
            }
        }
        _ => {}
    }
}

/// Drop blank lines and surrounding whitespace
pub(crate) fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
