//! Word-processing documents: text extraction via `docx-rs`.

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild, TableCellContent};

use crate::traits::{guard_panics, CodecError, CodecResult, DocumentCodec};

/// Extracts paragraph text from `.docx` files. Legacy binary `.doc` files are
/// reported as unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxTextExtractor;

impl DocumentCodec for DocxTextExtractor {
    fn extract_text(&self, data: &[u8], extension: &str) -> CodecResult<String> {
        if extension.eq_ignore_ascii_case("doc") {
            return Err(CodecError::unsupported(
                "Legacy .doc files cannot be converted; save the file as .docx first",
            ));
        }

        let docx = guard_panics("DOCX parsing", || {
            docx_rs::read_docx(data)
                .map_err(|e| CodecError::corrupt(format!("Failed to parse DOCX: {}", e)))
        })?;

        let mut output = String::new();
        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(paragraph) => {
                    output.push_str(&paragraph_text(paragraph));
                    output.push('\n');
                }
                DocumentChild::Table(table) => {
                    for row in &table.rows {
                        let docx_rs::TableChild::TableRow(row) = row;
                        let cells: Vec<String> = row
                            .cells
                            .iter()
                            .map(|cell| {
                                let docx_rs::TableRowChild::TableCell(cell) = cell;
                                cell.children
                                    .iter()
                                    .filter_map(|content| match content {
                                        TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                                        _ => None,
                                    })
                                    .collect::<Vec<_>>()
                                    .join(" ")
                            })
                            .collect();
                        output.push_str(&cells.join("\t"));
                        output.push('\n');
                    }
                }
                _ => {}
            }
        }

        tracing::debug!(chars = output.len(), "DOCX text extracted");
        Ok(output)
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        match child {
            ParagraphChild::Run(run) => push_run_text(&run.children, &mut text),
            ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let ParagraphChild::Run(run) = inner {
                        push_run_text(&run.children, &mut text);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

fn push_run_text(children: &[RunChild], output: &mut String) {
    for child in children {
        match child {
            RunChild::Text(t) => output.push_str(&t.text),
            RunChild::Tab(_) => output.push('\t'),
            RunChild::Break(_) => output.push('\n'),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Run};
    use dropkit_core::ConversionCause;
    use std::io::Cursor;

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }
        let mut cursor = Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_extracts_paragraphs_in_order() {
        let bytes = docx_bytes(&["Quarterly report", "Revenue grew."]);
        let text = DocxTextExtractor.extract_text(&bytes, "docx").unwrap();
        assert_eq!(text, "Quarterly report\nRevenue grew.\n");
    }

    #[test]
    fn test_legacy_doc_is_unsupported() {
        let err = DocxTextExtractor.extract_text(b"\xD0\xCF\x11\xE0", "DOC").unwrap_err();
        assert_eq!(err.cause, ConversionCause::Unsupported);
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let err = DocxTextExtractor.extract_text(b"not a zip", "docx").unwrap_err();
        assert_eq!(err.cause, ConversionCause::Corrupt);
    }
}
