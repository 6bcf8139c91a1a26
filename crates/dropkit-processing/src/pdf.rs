//! PDF handling on top of `lopdf`, with text extraction through `pdf-extract`.

use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

use crate::traits::{guard_panics, CodecError, CodecResult, PdfCodec};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 11;
const LINE_HEIGHT: i64 = 14;
const MAX_LINE_CHARS: usize = 90;

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfCodec;

impl LopdfCodec {
    fn load(data: &[u8]) -> CodecResult<Document> {
        guard_panics("PDF parsing", || {
            Document::load_mem(data)
                .map_err(|e| CodecError::corrupt(format!("Failed to parse PDF: {}", e)))
        })
    }

    fn save(mut doc: Document) -> CodecResult<Bytes> {
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| CodecError::codec(format!("Failed to write PDF: {}", e)))?;
        Ok(Bytes::from(buffer))
    }
}

impl PdfCodec for LopdfCodec {
    fn optimize(&self, data: &[u8]) -> CodecResult<Bytes> {
        let mut doc = Self::load(data)?;
        doc.delete_zero_length_streams();
        let pruned = doc.prune_objects();
        doc.renumber_objects();
        doc.compress();
        let optimized = Self::save(doc)?;

        tracing::debug!(
            pruned_objects = pruned.len(),
            input_bytes = data.len(),
            output_bytes = optimized.len(),
            "PDF optimized"
        );

        // A rewrite can come out larger for already-compact files.
        if optimized.len() >= data.len() {
            return Ok(Bytes::copy_from_slice(data));
        }
        Ok(optimized)
    }

    fn extract_pages(&self, data: &[u8]) -> CodecResult<Vec<String>> {
        guard_panics("PDF text extraction", || {
            pdf_extract::extract_text_from_mem_by_pages(data)
                .map_err(|e| CodecError::corrupt(format!("PDF text extraction failed: {}", e)))
        })
    }

    fn merge(&self, documents: &[&[u8]]) -> CodecResult<Bytes> {
        let loaded = documents
            .iter()
            .map(|data| Self::load(data))
            .collect::<CodecResult<Vec<_>>>()?;
        let merged = merge_documents(loaded)?;
        Self::save(merged)
    }

    fn render_text(&self, title: &str, text: &str) -> CodecResult<Bytes> {
        let doc = render_text_document(title, text)?;
        Self::save(doc)
    }
}

/// Join per-page text: whitespace runs inside a page become single spaces,
/// pages are separated by newlines.
pub fn join_page_text(pages: &[String]) -> String {
    pages
        .iter()
        .map(|page| page.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn merge_documents(documents: Vec<Document>) -> CodecResult<Document> {
    if documents.is_empty() {
        return Err(CodecError::codec("No PDF documents to merge"));
    }

    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages is keyed by page number, so this keeps page order
        for object_id in doc.get_pages().into_values() {
            let page = doc
                .get_object(object_id)
                .map_err(|e| CodecError::corrupt(format!("Missing page object: {}", e)))?
                .to_owned();
            pages.push((object_id, page));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut pages_root: Option<(ObjectId, Object)> = None;

    for (object_id, object) in objects {
        match object.type_name().unwrap_or(b"") {
            b"Catalog" => {
                if catalog.is_none() {
                    catalog = Some((object_id, object));
                }
            }
            b"Pages" => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    let id = match &pages_root {
                        Some((id, existing)) => {
                            if let Ok(existing) = existing.as_dict() {
                                dictionary.extend(existing);
                            }
                            *id
                        }
                        None => object_id,
                    };
                    pages_root = Some((id, Object::Dictionary(dictionary)));
                }
            }
            // Pages are re-inserted below; outlines would point at stale pages.
            b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (catalog_id, catalog_object) =
        catalog.ok_or_else(|| CodecError::corrupt("PDF has no catalog"))?;
    let (pages_id, pages_object) =
        pages_root.ok_or_else(|| CodecError::corrupt("PDF has no page tree"))?;

    for (object_id, page) in &pages {
        if let Ok(dictionary) = page.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Parent", pages_id);
            merged
                .objects
                .insert(*object_id, Object::Dictionary(dictionary));
        }
    }

    let mut pages_dictionary = pages_object
        .as_dict()
        .map_err(|e| CodecError::corrupt(format!("Invalid page tree: {}", e)))?
        .clone();
    pages_dictionary.set("Count", pages.len() as i64);
    pages_dictionary.set(
        "Kids",
        pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    merged
        .objects
        .insert(pages_id, Object::Dictionary(pages_dictionary));

    let mut catalog_dictionary = catalog_object
        .as_dict()
        .map_err(|e| CodecError::corrupt(format!("Invalid catalog: {}", e)))?
        .clone();
    catalog_dictionary.set("Pages", pages_id);
    catalog_dictionary.remove(b"Outlines");
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dictionary));

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}

/// Word-wrap `text` into lines of at most `MAX_LINE_CHARS` characters.
/// Characters outside printable ASCII become `?` since the base font only covers Latin-1.
fn wrap_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let word: String = word
                .chars()
                .map(|c| if c.is_ascii_graphic() { c } else { '?' })
                .collect();
            for chunk in word.as_bytes().chunks(MAX_LINE_CHARS) {
                let chunk = String::from_utf8_lossy(chunk);
                if !line.is_empty() && line.len() + 1 + chunk.len() > MAX_LINE_CHARS {
                    lines.push(std::mem::take(&mut line));
                }
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&chunk);
            }
        }
        lines.push(line);
    }
    lines
}

fn render_text_document(title: &str, text: &str) -> CodecResult<Document> {
    let mut lines = vec![title.to_string(), String::new()];
    lines.extend(wrap_lines(text));
    let lines = wrap_lines(&lines.join("\n"));

    let lines_per_page = ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT).max(1) as usize;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for page_lines in lines.chunks(lines_per_page) {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
            Operation::new("TL", vec![LINE_HEIGHT.into()]),
            Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
        ];
        for line in page_lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations }
            .encode()
            .map_err(|e| CodecError::codec(format!("Failed to encode page content: {}", e)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf(title: &str, body: &str) -> Vec<u8> {
        LopdfCodec.render_text(title, body).unwrap().to_vec()
    }

    #[test]
    fn test_render_text_produces_loadable_pdf() {
        let bytes = sample_pdf("report.docx", "Hello world\nSecond paragraph");
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_render_text_paginates() {
        let body = (0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let doc = Document::load_mem(&sample_pdf("long", &body)).unwrap();
        assert!(doc.get_pages().len() >= 3);
    }

    #[test]
    fn test_merge_concatenates_pages_in_order() {
        let first = sample_pdf("first", "alpha");
        let long_body = (0..120).map(|i| format!("row {i}")).collect::<Vec<_>>().join("\n");
        let second = sample_pdf("second", &long_body);
        let second_pages = Document::load_mem(&second).unwrap().get_pages().len();

        let merged = LopdfCodec.merge(&[&first, &second]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 1 + second_pages);
    }

    #[test]
    fn test_optimize_output_still_loads() {
        let source = sample_pdf("opt", "some text to keep");
        let optimized = LopdfCodec.optimize(&source).unwrap();
        assert!(optimized.len() <= source.len());
        assert_eq!(Document::load_mem(&optimized).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn test_corrupt_pdf_is_reported() {
        let err = LopdfCodec.optimize(b"%PDF-1.4 garbage").unwrap_err();
        assert_eq!(err.cause, dropkit_core::ConversionCause::Corrupt);
        assert!(LopdfCodec.merge(&[b"nope".as_slice()]).is_err());
    }

    #[test]
    fn test_join_page_text_normalizes_whitespace() {
        let pages = vec!["Hello\n  world ".to_string(), "\tPage   two\n".to_string()];
        assert_eq!(join_page_text(&pages), "Hello world\nPage two");
    }

    #[test]
    fn test_wrap_lines_replaces_non_ascii() {
        let lines = wrap_lines("café au lait");
        assert_eq!(lines, vec!["caf? au lait".to_string()]);

        let long_word = "x".repeat(200);
        let lines = wrap_lines(&long_word);
        assert!(lines.iter().all(|l| l.len() <= MAX_LINE_CHARS));
        assert_eq!(lines.concat().len(), 200);
    }
}
