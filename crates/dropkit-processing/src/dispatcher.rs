//! Conversion dispatcher: picks the per-format transform for one file.

use bytes::Bytes;
use dropkit_core::format::{extension_of, replace_extension};
use dropkit_core::models::{FileEntry, OutputFile};
use dropkit_core::{ConversionCause, ConversionError, ConversionTarget, FileFormat, PipelineConfig};

use crate::image::{ImageSettings, ImageTransformer};
use crate::pdf::join_page_text;
use crate::traits::{CodecError, CodecResult, Codecs};

/// Routes each file to the codec that handles its format and requested target.
///
/// | format      | none               | targets                      |
/// |-------------|--------------------|------------------------------|
/// | image       | bounded recompress | webp                         |
/// | pdf         | structural re-save | txt                          |
/// | document    | unchanged          | txt, pdf                     |
/// | spreadsheet | unchanged          | csv, json (first sheet only) |
/// | other       | unchanged          |                              |
#[derive(Clone, Debug)]
pub struct ConversionDispatcher {
    codecs: Codecs,
    images: ImageTransformer,
}

impl ConversionDispatcher {
    pub fn new(codecs: Codecs, settings: ImageSettings) -> Self {
        let images = ImageTransformer::new(codecs.image.clone(), settings);
        Self { codecs, images }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(Codecs::default(), ImageSettings::from_config(config))
    }

    pub fn codecs(&self) -> &Codecs {
        &self.codecs
    }

    pub fn images(&self) -> &ImageTransformer {
        &self.images
    }

    /// Convert using the entry's own requested target.
    pub fn convert(&self, entry: &FileEntry) -> Result<OutputFile, ConversionError> {
        self.convert_to(entry, entry.requested_conversion())
    }

    /// Convert to an explicit target. `None` and `Some(ConversionTarget::None)`
    /// are equivalent.
    pub fn convert_to(
        &self,
        entry: &FileEntry,
        target: Option<ConversionTarget>,
    ) -> Result<OutputFile, ConversionError> {
        let target = target.unwrap_or(ConversionTarget::None);
        let format = entry.format();

        tracing::debug!(
            file_id = %entry.id(),
            file_name = %entry.name(),
            format = %format,
            target = %target,
            "Dispatching conversion"
        );

        if !format.accepts(target) {
            return Err(ConversionError::new(
                entry.id(),
                entry.name(),
                ConversionCause::Unsupported,
                format!("{} files cannot be converted to {}", format, target),
            ));
        }

        let (data, name) = self.run_codec(entry, format, target).map_err(|e| {
            tracing::warn!(
                file_id = %entry.id(),
                file_name = %entry.name(),
                cause = %e.cause,
                error = %e.message,
                "Conversion failed"
            );
            ConversionError::new(entry.id(), entry.name(), e.cause, e.message)
        })?;

        tracing::debug!(
            file_id = %entry.id(),
            output_name = %name,
            input_bytes = entry.size_bytes(),
            output_bytes = data.len(),
            "Conversion finished"
        );

        Ok(OutputFile::new(name, data, Some(entry.id())))
    }

    fn run_codec(
        &self,
        entry: &FileEntry,
        format: FileFormat,
        target: ConversionTarget,
    ) -> CodecResult<(Bytes, String)> {
        let data = entry.data();
        let name = entry.name();
        let renamed = |ext: &str| replace_extension(name, ext);

        match (format, target) {
            (FileFormat::Image, ConversionTarget::None) => {
                let (bytes, _) = self.images.recompress(data)?;
                Ok((bytes, name.to_string()))
            }
            (FileFormat::Image, ConversionTarget::Webp) => {
                Ok((self.images.to_webp(data)?, renamed("webp")))
            }
            (FileFormat::Pdf, ConversionTarget::None) => {
                Ok((self.codecs.pdf.optimize(data)?, name.to_string()))
            }
            (FileFormat::Pdf, ConversionTarget::Txt) => {
                let pages = self.codecs.pdf.extract_pages(data)?;
                Ok((Bytes::from(join_page_text(&pages)), renamed("txt")))
            }
            (FileFormat::Document, ConversionTarget::Txt) => {
                let text = self.extract_document_text(entry)?;
                Ok((Bytes::from(text), renamed("txt")))
            }
            (FileFormat::Document, ConversionTarget::Pdf) => {
                let text = self.extract_document_text(entry)?;
                Ok((self.codecs.pdf.render_text(name, &text)?, renamed("pdf")))
            }
            (FileFormat::Spreadsheet, ConversionTarget::Csv) => {
                let sheet = self.codecs.spreadsheet.first_sheet(data)?;
                Ok((Bytes::from(sheet.to_csv()), renamed("csv")))
            }
            (FileFormat::Spreadsheet, ConversionTarget::Json) => {
                let sheet = self.codecs.spreadsheet.first_sheet(data)?;
                Ok((Bytes::from(sheet.to_json()?), renamed("json")))
            }
            (_, ConversionTarget::None) => Ok((data.clone(), name.to_string())),
            (format, target) => Err(CodecError::unsupported(format!(
                "{} files cannot be converted to {}",
                format, target
            ))),
        }
    }

    fn extract_document_text(&self, entry: &FileEntry) -> CodecResult<String> {
        let extension = extension_of(entry.name()).unwrap_or_default();
        self.codecs.document.extract_text(entry.data(), &extension)
    }
}

impl Default for ConversionDispatcher {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::{Cell, Sheet};
    use crate::traits::{PdfCodec, SpreadsheetCodec};
    use dropkit_core::models::{FileId, IncomingFile};
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Arc;

    struct FixedSheet;

    impl SpreadsheetCodec for FixedSheet {
        fn first_sheet(&self, _data: &[u8]) -> CodecResult<Sheet> {
            Ok(Sheet {
                rows: vec![
                    vec![Cell::Text("name".to_string()), Cell::Text("qty".to_string())],
                    vec![Cell::Text("pens".to_string()), Cell::Int(3)],
                ],
            })
        }
    }

    struct BrokenPdf;

    impl PdfCodec for BrokenPdf {
        fn optimize(&self, _data: &[u8]) -> CodecResult<Bytes> {
            Err(CodecError::corrupt("xref table is damaged"))
        }

        fn extract_pages(&self, _data: &[u8]) -> CodecResult<Vec<String>> {
            Err(CodecError::corrupt("xref table is damaged"))
        }

        fn merge(&self, _documents: &[&[u8]]) -> CodecResult<Bytes> {
            Err(CodecError::codec("merge not available"))
        }

        fn render_text(&self, _title: &str, _text: &str) -> CodecResult<Bytes> {
            Err(CodecError::codec("render not available"))
        }
    }

    fn entry(id: u128, name: &str, data: impl Into<Bytes>) -> FileEntry {
        FileEntry::new(FileId::from_u128(id), IncomingFile::new(name, data))
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_pass_through_keeps_bytes_and_name() {
        let dispatcher = ConversionDispatcher::default();
        for name in ["notes.txt", "budget.xlsx", "report.docx", "README"] {
            let file = entry(1, name, b"opaque bytes".to_vec());
            let output = dispatcher.convert(&file).unwrap();
            assert_eq!(output.name, name);
            assert_eq!(output.data.as_ref(), b"opaque bytes");
            assert_eq!(output.source, Some(file.id()));
        }
    }

    #[test]
    fn test_spreadsheet_targets_replace_final_extension() {
        let codecs = Codecs {
            spreadsheet: Arc::new(FixedSheet),
            ..Codecs::default()
        };
        let dispatcher = ConversionDispatcher::new(codecs, ImageSettings::default());
        let file = entry(2, "a.b.xlsx", b"xlsx".to_vec());

        let csv = dispatcher
            .convert_to(&file, Some(ConversionTarget::Csv))
            .unwrap();
        assert_eq!(csv.name, "a.b.csv");
        assert_eq!(csv.data.as_ref(), b"name,qty\npens,3\n");

        let json = dispatcher
            .convert_to(&file, Some(ConversionTarget::Json))
            .unwrap();
        assert_eq!(json.name, "a.b.json");
        let rows: serde_json::Value = serde_json::from_slice(&json.data).unwrap();
        assert_eq!(rows[0]["qty"], 3);
    }

    #[test]
    fn test_image_to_webp_keeps_dimensions() {
        let source = png_bytes(64, 48);
        let file = entry(3, "photo.png", source.clone());
        let output = ConversionDispatcher::default()
            .convert_to(&file, Some(ConversionTarget::Webp))
            .unwrap();
        assert_eq!(output.name, "photo.webp");
        assert_ne!(output.data.as_ref(), source.as_slice());
        let decoded = image::load_from_memory(&output.data).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn test_image_without_target_keeps_name() {
        let file = entry(4, "photo.png", png_bytes(32, 32));
        let output = ConversionDispatcher::default().convert(&file).unwrap();
        assert_eq!(output.name, "photo.png");
        assert!(image::load_from_memory(&output.data).is_ok());
    }

    #[test]
    fn test_document_to_pdf_renders_text() {
        use docx_rs::{Docx, Paragraph, Run};
        let mut docx = Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Minutes")))
            .build()
            .pack(&mut docx)
            .unwrap();

        let file = entry(5, "minutes.docx", docx.into_inner());
        let output = ConversionDispatcher::default()
            .convert_to(&file, Some(ConversionTarget::Pdf))
            .unwrap();
        assert_eq!(output.name, "minutes.pdf");
        assert!(output.data.starts_with(b"%PDF"));
    }

    #[test]
    fn test_pdf_to_txt_extracts_page_text() {
        use crate::pdf::LopdfCodec;
        let source = LopdfCodec
            .render_text("Title", "Hello world\nSecond line")
            .unwrap();
        let file = entry(7, "doc.pdf", source);

        let output = ConversionDispatcher::default()
            .convert_to(&file, Some(ConversionTarget::Txt))
            .unwrap();
        assert_eq!(output.name, "doc.txt");
        let text = std::str::from_utf8(&output.data).unwrap();
        assert!(text.contains("Hello world"), "{text}");
        assert!(text.contains("Second line"), "{text}");
        assert!(!text.contains('\u{0}'));
    }

    #[test]
    fn test_codec_failure_names_the_file() {
        let codecs = Codecs {
            pdf: Arc::new(BrokenPdf),
            ..Codecs::default()
        };
        let dispatcher = ConversionDispatcher::new(codecs, ImageSettings::default());
        let file = entry(6, "scan.pdf", b"%PDF-1.4".to_vec());

        let err = dispatcher.convert(&file).unwrap_err();
        assert_eq!(err.file_id, FileId::from_u128(6));
        assert_eq!(err.file_name, "scan.pdf");
        assert_eq!(err.cause, ConversionCause::Corrupt);
        assert!(err.to_string().contains("xref table is damaged"));
    }

    #[test]
    fn test_corrupt_image_fails() {
        let file = entry(7, "broken.png", b"\x89PNG\r\n\x1a\nnot really".to_vec());
        let err = ConversionDispatcher::default().convert(&file).unwrap_err();
        assert_eq!(err.cause, ConversionCause::Corrupt);
        assert_eq!(err.file_name, "broken.png");
    }

    #[test]
    fn test_incompatible_target_is_unsupported() {
        let file = entry(8, "photo.jpg", b"jpg".to_vec());
        let err = ConversionDispatcher::default()
            .convert_to(&file, Some(ConversionTarget::Csv))
            .unwrap_err();
        assert_eq!(err.cause, ConversionCause::Unsupported);
    }
}
