//! Action stages.
//!
//! Per-file stages (resize, reduce, rename) run on a file's converted output
//! in action list order. Batch stages (combine, compress) run once over the
//! finished outputs.

use bytes::Bytes;
use dropkit_core::format::{extension_of, replace_extension};
use dropkit_core::models::{
    Action, ActionStep, CombineMode, CombineOptions, ConvertScope, FileEntry, ImageOutputFormat,
    OutputFile, ReduceOptions, ResizeOptions,
};
use dropkit_core::{ArchiveError, ConversionError, ConversionTarget};

use crate::dispatcher::ConversionDispatcher;
use crate::image::is_image_name;
use crate::naming::apply_rename;
use crate::spreadsheet::append_csv;
use crate::traits::{CodecError, CodecResult};

/// Conversion target for `entry` once every ConvertFormat step is applied.
///
/// Steps apply in list order on top of the entry's own choice. A
/// `separately` step only fills in a missing target; an `all` step replaces
/// it. Either way a step is skipped for formats that cannot take its target.
pub fn resolve_target(entry: &FileEntry, steps: &[ActionStep]) -> Option<ConversionTarget> {
    let mut target = entry.requested_conversion();
    for step in steps {
        if let Action::ConvertFormat(opts) = &step.action {
            if !entry.format().accepts(opts.target) {
                continue;
            }
            match opts.scope {
                ConvertScope::Separately if target.is_none() => target = Some(opts.target),
                ConvertScope::All => target = Some(opts.target),
                ConvertScope::Separately => {}
            }
        }
    }
    target.filter(|t| *t != ConversionTarget::None)
}

/// Name of the final bundle: the last CompressFiles step wins.
pub fn bundle_name(steps: &[ActionStep], default_name: &str) -> String {
    steps
        .iter()
        .rev()
        .find_map(|step| match &step.action {
            Action::CompressFiles(opts) => Some(opts.bundle_file_name()),
            _ => None,
        })
        .unwrap_or_else(|| default_name.to_string())
}

/// Runs every stage that touches a single file or the batch of outputs.
#[derive(Clone, Debug, Default)]
pub struct FileProcessor {
    dispatcher: ConversionDispatcher,
}

impl FileProcessor {
    pub fn new(dispatcher: ConversionDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &ConversionDispatcher {
        &self.dispatcher
    }

    /// Convert `entry` to its resolved target.
    pub fn convert(
        &self,
        entry: &FileEntry,
        steps: &[ActionStep],
    ) -> Result<OutputFile, ConversionError> {
        self.dispatcher
            .convert_to(entry, resolve_target(entry, steps))
    }

    /// Apply the per-file steps to a converted output, in list order.
    pub fn apply_file_stages(
        &self,
        entry: &FileEntry,
        mut output: OutputFile,
        steps: &[ActionStep],
    ) -> Result<OutputFile, ConversionError> {
        for step in steps {
            output = self.apply_step(output, &step.action).map_err(|e| {
                tracing::warn!(
                    file_id = %entry.id(),
                    action = %step.kind(),
                    error = %e.message,
                    "Action stage failed"
                );
                ConversionError::new(entry.id(), entry.name(), e.cause, e.message)
            })?;
        }
        Ok(output)
    }

    /// Convert and run the per-file stages in one go.
    pub fn process(
        &self,
        entry: &FileEntry,
        steps: &[ActionStep],
    ) -> Result<OutputFile, ConversionError> {
        let output = self.convert(entry, steps)?;
        self.apply_file_stages(entry, output, steps)
    }

    fn apply_step(&self, output: OutputFile, action: &Action) -> CodecResult<OutputFile> {
        match action {
            Action::ResizeImages(opts) if is_image_name(&output.name) => self.resize(output, opts),
            Action::ReduceSize(opts) => self.reduce(output, opts),
            Action::FileRenaming(opts) => Ok(OutputFile {
                name: apply_rename(&output.name, opts),
                ..output
            }),
            _ => Ok(output),
        }
    }

    fn resize(&self, output: OutputFile, options: &ResizeOptions) -> CodecResult<OutputFile> {
        let (data, format) = self.dispatcher.images().resize(&output.data, options)?;
        let name = match options.output_format {
            ImageOutputFormat::Original => output.name,
            _ => replace_extension(&output.name, format.extension()),
        };
        Ok(OutputFile { name, data, ..output })
    }

    fn reduce(&self, output: OutputFile, options: &ReduceOptions) -> CodecResult<OutputFile> {
        let data = if is_image_name(&output.name) {
            self.dispatcher.images().reduce(&output.data, options)?
        } else if extension_of(&output.name).as_deref() == Some("pdf") {
            self.dispatcher.codecs().pdf.optimize(&output.data)?
        } else {
            return Ok(output);
        };
        Ok(OutputFile { data, ..output })
    }

    /// Apply a CombineFiles step to the full output list.
    ///
    /// A merged output takes the position of the first file it absorbed.
    pub fn combine(
        &self,
        outputs: Vec<OutputFile>,
        options: &CombineOptions,
    ) -> Result<Vec<OutputFile>, ArchiveError> {
        let name = options.output_name.trim();
        match options.mode {
            CombineMode::Pdf => self.merge_group(outputs, name, 1, "pdf", &["pdf"]),
            CombineMode::MergeExcel => {
                self.merge_group(outputs, name, 1, "csv", &["csv", "xls", "xlsx"])
            }
            CombineMode::SameFormat => {
                let outputs = self.merge_group(outputs, name, 2, "pdf", &["pdf"])?;
                self.merge_group(outputs, name, 2, "csv", &["csv"])
            }
        }
    }

    fn merge_group(
        &self,
        outputs: Vec<OutputFile>,
        base_name: &str,
        min_members: usize,
        target_ext: &str,
        member_exts: &[&str],
    ) -> Result<Vec<OutputFile>, ArchiveError> {
        let is_member = |output: &OutputFile| {
            extension_of(&output.name).is_some_and(|ext| member_exts.contains(&ext.as_str()))
        };

        let count = outputs.iter().filter(|o| is_member(o)).count();
        if count < min_members {
            tracing::debug!(
                group = target_ext,
                members = count,
                "Not enough outputs to combine"
            );
            return Ok(outputs);
        }

        let merged_name = combined_name(base_name, target_ext);
        let (members, rest): (Vec<_>, Vec<_>) = outputs
            .into_iter()
            .enumerate()
            .partition(|(_, o)| is_member(o));
        let position = members.first().map(|(i, _)| *i).unwrap_or(0);
        let members: Vec<OutputFile> = members.into_iter().map(|(_, o)| o).collect();

        let data = match target_ext {
            "pdf" => self.merge_pdfs(&members),
            _ => self.merge_csvs(&members),
        }
        .map_err(|e| ArchiveError::Combine {
            name: merged_name.clone(),
            message: e.message,
        })?;

        tracing::info!(
            output_name = %merged_name,
            members = members.len(),
            output_bytes = data.len(),
            "Outputs combined"
        );

        let mut combined: Vec<OutputFile> = rest.into_iter().map(|(_, o)| o).collect();
        let position = position.min(combined.len());
        combined.insert(position, OutputFile::new(merged_name, data, None));
        Ok(combined)
    }

    fn merge_pdfs(&self, members: &[OutputFile]) -> CodecResult<Bytes> {
        let documents: Vec<&[u8]> = members.iter().map(|o| o.data.as_ref()).collect();
        self.dispatcher.codecs().pdf.merge(&documents)
    }

    fn merge_csvs(&self, members: &[OutputFile]) -> CodecResult<Bytes> {
        let documents = members
            .iter()
            .map(|output| match extension_of(&output.name).as_deref() {
                Some("csv") => String::from_utf8(output.data.to_vec()).map_err(|_| {
                    CodecError::corrupt(format!("{} is not valid UTF-8 text", output.name))
                }),
                _ => self
                    .dispatcher
                    .codecs()
                    .spreadsheet
                    .first_sheet(&output.data)
                    .map(|sheet| sheet.to_csv()),
            })
            .collect::<CodecResult<Vec<String>>>()?;
        let borrowed: Vec<&str> = documents.iter().map(String::as_str).collect();
        Ok(Bytes::from(append_csv(&borrowed)))
    }

    /// Run every batch stage except compression, in list order.
    pub fn apply_batch_stages(
        &self,
        mut outputs: Vec<OutputFile>,
        steps: &[ActionStep],
    ) -> Result<Vec<OutputFile>, ArchiveError> {
        for step in steps {
            if let Action::CombineFiles(opts) = &step.action {
                outputs = self.combine(outputs, opts)?;
            }
        }
        Ok(outputs)
    }
}

fn combined_name(base_name: &str, extension: &str) -> String {
    match extension_of(base_name) {
        Some(ext) if ext == extension => base_name.to_string(),
        _ => format!("{}.{}", base_name, extension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::LopdfCodec;
    use crate::traits::PdfCodec;
    use dropkit_core::FileStore;
    use dropkit_core::models::{
        ActionId, CompressOptions, ConvertOptions, EmailLimit, FileId, IncomingFile, ReduceMode,
        ReduceQuality, RenameMode, RenameOptions, ResizeMode,
    };
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn step(n: u128, action: Action) -> ActionStep {
        ActionStep::new(ActionId::from_u128(n), action)
    }

    fn convert(scope: ConvertScope, target: ConversionTarget) -> Action {
        Action::ConvertFormat(ConvertOptions { scope, target })
    }

    fn entry(name: &str, data: impl Into<Bytes>) -> FileEntry {
        FileEntry::new(FileId::from_u128(1), IncomingFile::new(name, data))
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn pdf(text: &str) -> OutputFile {
        let data = LopdfCodec.render_text(text, text).unwrap();
        OutputFile::new(format!("{}.pdf", text), data, None)
    }

    #[test]
    fn test_resolve_target_scopes() {
        let sheet = entry("budget.xlsx", b"x".to_vec());
        let image = entry("photo.png", b"x".to_vec());

        let separately = [step(1, convert(ConvertScope::Separately, ConversionTarget::Csv))];
        assert_eq!(resolve_target(&sheet, &separately), Some(ConversionTarget::Csv));
        assert_eq!(resolve_target(&image, &separately), None);

        let mut store = FileStore::default();
        let ids = store
            .add_files(vec![IncomingFile::new("budget.xlsx", b"x".to_vec())])
            .unwrap();
        store
            .set_conversion(ids[0], Some(ConversionTarget::Json))
            .unwrap();
        let chosen = store.get(ids[0]).unwrap().clone();
        assert_eq!(resolve_target(&chosen, &separately), Some(ConversionTarget::Json));

        let all = [step(2, convert(ConvertScope::All, ConversionTarget::Csv))];
        assert_eq!(resolve_target(&chosen, &all), Some(ConversionTarget::Csv));
        assert_eq!(resolve_target(&chosen, &[]), Some(ConversionTarget::Json));
    }

    #[test]
    fn test_bundle_name_last_compress_wins() {
        let steps = [
            step(1, Action::CompressFiles(CompressOptions { zip_name: "first".to_string() })),
            step(2, Action::CompressFiles(CompressOptions { zip_name: "final".to_string() })),
        ];
        assert_eq!(bundle_name(&steps, "processed_files.zip"), "final.zip");
        assert_eq!(bundle_name(&[], "processed_files.zip"), "processed_files.zip");
    }

    #[test]
    fn test_file_stages_run_in_order() {
        let processor = FileProcessor::default();
        let file = entry("photo.png", png_bytes(200, 100));
        let steps = [
            step(
                1,
                Action::ResizeImages(ResizeOptions {
                    mode: ResizeMode::Percentage,
                    percentage: 50,
                    width: 800,
                    height: 600,
                    maintain_aspect_ratio: true,
                    output_format: ImageOutputFormat::Jpg,
                }),
            ),
            step(
                2,
                Action::FileRenaming(RenameOptions {
                    mode: RenameMode::After,
                    text: "_small".to_string(),
                }),
            ),
        ];

        let output = processor.process(&file, &steps).unwrap();
        assert_eq!(output.name, "photo_small.jpg");
        let decoded = image::load_from_memory(&output.data).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn test_encoder_limits_surface_as_errors() {
        let processor = FileProcessor::default();
        let file = entry("wide.png", png_bytes(4, 1));
        let steps = [step(
            1,
            Action::ResizeImages(ResizeOptions {
                mode: ResizeMode::Dimensions,
                percentage: 100,
                width: 20_000,
                height: 1,
                maintain_aspect_ratio: false,
                output_format: ImageOutputFormat::Webp,
            }),
        )];

        let err = processor.process(&file, &steps).unwrap_err();
        assert_eq!(err.file_name, "wide.png");
        assert_eq!(err.cause, dropkit_core::ConversionCause::Unsupported);
        assert!(err.to_string().contains("unsupported input"), "{err}");
    }

    #[test]
    fn test_reduce_optimizes_pdf_outputs() {
        let processor = FileProcessor::default();
        let source = pdf("report");
        let file = entry("report.pdf", source.data.clone());
        let steps = [step(
            1,
            Action::ReduceSize(ReduceOptions {
                mode: ReduceMode::Max,
                quality: ReduceQuality::Less,
                email_limit: EmailLimit::TenMb,
            }),
        )];

        let output = processor
            .apply_file_stages(&file, source.clone(), &steps)
            .unwrap();
        assert_eq!(output.name, "report.pdf");
        assert!(output.data.len() <= source.data.len());
        let doc = lopdf::Document::load_mem(&output.data).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_stages_skip_unrelated_outputs() {
        let processor = FileProcessor::default();
        let file = entry("notes.txt", b"plain".to_vec());
        let steps = [step(
            1,
            Action::default_for(dropkit_core::models::ActionKind::ResizeImages),
        )];
        let output = processor.process(&file, &steps).unwrap();
        assert_eq!(output.name, "notes.txt");
        assert_eq!(output.data.as_ref(), b"plain");
    }

    #[test]
    fn test_combine_pdf_takes_first_position() {
        let processor = FileProcessor::default();
        let outputs = vec![
            OutputFile::new("a.txt", b"a".to_vec(), None),
            pdf("one"),
            OutputFile::new("b.txt", b"b".to_vec(), None),
            pdf("two"),
        ];
        let options = CombineOptions {
            mode: CombineMode::Pdf,
            output_name: "combined".to_string(),
        };

        let combined = processor.combine(outputs, &options).unwrap();
        let names: Vec<&str> = combined.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "combined.pdf", "b.txt"]);
        let doc = lopdf::Document::load_mem(&combined[1].data).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_merge_excel_appends_csv() {
        let processor = FileProcessor::default();
        let outputs = vec![
            OutputFile::new("jan.csv", b"item,cost\nrent,1200\n".to_vec(), None),
            OutputFile::new("feb.csv", b"item,cost\nrent,1250\n".to_vec(), None),
        ];
        let options = CombineOptions {
            mode: CombineMode::MergeExcel,
            output_name: "year".to_string(),
        };

        let combined = processor.combine(outputs, &options).unwrap();
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].name, "year.csv");
        assert_eq!(
            combined[0].data.as_ref(),
            b"item,cost\nrent,1200\nrent,1250\n"
        );
    }

    #[test]
    fn test_same_format_needs_two_members() {
        let processor = FileProcessor::default();
        let outputs = vec![
            pdf("solo"),
            OutputFile::new("a.csv", b"x\n1\n".to_vec(), None),
            OutputFile::new("b.csv", b"x\n2\n".to_vec(), None),
        ];
        let options = CombineOptions {
            mode: CombineMode::SameFormat,
            output_name: "merged".to_string(),
        };

        let combined = processor.combine(outputs, &options).unwrap();
        let names: Vec<&str> = combined.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["solo.pdf", "merged.csv"]);
    }

    #[test]
    fn test_combine_failure_is_archive_error() {
        let processor = FileProcessor::default();
        let outputs = vec![OutputFile::new("bad.pdf", b"not a pdf".to_vec(), None)];
        let options = CombineOptions {
            mode: CombineMode::Pdf,
            output_name: "combined".to_string(),
        };
        let err = processor.combine(outputs, &options).unwrap_err();
        assert!(matches!(err, ArchiveError::Combine { ref name, .. } if name == "combined.pdf"));
    }
}
