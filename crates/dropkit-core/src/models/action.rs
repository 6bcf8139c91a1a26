//! Configured pipeline steps.
//!
//! At the boundary a step is a kind plus a string option bag, using the
//! option keys the drop-zone front end already speaks. Internally each kind
//! carries its own typed option record so stages never look up strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::ActionConfigError;
use crate::format::ConversionTarget;
use crate::ids::ActionId;

/// String-keyed option bag as exchanged with the front end and presets.
pub type OptionBag = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    ConvertFormat,
    ResizeImages,
    ReduceSize,
    CompressFiles,
    FileRenaming,
    CombineFiles,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::ConvertFormat,
        ActionKind::ResizeImages,
        ActionKind::ReduceSize,
        ActionKind::CompressFiles,
        ActionKind::FileRenaming,
        ActionKind::CombineFiles,
    ];

    /// Whether the step runs once over the whole batch rather than per file.
    pub fn is_batch_stage(self) -> bool {
        matches!(self, ActionKind::CompressFiles | ActionKind::CombineFiles)
    }
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ActionKind::ConvertFormat => write!(f, "convert-format"),
            ActionKind::ResizeImages => write!(f, "resize-images"),
            ActionKind::ReduceSize => write!(f, "reduce-size"),
            ActionKind::CompressFiles => write!(f, "compress-files"),
            ActionKind::FileRenaming => write!(f, "file-renaming"),
            ActionKind::CombineFiles => write!(f, "combine-files"),
        }
    }
}

impl FromStr for ActionKind {
    type Err = ActionConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "convert-format" => Ok(ActionKind::ConvertFormat),
            "resize-images" => Ok(ActionKind::ResizeImages),
            "reduce-size" => Ok(ActionKind::ReduceSize),
            "compress-files" => Ok(ActionKind::CompressFiles),
            "file-renaming" => Ok(ActionKind::FileRenaming),
            "combine-files" => Ok(ActionKind::CombineFiles),
            _ => Err(ActionConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// Declares a small string-valued option enum with its accepted spellings.
macro_rules! option_enum {
    ($name:ident, $key:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ActionConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ActionConfigError::InvalidValue {
                        key: $key.to_string(),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

option_enum!(ConvertScope, "conversionType" {
    Separately => "separately",
    All => "all",
});

option_enum!(ResizeMode, "resizeOption" {
    Percentage => "percentage",
    Dimensions => "dimensions",
    MaxWidth => "maxWidth",
    MaxHeight => "maxHeight",
});

option_enum!(ImageOutputFormat, "outputFormat" {
    Original => "original",
    Jpg => "jpg",
    Png => "png",
    Webp => "webp",
});

option_enum!(ReduceMode, "sizeOption" {
    Max => "max",
    Email => "email",
});

option_enum!(ReduceQuality, "quality" {
    Less => "less",
    Medium => "medium",
    High => "high",
});

option_enum!(EmailLimit, "emailLimit" {
    TenMb => "10MB",
    FiveMb => "5MB",
    TwoMb => "2MB",
});

option_enum!(RenameMode, "renameOption" {
    Before => "before",
    After => "after",
    Replace => "replace",
});

option_enum!(CombineMode, "combineType" {
    SameFormat => "same-format",
    Pdf => "pdf",
    MergeExcel => "merge-excel",
});

/// Largest width or height a resize step may ask for.
pub const MAX_RESIZE_EDGE: u32 = 16_383;

impl EmailLimit {
    pub fn bytes(self) -> u64 {
        const MB: u64 = 1024 * 1024;
        match self {
            EmailLimit::TenMb => 10 * MB,
            EmailLimit::FiveMb => 5 * MB,
            EmailLimit::TwoMb => 2 * MB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub scope: ConvertScope,
    pub target: ConversionTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeOptions {
    pub mode: ResizeMode,
    pub percentage: u32,
    pub width: u32,
    pub height: u32,
    pub maintain_aspect_ratio: bool,
    pub output_format: ImageOutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceOptions {
    pub mode: ReduceMode,
    pub quality: ReduceQuality,
    pub email_limit: EmailLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOptions {
    pub mode: RenameMode,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineOptions {
    pub mode: CombineMode,
    pub output_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressOptions {
    pub zip_name: String,
}

impl CompressOptions {
    pub fn bundle_file_name(&self) -> String {
        format!("{}.zip", self.zip_name.trim())
    }
}

/// Typed configuration of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ConvertFormat(ConvertOptions),
    ResizeImages(ResizeOptions),
    ReduceSize(ReduceOptions),
    CompressFiles(CompressOptions),
    FileRenaming(RenameOptions),
    CombineFiles(CombineOptions),
}

impl Action {
    /// Options a freshly added step starts with.
    pub fn default_for(kind: ActionKind) -> Self {
        match kind {
            ActionKind::ConvertFormat => Action::ConvertFormat(ConvertOptions {
                scope: ConvertScope::Separately,
                target: ConversionTarget::Pdf,
            }),
            ActionKind::ResizeImages => Action::ResizeImages(ResizeOptions {
                mode: ResizeMode::Percentage,
                percentage: 50,
                width: 800,
                height: 600,
                maintain_aspect_ratio: true,
                output_format: ImageOutputFormat::Original,
            }),
            ActionKind::ReduceSize => Action::ReduceSize(ReduceOptions {
                mode: ReduceMode::Max,
                quality: ReduceQuality::Less,
                email_limit: EmailLimit::TenMb,
            }),
            ActionKind::CompressFiles => Action::CompressFiles(CompressOptions {
                zip_name: "processed_files".to_string(),
            }),
            ActionKind::FileRenaming => Action::FileRenaming(RenameOptions {
                mode: RenameMode::Before,
                text: "processed_".to_string(),
            }),
            ActionKind::CombineFiles => Action::CombineFiles(CombineOptions {
                mode: CombineMode::Pdf,
                output_name: "combined".to_string(),
            }),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ConvertFormat(_) => ActionKind::ConvertFormat,
            Action::ResizeImages(_) => ActionKind::ResizeImages,
            Action::ReduceSize(_) => ActionKind::ReduceSize,
            Action::CompressFiles(_) => ActionKind::CompressFiles,
            Action::FileRenaming(_) => ActionKind::FileRenaming,
            Action::CombineFiles(_) => ActionKind::CombineFiles,
        }
    }

    /// Parse an option bag, starting from the defaults for `kind`.
    ///
    /// Keys the bag omits keep their default. Keys a kind does not know are
    /// ignored. The result is validated before it is returned.
    pub fn from_options(kind: ActionKind, options: &OptionBag) -> Result<Self, ActionConfigError> {
        let mut action = Self::default_for(kind);
        action.apply_options(options)?;
        action.validate()?;
        Ok(action)
    }

    /// Merge `options` into this action without validating ranges.
    fn apply_options(&mut self, options: &OptionBag) -> Result<(), ActionConfigError> {
        let get = |key: &str| options.get(key).map(|v| v.trim());

        match self {
            Action::ConvertFormat(opts) => {
                if let Some(v) = get("conversionType") {
                    opts.scope = v.parse()?;
                }
                if let Some(v) = get("format") {
                    opts.target = v.parse()?;
                }
            }
            Action::ResizeImages(opts) => {
                if let Some(v) = get("resizeOption") {
                    opts.mode = v.parse()?;
                }
                if let Some(v) = get("percentage") {
                    opts.percentage = parse_number("percentage", v)?;
                }
                if let Some(v) = get("width") {
                    opts.width = parse_number("width", v)?;
                }
                if let Some(v) = get("height") {
                    opts.height = parse_number("height", v)?;
                }
                if let Some(v) = get("maintainAspectRatio") {
                    opts.maintain_aspect_ratio = parse_bool("maintainAspectRatio", v)?;
                }
                if let Some(v) = get("outputFormat") {
                    opts.output_format = v.parse()?;
                }
            }
            Action::ReduceSize(opts) => {
                if let Some(v) = get("sizeOption") {
                    opts.mode = v.parse()?;
                }
                if let Some(v) = get("quality") {
                    opts.quality = v.parse()?;
                }
                if let Some(v) = get("emailLimit") {
                    opts.email_limit = v.parse()?;
                }
            }
            Action::CompressFiles(opts) => {
                if let Some(v) = options.get("zipName") {
                    opts.zip_name = v.clone();
                }
            }
            Action::FileRenaming(opts) => {
                if let Some(v) = get("renameOption") {
                    opts.mode = v.parse()?;
                }
                if let Some(v) = options.get("text") {
                    opts.text = v.clone();
                }
            }
            Action::CombineFiles(opts) => {
                if let Some(v) = get("combineType") {
                    opts.mode = v.parse()?;
                }
                if let Some(v) = options.get("outputName") {
                    opts.output_name = v.clone();
                }
            }
        }
        Ok(())
    }

    /// Render back into the boundary option bag, every key present.
    pub fn to_options(&self) -> OptionBag {
        let mut bag = OptionBag::new();
        let mut put = |key: &str, value: String| {
            bag.insert(key.to_string(), value);
        };

        match self {
            Action::ConvertFormat(opts) => {
                put("conversionType", opts.scope.to_string());
                put("format", opts.target.to_string());
            }
            Action::ResizeImages(opts) => {
                put("resizeOption", opts.mode.to_string());
                put("percentage", opts.percentage.to_string());
                put("width", opts.width.to_string());
                put("height", opts.height.to_string());
                put("maintainAspectRatio", opts.maintain_aspect_ratio.to_string());
                put("outputFormat", opts.output_format.to_string());
            }
            Action::ReduceSize(opts) => {
                put("sizeOption", opts.mode.to_string());
                put("quality", opts.quality.to_string());
                put("emailLimit", opts.email_limit.to_string());
            }
            Action::CompressFiles(opts) => put("zipName", opts.zip_name.clone()),
            Action::FileRenaming(opts) => {
                put("renameOption", opts.mode.to_string());
                put("text", opts.text.clone());
            }
            Action::CombineFiles(opts) => {
                put("combineType", opts.mode.to_string());
                put("outputName", opts.output_name.clone());
            }
        }
        bag
    }

    pub fn validate(&self) -> Result<(), ActionConfigError> {
        match self {
            Action::ConvertFormat(opts) => {
                if opts.target == ConversionTarget::None {
                    return Err(ActionConfigError::InvalidValue {
                        key: "format".to_string(),
                        value: opts.target.to_string(),
                    });
                }
            }
            Action::ResizeImages(opts) => {
                check_range("percentage", opts.percentage, 1, 100)?;
                check_range("width", opts.width, 1, MAX_RESIZE_EDGE)?;
                check_range("height", opts.height, 1, MAX_RESIZE_EDGE)?;
            }
            Action::ReduceSize(_) => {}
            Action::CompressFiles(opts) => validate_name("zipName", &opts.zip_name)?,
            Action::FileRenaming(opts) => validate_name("text", &opts.text)?,
            Action::CombineFiles(opts) => validate_name("outputName", &opts.output_name)?,
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, ActionConfigError> {
    value.parse::<u32>().map_err(|_| ActionConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ActionConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ActionConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn check_range(key: &str, value: u32, min: u32, max: u32) -> Result<(), ActionConfigError> {
    if value < min || value > max {
        return Err(ActionConfigError::OutOfRange {
            key: key.to_string(),
            value: i64::from(value),
            min: i64::from(min),
            max: i64::from(max),
        });
    }
    Ok(())
}

/// Names end up inside the bundle, so they must be non-empty single path segments.
fn validate_name(key: &str, value: &str) -> Result<(), ActionConfigError> {
    if value.trim().is_empty() {
        return Err(ActionConfigError::MissingOption(key.to_string()));
    }
    if value.contains(['/', '\\']) || value.trim() == "." || value.trim() == ".." {
        return Err(ActionConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// One configured, user-orderable pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActionStepRecord", into = "ActionStepRecord")]
pub struct ActionStep {
    pub id: ActionId,
    pub action: Action,
}

impl ActionStep {
    pub fn new(id: ActionId, action: Action) -> Self {
        Self { id, action }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn options(&self) -> OptionBag {
        self.action.to_options()
    }
}

/// Wire form of a step: `{ "id", "kind", "options": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStepRecord {
    pub id: ActionId,
    #[serde(flatten)]
    pub spec: ActionSpec,
}

impl TryFrom<ActionStepRecord> for ActionStep {
    type Error = ActionConfigError;

    fn try_from(record: ActionStepRecord) -> Result<Self, Self::Error> {
        Ok(ActionStep::new(record.id, record.spec.to_action()?))
    }
}

impl From<ActionStep> for ActionStepRecord {
    fn from(step: ActionStep) -> Self {
        Self {
            id: step.id,
            spec: ActionSpec {
                kind: step.kind(),
                options: step.options(),
            },
        }
    }
}

/// A step without identity, as stored in a preset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub kind: ActionKind,
    #[serde(default)]
    pub options: OptionBag,
}

impl ActionSpec {
    pub fn to_action(&self) -> Result<Action, ActionConfigError> {
        Action::from_options(self.kind, &self.options)
    }
}

/// A named, ordered list of steps loaded from or saved to JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPreset {
    #[serde(default)]
    pub name: Option<String>,
    pub actions: Vec<ActionSpec>,
}

impl Action {
    /// Merge a partial bag into the current options, validating the result.
    pub fn updated_with(&self, options: &OptionBag) -> Result<Self, ActionConfigError> {
        let mut updated = self.clone();
        updated.apply_options(options)?;
        updated.validate()?;
        Ok(updated)
    }
}
