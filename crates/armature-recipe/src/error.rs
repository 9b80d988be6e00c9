use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type RecipeResult<T> = std::result::Result<T, RecipeError>;

/// The literal value a validation rule rejected, rendered the way operators
/// type it on the command line (`None`, `'text'`, `0.2`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Text(String),
    Number(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("None"),
            Self::Text(text) => write!(f, "'{text}'"),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Missing, Self::Number)
    }
}

impl From<Option<&str>> for FieldValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Missing, |text| Self::Text(text.to_string()))
    }
}

/// A configuration rule violation: which field, what value, how to fix it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid `{field_path}` value {value}. {hint}")]
pub struct ValidationError {
    pub field_path: String,
    pub value: FieldValue,
    pub hint: String,
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, value: impl Into<FieldValue>, hint: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), value: value.into(), hint: hint.into() }
    }
}

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("config resolution error: {0}")]
    ConfigResolution(String),

    #[error("invalid CLI override `{arg}`: {reason}")]
    InvalidOverride { arg: String, reason: String },

    #[error(
        "Output directory {} already exists and resume is false. Please change your output directory so that it is not overwritten.",
        .0.display()
    )]
    OutputDirExists(PathBuf),

    #[error(
        "`recipe={recipe}` must be launched through the distributed RL runtime (actor + learner); the offline training entry point does not run it."
    )]
    RequiresDistributedRuntime { recipe: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
