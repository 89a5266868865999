use thiserror::Error;

/// Main error type of the chunker.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum ChunkerError {
    #[error("{0}")]
    WithContextError(String),

    /// The input cannot be opened or parsed as a spreadsheet. Fatal to one invocation.
    #[error("Unreadable file '{0}': {1}")]
    UnreadableFile(String, String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    RangeError(#[from] crate::spreadsheet::range::RangeError),

    // Chunking module errors
    #[error("{0}")]
    StrategyError(#[from] crate::chunking::StrategyError),

    #[error("{0}")]
    PipelineError(#[from] crate::pipeline::PipelineError),
}

pub(crate) trait ResultMessage {
    /// Prefixes the error message with some context, usually the file name
    fn with_prefix(self, message: &str) -> Self;

    /// Folds any failure into `UnreadableFile` for the given file
    fn or_unreadable(self, file_name: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ChunkerError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ChunkerError::WithContextError(format!("{}: {}", message, e)))
    }

    fn or_unreadable(self, file_name: &str) -> Self {
        self.map_err(|e| match e {
            ChunkerError::UnreadableFile(..) => e,
            _ => ChunkerError::UnreadableFile(file_name.to_owned(), e.to_string()),
        })
    }
}
