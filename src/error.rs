use thiserror::Error;

/// Everything that can stop a report from being built.
///
/// Per-cell problems (bad numbers, bad dates, unmapped countries) never show up here;
/// they are cleaned to defaults in `normalize` and `currency`.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Unable to decode input as {encodings}")]
    Decode { encodings: &'static str },

    #[error("Missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Amounts too large to total: {field} is not finite")]
    Overflow { field: &'static str },

    #[error("Could not detect report source from '{0}'")]
    UnknownSource(String),

    #[error("CSV parsing error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ReportError {
    /// Message shown to the person who uploaded the file.
    pub fn user_message(&self) -> String {
        match self {
            ReportError::Decode { .. } => {
                "The file could not be read. Save it as UTF-8 CSV and upload it again.".to_string()
            }
            ReportError::MissingColumns { columns } => {
                format!("Required columns are missing: {}", columns.join(", "))
            }
            ReportError::Overflow { .. } => {
                "The amounts in this file are too large to add up. Check the amount columns.".to_string()
            }
            ReportError::UnknownSource(name) => {
                format!("Could not tell whether '{}' is a Google Play or an Apple report. Pick the source explicitly.", name)
            }
            other => format!("Error while processing the report: {}", other),
        }
    }

    /// True for problems caused by the uploaded file rather than by this program.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, ReportError::Io { .. } | ReportError::Unexpected(_))
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
