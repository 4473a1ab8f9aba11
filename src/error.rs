use thiserror::Error;

/// Errors that abort a whole conversion run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("invalid UTF-8 in document: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("KMZ archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no .kml entry found in KMZ archive")]
    NoKmlInArchive,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single coordinate line could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateFault {
    #[error("expected at least two comma separated fields")]
    MissingField,

    #[error("'{0}' is not an integer")]
    InvalidInteger(String),
}

/// A coordinate block that cannot be converted. Recovered by dropping the
/// owning shape, never fatal for the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid coordinate data on line {line_number} ({line:?}): {fault}")]
pub struct CoordinateError {
    /// 1-based line number within the block.
    pub line_number: usize,
    pub line: String,
    pub fault: CoordinateFault,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_error_message_names_line_and_fault() {
        let err = CoordinateError {
            line_number: 2,
            line: "abc,def".to_string(),
            fault: CoordinateFault::InvalidInteger("abc".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "invalid coordinate data on line 2 (\"abc,def\"): 'abc' is not an integer"
        );
        assert_eq!(
            CoordinateFault::MissingField.to_string(),
            "expected at least two comma separated fields"
        );
    }
}
