use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchcovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage format")]
    UnknownFormat,

    #[error("Coverage report not found: {0}")]
    ReportNotFound(String),
}

pub type Result<T> = std::result::Result<T, PatchcovError>;
