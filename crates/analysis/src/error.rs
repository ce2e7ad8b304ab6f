use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Base analysis failed: {0}")]
    BaseAnalysis(String),

    #[error("Summary generation failed: {0}")]
    Summary(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Invalid analyzer configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
