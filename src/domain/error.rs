// Error taxonomy for the graphs engine
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Network or API failure while fetching history or forecast data
    #[error("Fetch failure: {0}")]
    FetchFailure(String),

    /// Nothing to show: no configured sources or no returned samples
    #[error("No data: {0}")]
    NoData(String),

    /// Persisting the cache blob failed
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// A sample or forecast entry could not be interpreted
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GraphError {
    /// Network or API trouble, as opposed to a module that can never load.
    /// `NoData` is an empty state rather than a failure.
    pub fn is_fetch_related(&self) -> bool {
        matches!(self, GraphError::FetchFailure(_))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::ParseFailure(err.to_string())
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
