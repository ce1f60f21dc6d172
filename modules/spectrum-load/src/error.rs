use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unknown strategy {name}, available: {}", available.join(", "))]
    UnknownStrategy { name: String, available: Vec<String> },

    #[error("A weighted strategy needs at least one action")]
    NoActions,

    #[error("Action {name} has weight 0")]
    ZeroWeight { name: String },

    #[error("Weights up to action {name} add up to more than {}", u32::MAX)]
    WeightOverflow { name: String },

    #[error("No action could be selected with choice {choice} out of {total}")]
    NoActionSelected { choice: u32, total: u32 },

    #[error(transparent)]
    Check(#[from] spectrum_poll::Error),
}

impl LoadError {
    /// Failures a load session logs and keeps going after.
    pub fn is_expected_during_load(&self) -> bool {
        match self {
            LoadError::Check(e) => e.is_expected_during_load(),
            _ => false,
        }
    }
}
