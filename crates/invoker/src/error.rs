//! Invoker error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Why an operation was abandoned without running.
///
/// All variants are handled identically by the dispatch loop: log, record,
/// move on to the next eligible operation. None is fatal to the invoker,
/// and none triggers an automatic retry.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("operation '{name}' failed preparation")]
    PreparationFailed { name: String },

    #[error("operation '{name}' did not become ready within {timeout:?}")]
    PreparationTimedOut { name: String, timeout: Duration },

    #[error("operation '{name}' was destroyed by its owner before completion")]
    Destroyed { name: String },

    #[error("operation '{name}' was already gone when dispatched")]
    Stale { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_operation() {
        let err = InvokeError::PreparationTimedOut {
            name: "fetch".into(),
            timeout: Duration::from_secs(5),
        };
        let text = err.to_string();
        assert!(text.contains("fetch"));
        assert!(text.contains("5s"));

        let err = InvokeError::Destroyed { name: "pull".into() };
        assert!(err.to_string().contains("pull"));
    }
}
