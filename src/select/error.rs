use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SelectErrorKind {
    Load,
    DefaultLoad,
    Create,
}

/// A collaborator failure recorded in the engine state.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SelectError {
    #[error("failed to load options for {query:?}: {message}")]
    LoadFailure { query: String, message: String },
    #[error("failed to resolve default value: {message}")]
    DefaultLoadFailure { message: String },
    #[error("failed to create option {label:?}: {message}")]
    CreateFailure { label: String, message: String },
}

impl SelectError {
    pub fn kind(&self) -> SelectErrorKind {
        match self {
            SelectError::LoadFailure { .. } => SelectErrorKind::Load,
            SelectError::DefaultLoadFailure { .. } => SelectErrorKind::DefaultLoad,
            SelectError::CreateFailure { .. } => SelectErrorKind::Create,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SelectError::LoadFailure { message, .. }
            | SelectError::DefaultLoadFailure { message }
            | SelectError::CreateFailure { message, .. } => message,
        }
    }
}

/// Errors produced by [`InMemoryOptionSource`](super::InMemoryOptionSource).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SourceError {
    #[error("no option with value {0:?}")]
    UnknownValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_message_follow_variant() {
        let error = SelectError::CreateFailure {
            label: "Foo".into(),
            message: "backend offline".into(),
        };
        assert_eq!(error.kind(), SelectErrorKind::Create);
        assert_eq!(error.message(), "backend offline");
        assert_eq!(
            error.to_string(),
            "failed to create option \"Foo\": backend offline"
        );
    }
}
