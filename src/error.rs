//! Process-level error type.
//!
//! Every fallible path returns `AppError`; `main` turns it into the process
//! exit code the external scheduler watches. Exit code classes:
//!
//! - 2: configuration problems and local file I/O
//! - 3: missing or insufficient data
//! - 4: upstream trouble (network, payload schema) and fits that produce no
//!   usable result

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Bad flags, bad paths, or an unreadable/unwritable local file.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// A series or dataset too small (or too degenerate) to work with.
    pub fn missing_data(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    /// An upstream fetch failed.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    /// An upstream payload did not match the expected schema.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    /// The optimizer produced no usable result.
    pub fn fit(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_map_to_exit_code_classes() {
        assert_eq!(AppError::config("x").exit_code(), 2);
        assert_eq!(AppError::missing_data("x").exit_code(), 3);
        assert_eq!(AppError::network("x").exit_code(), 4);
        assert_eq!(AppError::parse("x").exit_code(), 4);
        assert_eq!(AppError::fit("x").exit_code(), 4);
    }

    #[test]
    fn display_is_the_bare_message() {
        let err = AppError::network("JHU confirmed request failed");
        assert_eq!(err.to_string(), "JHU confirmed request failed");
    }
}
