use std::error::Error;
use std::fmt;

/// Error type used across the workspace.
#[derive(Debug)]
pub struct StrataError {
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl StrataError {
    pub fn new(msg: impl Into<String>) -> Self {
        StrataError {
            msg: msg.into(),
            source: None,
        }
    }

    pub fn with_source(msg: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StrataError {
            msg: msg.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl Error for StrataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            Some(source) => Some(source.as_ref()),
            None => None,
        }
    }
}

pub type Result<T, E = StrataError> = std::result::Result<T, E>;

/// Extension trait for wrapping foreign errors with a message.
pub trait ResultExt<T, E> {
    /// Wrap an error with a static context message.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap an error with a lazily computed context message.
    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| StrataError::with_source(msg, e))
    }

    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| StrataError::with_source(f(), e))
    }
}

pub trait OptionExt<T> {
    /// Error with a "missing" message if the value doesn't exist.
    fn required(self, field: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, field: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(StrataError::new(format!("Missing required field: {field}"))),
        }
    }
}

/// Return early with a "not implemented" error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        return Err($crate::StrataError::new(format!("Not yet implemented: {msg}")))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StrataError::with_source("failed to flush page", io);
        assert_eq!(err.to_string(), "failed to flush page: disk gone");
    }

    #[test]
    fn required_missing() {
        let opt: Option<i32> = None;
        let err = opt.required("page buffer").unwrap_err();
        assert!(err.to_string().contains("page buffer"));
    }

    #[test]
    fn not_implemented_returns_err() {
        fn inner() -> Result<()> {
            not_implemented!("DELTA_BINARY_PACKED")
        }
        let err = inner().unwrap_err();
        assert!(err.to_string().contains("Not yet implemented"));
    }
}
