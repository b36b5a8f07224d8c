//! Error types surfaced at the symreg API boundary.
//!
//! Per the propagation policy: configuration errors are raised eagerly at
//! construction, per-individual evaluation errors are clamped rather than
//! propagated (see `ErrMax` in `symreg-core`), and dispatch/derivative
//! failures are treated as programming mistakes that abort the run.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

pub type SymregResult<T> = Result<T, SymregError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    InvalidStructure,
    UnknownOperator,
    UnsupportedDerivative,
    BudgetExhausted,
    Multiple,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

/// Errors surfaced at API boundaries. See spec §7.
#[derive(Debug)]
pub enum SymregError {
    /// Primitive-set misconfiguration, empty inputs to a metric, mismatched span lengths.
    InvalidArgument { what: ErrString },
    /// Tree invariants (§3) violated.
    InvalidStructure { what: ErrString },
    /// Dispatch lookup miss for a node hash.
    UnknownOperator { hash: u64 },
    /// Autodiff asked for a non-differentiable primitive.
    UnsupportedDerivative { node_type: ErrString },
    /// The evaluation budget was exhausted; usually surfaced as a driver stop rather than an error.
    BudgetExhausted,

    Multiple(MultiDisplay),

    Context {
        context: ErrorContext,
        source: Box<SymregError>,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl SymregError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::InvalidStructure { .. } => ErrorCode::InvalidStructure,
            Self::UnknownOperator { .. } => ErrorCode::UnknownOperator,
            Self::UnsupportedDerivative { .. } => ErrorCode::UnsupportedDerivative,
            Self::BudgetExhausted => ErrorCode::BudgetExhausted,
            Self::Multiple(_) => ErrorCode::Multiple,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    pub fn invalid_argument(what: impl Into<ErrString>) -> Self {
        SymregError::InvalidArgument { what: what.into() }
    }

    pub fn invalid_structure(what: impl Into<ErrString>) -> Self {
        SymregError::InvalidStructure { what: what.into() }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        SymregError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

impl Display for SymregError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { what } => write!(f, "invalid argument: {}", what),
            Self::InvalidStructure { what } => write!(f, "invalid tree structure: {}", what),
            Self::UnknownOperator { hash } => write!(f, "no dispatch registered for hash {}", hash),
            Self::UnsupportedDerivative { node_type } => {
                write!(f, "no closed-form derivative for node type {}", node_type)
            }
            Self::BudgetExhausted => write!(f, "evaluation budget exhausted"),
            Self::Multiple(m) => write!(f, "multiple errors:\n{}", m),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for SymregError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

#[derive(Debug)]
pub struct MultiDisplay(Vec<SymregError>);

impl Display for MultiDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "[{}] {} (code: {:?})", i, e, e.code())?;
        }
        Ok(())
    }
}

impl From<Vec<SymregError>> for MultiDisplay {
    fn from(v: Vec<SymregError>) -> Self {
        Self(v)
    }
}

pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> SymregResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> SymregResult<T>;
}

impl<T, E: Into<SymregError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> SymregResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> SymregResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! symreg_err {
    (InvalidArgument: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::SymregError::InvalidArgument { what: format!($fmt, $($arg),*).into() })
    };
    (InvalidStructure: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::SymregError::InvalidStructure { what: format!($fmt, $($arg),*).into() })
    };
}

#[macro_export]
macro_rules! symreg_bail {
    ($($tt:tt)+) => { return Err($crate::symreg_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::symreg_bail!($($tt)+); }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_formats_what() {
        let err = SymregError::invalid_argument("empty input span");
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.to_string().contains("empty input span"));
    }

    #[test]
    fn context_chains_source() {
        let err = SymregError::invalid_structure("arity mismatch").with_context("building tree");
        let rendered = err.to_string();
        assert!(rendered.contains("building tree"));
        assert!(rendered.contains("arity mismatch"));
    }

    #[test]
    fn ensure_macro_bails() {
        fn check(x: i32) -> SymregResult<()> {
            ensure!(x > 0, InvalidArgument: "x must be positive, got {}", x);
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }
}
