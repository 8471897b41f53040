//! Error handling foundation for gatehouse.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error types in their own
//! error modules, using rootcause's `.context()` to add layer-appropriate
//! context as errors propagate up the stack.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    fn fails() -> Result<(), Boom> {
        let inner: std::result::Result<(), Boom> = Err(Boom);
        inner?;
        Ok(())
    }

    #[test]
    fn result_type_wraps_context() {
        let ok: Result<i32, Boom> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
        assert!(fails().is_err());
    }
}
