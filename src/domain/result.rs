//! Result type alias for reportflow

use super::errors::ReportFlowError;

/// Result type alias for reportflow operations
///
/// Uses [`ReportFlowError`] as the error type. Use this throughout the
/// codebase for fallible operations.
///
/// # Examples
///
/// ```
/// use reportflow::domain::result::Result;
/// use reportflow::domain::errors::ReportFlowError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(ReportFlowError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ReportFlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
