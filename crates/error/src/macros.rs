/// Logs a failed result and wraps it into an `AppError`
///
/// # Example
/// ```ignore
/// with_context!(response.check(), "Failed to run schema definition")
/// ```
#[macro_export]
macro_rules! with_context {
    ($result:expr, $context:expr) => {
        $result.map_err(|e| {
            tracing::error!("{}: {}", $context, e);
            $crate::AppError::DatabaseError(anyhow::anyhow!("{}: {}", $context, e))
        })
    };

    ($result:expr, $error_type:ident, $context:expr) => {
        $result.map_err(|e| {
            tracing::error!("{}: {}", $context, e);
            $crate::AppError::$error_type(anyhow::anyhow!("{}: {}", $context, e))
        })
    };
}
