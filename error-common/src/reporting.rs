// Error reporting through tracing, at a level chosen by category.

use crate::types::{Categorized, ErrorCategory};

/// Log a categorized error once, where it leaves the engine
pub fn report_error<E: Categorized + ?Sized>(context: &str, error: &E) {
    let category = error.category();
    match category {
        ErrorCategory::Internal => tracing::error!(
            context = context,
            error_code = error.code(),
            error_category = %category,
            "{}",
            error
        ),
        ErrorCategory::Conflict => tracing::info!(
            context = context,
            error_code = error.code(),
            error_category = %category,
            retryable = true,
            "{}",
            error
        ),
        _ => tracing::warn!(
            context = context,
            error_code = error.code(),
            error_category = %category,
            "{}",
            error
        ),
    }
}
