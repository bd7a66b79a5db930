//! # Transform Stage
//!
//! Runs the user `transform_error` hook over an admitted record and puts
//! back the fields the hook is not allowed to change.

use tracing::warn;

use crate::hooks::ReporterHooks;
use crate::record::ErrorRecord;
use crate::types::ReporterError;

/// Result of the transform stage
#[derive(Debug)]
pub struct Transformed {
    /// Record to deliver
    pub record: ErrorRecord,
    /// Set when the hook failed and the original record was kept
    pub hook_error: Option<ReporterError>,
}

/// Applies the transform hook, falling back to `record` on failure
pub async fn transform(record: ErrorRecord, hooks: &ReporterHooks) -> Transformed {
    let original = record.clone();

    match hooks.run_transform(record).await {
        None => Transformed {
            record: original,
            hook_error: None,
        },
        Some(Ok(changed)) => Transformed {
            record: restore_invariants(changed, &original),
            hook_error: None,
        },
        Some(Err(err)) => {
            warn!(
                error_type = %original.error_type,
                error = %err,
                "transformError failed, delivering untransformed record"
            );
            Transformed {
                record: original,
                hook_error: Some(err),
            }
        }
    }
}

fn restore_invariants(mut changed: ErrorRecord, original: &ErrorRecord) -> ErrorRecord {
    changed.timestamp = original.timestamp;
    changed.source = original.source.clone();
    changed.category = changed.error_type.category();
    if changed.message.trim().is_empty() {
        changed.message = original.message.clone();
    }
    changed
}
