//! Status messages attached to host states

use crate::error::HandlerError;
use crate::facts::HostFacts;

/// Placeholder replaced by the failing hardware checks.
pub const FAILING_VALIDATIONS_PLACEHOLDER: &str = "$FAILING_VALIDATIONS";

/// Host stopped checking in.
pub const STATUS_INFO_DISCONNECTED: &str =
    "Host has stopped communicating with the installation service";

/// Host connected but has not reported its inventory.
pub const STATUS_INFO_DISCOVERING: &str = "Waiting for host to send hardware details";

/// Host is below at least one hardware minimum.
pub const STATUS_INFO_INSUFFICIENT_HARDWARE: &str =
    "Host does not meet the minimum hardware requirements: $FAILING_VALIDATIONS";

/// Host passed every check.
pub const STATUS_INFO_READY_TO_BE_MOVED: &str = "Host is ready to be moved to a cluster";

/// Host disabled by an operator.
pub const STATUS_INFO_DISABLED: &str = "Host was manually disabled";

const VALIDATION_SEPARATOR: &str = " ; ";

/// Renders a status template against a fact snapshot.
///
/// Templates without the placeholder are returned as-is. The placeholder is
/// replaced by every failing hardware check, in the fixed reporting order,
/// with the reason a fact could not be determined appended where one exists.
///
/// # Errors
///
/// Returns [`HandlerError::Template`] if the template asks for failing
/// validations but every hardware check passed.
pub fn render_status(template: &str, facts: &HostFacts) -> Result<String, HandlerError> {
    if !template.contains(FAILING_VALIDATIONS_PLACEHOLDER) {
        return Ok(template.to_string());
    }

    let failing: Vec<String> = facts
        .failing_hardware()
        .into_iter()
        .map(|fact| match facts.issue_for(fact) {
            Some(issue) => format!("{} ({})", fact.failure_reason(), issue.reason),
            None => fact.failure_reason().to_string(),
        })
        .collect();

    if failing.is_empty() {
        return Err(HandlerError::Template(
            "status requires failing validations but all hardware checks passed".to_string(),
        ));
    }

    Ok(template.replace(
        FAILING_VALIDATIONS_PLACEHOLDER,
        &failing.join(VALIDATION_SEPARATOR),
    ))
}
