//! Classifies an error message into a blocker category, deciding whether
//! the agent should stop and ask a human rather than keep retrying.
//!
//! Grounded exactly on the pattern lists and decision rules of the Python
//! predecessor's blocker-detection module: ordered, case-insensitive
//! substring matching, with external-service errors only blocking after a
//! repeat failure.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockerCategory {
    TacticalDecision,
    RequirementsAmbiguity,
    Access,
    ExternalService,
    TechnicalError,
    None,
}

const TACTICAL_DECISION_PATTERNS: &[&str] = &[
    // Implementation choices
    "which approach",
    "should i use",
    "multiple options",
    "design decision",
    "please clarify",
    "need clarification",
    // File handling
    "file already exists",
    "overwrite",
    "should i create",
    "should i delete",
    // Tooling choices
    "which version",
    "which package",
    "which framework",
    "install method",
    "package manager",
    // Configuration choices
    "which configuration",
    "which setting",
    "default value",
    "fixture scope",
    "loop scope",
    // Generic decision patterns
    "what do you",
    "do you want",
    "would you like",
    "prefer",
];

const REQUIREMENTS_AMBIGUITY_PATTERNS: &[&str] = &[
    // True requirements conflicts
    "conflicting requirements",
    "spec unclear",
    "specification unclear",
    "requirements conflict",
    "contradictory requirements",
    // Business logic requiring domain knowledge
    "business decision",
    "business logic unclear",
    "domain knowledge required",
    "stakeholder decision",
    // Security policy ambiguity
    "security policy unclear",
    "compliance requirement unclear",
    "regulatory requirement",
];

const ACCESS_PATTERNS: &[&str] = &[
    "permission denied",
    "access denied",
    "authentication required",
    "api key",
    "credentials",
    "secret required",
    "token required",
    "unauthorized",
    "forbidden",
];

const EXTERNAL_SERVICE_PATTERNS: &[&str] = &[
    "service unavailable",
    "rate limited",
    "quota exceeded",
    "connection refused",
    "timeout exceeded",
];

const TECHNICAL_ERROR_PATTERNS: &[&str] = &[
    // File/path issues
    "file not found",
    "no such file",
    "directory not found",
    "path does not exist",
    "filenotfounderror",
    // Import/module issues
    "module not found",
    "import error",
    "no module named",
    "cannot find module",
    "modulenotfounderror",
    // Syntax/code issues
    "syntax error",
    "syntaxerror",
    "indentation error",
    "name error",
    "nameerror",
    "type error",
    "typeerror",
    "attribute error",
    "attributeerror",
    "undefined",
    "not defined",
    // Command execution issues
    "command not found",
    "exit code",
    "non-zero exit",
    // General coding issues
    "missing",
    "expected",
    "invalid",
];

fn matches_any(text: &str, patterns: &[&str]) -> Option<&'static str> {
    let lower = text.to_lowercase();
    patterns
        .iter()
        .find(|p| lower.contains(*p))
        .map(|p| *p)
}

/// Classifies `text` into a category, checking tactical, requirements,
/// access, external-service, technical, then none — in that order.
pub fn classify_error_for_blocker(text: &str) -> (BlockerCategory, Option<&'static str>) {
    if let Some(p) = matches_any(text, TACTICAL_DECISION_PATTERNS) {
        return (BlockerCategory::TacticalDecision, Some(p));
    }
    if let Some(p) = matches_any(text, REQUIREMENTS_AMBIGUITY_PATTERNS) {
        return (BlockerCategory::RequirementsAmbiguity, Some(p));
    }
    if let Some(p) = matches_any(text, ACCESS_PATTERNS) {
        return (BlockerCategory::Access, Some(p));
    }
    if let Some(p) = matches_any(text, EXTERNAL_SERVICE_PATTERNS) {
        return (BlockerCategory::ExternalService, Some(p));
    }
    if let Some(p) = matches_any(text, TECHNICAL_ERROR_PATTERNS) {
        return (BlockerCategory::TechnicalError, Some(p));
    }
    (BlockerCategory::None, None)
}

/// Decides whether a blocker should be created for this error, given how
/// many times this attempt has already been retried.
///
/// Requirements and access issues block immediately. External-service
/// issues only block once `attempt_count > 1` (a single transient network
/// blip should not stop the run). Tactical/technical/none never block on
/// their own — tactical decisions surface through plain-text classification
/// at the end of a ReAct turn, not through tool-error classification, and
/// technical errors are expected to be fixed by the agent.
pub fn should_create_blocker(text: &str, attempt_count: u32) -> (bool, String) {
    let (category, pattern) = classify_error_for_blocker(text);
    match category {
        BlockerCategory::RequirementsAmbiguity => (
            true,
            format!("Requirements ambiguity detected: {}", pattern.unwrap_or("")),
        ),
        BlockerCategory::Access => (
            true,
            format!("Access/credential issue detected: {}", pattern.unwrap_or("")),
        ),
        BlockerCategory::ExternalService if attempt_count > 1 => (
            true,
            format!(
                "External service repeatedly unavailable: {}",
                pattern.unwrap_or("")
            ),
        ),
        _ => (false, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_ambiguity_classified() {
        let (cat, _) = classify_error_for_blocker("This touches a regulatory requirement we can't decide alone");
        assert_eq!(cat, BlockerCategory::RequirementsAmbiguity);
    }

    #[test]
    fn test_access_classified() {
        let (cat, _) = classify_error_for_blocker("Error: permission denied writing to /etc");
        assert_eq!(cat, BlockerCategory::Access);
    }

    #[test]
    fn test_external_service_before_technical_ordering() {
        // "service unavailable: file not found" should classify as
        // external-service, not technical, per the documented ordering.
        let (cat, _) =
            classify_error_for_blocker("service unavailable: file not found exception");
        assert_eq!(cat, BlockerCategory::ExternalService);
    }

    #[test]
    fn test_tactical_decision_tie_break_wins_over_requirements() {
        // "please clarify the design decision" must classify tactical, not
        // requirements, even though nothing else in the text is a clear
        // implementation detail.
        let (cat, _) = classify_error_for_blocker("please clarify the design decision here");
        assert_eq!(cat, BlockerCategory::TacticalDecision);
    }

    #[test]
    fn test_technical_error_classified() {
        let (cat, _) = classify_error_for_blocker("Traceback: NameError: name 'x' is not defined");
        assert_eq!(cat, BlockerCategory::TechnicalError);
    }

    #[test]
    fn test_none_for_unmatched_text() {
        let (cat, _) = classify_error_for_blocker("All tests passed");
        assert_eq!(cat, BlockerCategory::None);
    }

    #[test]
    fn test_should_create_blocker_requirements_is_immediate() {
        let (should, _) = should_create_blocker("this is a stakeholder decision", 0);
        assert!(should);
    }

    #[test]
    fn test_should_create_blocker_external_service_waits_for_retry() {
        let (should_first, _) = should_create_blocker("connection refused", 0);
        assert!(!should_first);
        let (should_second, _) = should_create_blocker("connection refused", 2);
        assert!(should_second);
    }

    #[test]
    fn test_should_create_blocker_technical_never_blocks() {
        let (should, _) = should_create_blocker("SyntaxError: invalid syntax", 10);
        assert!(!should);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        let (cat, _) = classify_error_for_blocker("PERMISSION DENIED");
        assert_eq!(cat, BlockerCategory::Access);
    }
}
