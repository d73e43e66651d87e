use rns_core::errors::{ErrorInfo, RnsError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("iteration", "17")
        .with_context("component", "example")
}

#[test]
fn user_function_error_surface() {
    let err = RnsError::UserFunction(sample_info("UF001", "transform arity mismatch"));
    assert_eq!(err.info().code, "UF001");
    assert!(err.info().context.contains_key("iteration"));
    assert!(err.is_fatal());
}

#[test]
fn population_error_surface() {
    let err = RnsError::Population(sample_info("P001", "replaced point not a member"));
    assert_eq!(err.info().code, "P001");
    assert!(err.is_fatal());
}

#[test]
fn region_error_surface() {
    let err = RnsError::Region(sample_info("R001", "degenerate region"));
    assert_eq!(err.info().code, "R001");
}

#[test]
fn dispatch_error_surface() {
    let err = RnsError::Dispatch(sample_info("D001", "batch failed"));
    assert_eq!(err.info().code, "D001");
}

#[test]
fn checkpoint_errors_are_not_fatal() {
    let err = RnsError::Checkpoint(sample_info("CK001", "disk full"));
    assert_eq!(err.info().code, "CK001");
    assert!(!err.is_fatal());
}

#[test]
fn serde_error_roundtrips_through_json() {
    let err = RnsError::Serde(sample_info("S001", "schema mismatch").with_hint("regenerate"));
    let json = serde_json::to_string(&err).unwrap();
    let back: RnsError = serde_json::from_str(&json).unwrap();
    assert_eq!(err, back);
}
