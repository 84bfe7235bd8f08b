//! Tests for the `error` module.

use super::error::Error;

#[test]
fn test_codes_are_stable() {
    assert_eq!(Error::InvalidArgument(String::new()).code(), "STRATA-001");
    assert_eq!(Error::NotFound(String::new()).code(), "STRATA-002");
    assert_eq!(Error::AlreadyExists(String::new()).code(), "STRATA-003");
    assert_eq!(Error::ResourceExhausted(String::new()).code(), "STRATA-004");
    assert_eq!(Error::OutOfRange(String::new()).code(), "STRATA-005");
    assert_eq!(Error::DataLoss(String::new()).code(), "STRATA-006");
    assert_eq!(Error::Internal(String::new()).code(), "STRATA-007");
    assert_eq!(Error::Unavailable(String::new()).code(), "STRATA-008");
}

#[test]
fn test_message_carries_code() {
    let err = Error::NotFound("label 9".into());
    let msg = err.to_string();
    assert!(msg.contains("STRATA-002"));
    assert!(msg.contains("label 9"));
}

#[test]
fn test_recoverability() {
    assert!(Error::NotFound(String::new()).is_recoverable());
    assert!(Error::AlreadyExists(String::new()).is_recoverable());
    assert!(!Error::Internal(String::new()).is_recoverable());
    assert!(!Error::DataLoss(String::new()).is_recoverable());
}

#[test]
fn test_io_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
    let err: Error = io.into();
    assert_eq!(err.code(), "STRATA-009");
}
