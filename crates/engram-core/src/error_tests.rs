//! Tests for `error` module

use super::error::Error;

#[test]
fn test_error_codes() {
    assert_eq!(
        Error::InvalidDimension {
            expected: 384,
            actual: 12
        }
        .code(),
        "MEM-001"
    );
    assert_eq!(Error::DuplicateId(7).code(), "MEM-002");
    assert_eq!(Error::UnknownRecord(7).code(), "MEM-003");
    assert_eq!(Error::CapacityExceeded("full".into()).code(), "MEM-004");
    assert_eq!(Error::Config("bad".into()).code(), "MEM-005");
    assert_eq!(Error::Internal("bug".into()).code(), "MEM-006");
}

#[test]
fn test_error_messages_contain_code() {
    let err = Error::DuplicateId(42);
    assert!(err.to_string().contains("MEM-002"));
    assert!(err.to_string().contains("42"));

    let err = Error::InvalidDimension {
        expected: 128,
        actual: 64,
    };
    assert!(err.to_string().contains("expected 128"));
    assert!(err.to_string().contains("got 64"));
}

#[test]
fn test_recoverable() {
    assert!(Error::CapacityExceeded("full".into()).is_recoverable());
    assert!(Error::UnknownRecord(1).is_recoverable());
    assert!(!Error::Internal("bug".into()).is_recoverable());
}
