use super::*;

#[test]
fn test_regex_compilation() {
    let regex = get_cached_regex(r"v(\d+\.\d+\.\d+)").unwrap();
    let caps = regex.captures("ripgrep v14.1.0").unwrap();
    assert_eq!(&caps[1], "14.1.0");
}

#[test]
fn test_patterns_are_cached_after_first_use() {
    let pattern = r"cached_pattern_[a-z]+_\d+";
    get_cached_regex(pattern).unwrap();
    assert!(is_cached(pattern));
}

#[test]
fn test_invalid_regex_is_an_engine_error() {
    let pattern = r"[unclosed(";
    let err = get_cached_regex(pattern).unwrap_err();
    assert!(matches!(err, EngineError::InvalidRegex(_)));
    assert!(!is_cached(pattern));
}
