use super::*;
use crate::core::types::Package;

#[test]
fn test_same_identity_for_same_triple() {
    let a = Package::new("Foo", "foo", "1.0", "npm", "Npm");
    let b = Package::new("Foo (renamed)", "foo", "2.0", "npm", "Npm");

    assert_eq!(a.hash(), b.hash());
    assert!(a.is_equivalent_to(&b));
}

#[test]
fn test_identity_differs_by_manager_source_or_id() {
    let base = Package::new("Foo", "foo", "1.0", "npm", "Npm");
    let other_manager = Package::new("Foo", "foo", "1.0", "npm", "Pip");
    let other_source = Package::new("Foo", "foo", "1.0", "mirror", "Npm");
    let other_id = Package::new("Foo", "foo2", "1.0", "npm", "Npm");

    assert_ne!(base.hash(), other_manager.hash());
    assert_ne!(base.hash(), other_source.hash());
    assert_ne!(base.hash(), other_id.hash());
}

#[test]
fn test_versioned_hash_equal_for_identical_state() {
    let a = Package::new("Foo", "foo", "1.0", "npm", "Npm").with_new_version("1.1");
    let b = Package::new("Foo", "foo", "1.0", "npm", "Npm").with_new_version("1.1");

    assert_eq!(a.versioned_hash(), b.versioned_hash());
}

#[test]
fn test_versioned_hash_changes_with_each_field() {
    let base = Package::new("Foo", "foo", "1.0", "npm", "Npm").with_new_version("1.1");
    let variants = [
        Package::new("Foo", "foo", "1.0", "npm", "Pip").with_new_version("1.1"),
        Package::new("Foo", "foo", "1.0", "other", "Npm").with_new_version("1.1"),
        Package::new("Foo", "bar", "1.0", "npm", "Npm").with_new_version("1.1"),
        Package::new("Foo", "foo", "0.9", "npm", "Npm").with_new_version("1.1"),
        Package::new("Foo", "foo", "1.0", "npm", "Npm").with_new_version("1.2"),
        Package::new("Foo", "foo", "1.0", "npm", "Npm"),
    ];

    for variant in &variants {
        assert_ne!(base.versioned_hash(), variant.versioned_hash(), "{}", variant);
    }
}

#[test]
fn test_separator_prevents_field_bleed() {
    assert_ne!(identity_hash("ab", "c", "d"), identity_hash("a", "bc", "d"));
    assert_ne!(
        identity_hash("Chocolatey", "corp\\feed", "pkg"),
        identity_hash("Chocolatey", "corp", "feed\\pkg")
    );
    assert_ne!(
        versioned_hash("Npm", "npm", "foo", "1.0", Some("")),
        versioned_hash("Npm", "npm", "foo", "1.0", None)
    );
}

#[test]
fn test_hash_is_stable() {
    assert_eq!(identity_hash("Npm", "npm", "left-pad"), identity_hash("Npm", "npm", "left-pad"));
}
