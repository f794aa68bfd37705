use super::*;

#[test]
fn parses_git_uri_with_ref_and_fragment_subdirectory() {
    let parsed = parse_uri("git+https://github.com/org/repo@main#subdirectory=behaviors/logging").unwrap();
    assert_eq!(parsed.scheme, "git+https");
    assert_eq!(parsed.host, "github.com");
    assert_eq!(parsed.path, "/org/repo");
    assert_eq!(parsed.git_ref, "main");
    assert_eq!(parsed.subpath, "behaviors/logging");
    assert!(parsed.is_git());
}

#[test]
fn fragment_subdirectory_overrides_legacy_subpath() {
    let parsed = parse_uri("git+https://github.com/org/repo@main/legacy#subdirectory=winner").unwrap();
    assert_eq!(parsed.subpath, "winner");
}

#[test]
fn legacy_subpath_used_when_no_fragment() {
    let parsed = parse_uri("git+https://github.com/org/repo@main/legacy/path").unwrap();
    assert_eq!(parsed.git_ref, "main");
    assert_eq!(parsed.subpath, "legacy/path");
}

#[test]
fn zip_uri_shares_git_grammar() {
    let parsed = parse_uri("zip+https://example.com/archive.zip#subdirectory=sub").unwrap();
    assert!(parsed.is_zip());
    assert_eq!(parsed.subpath, "sub");
}

#[test]
fn file_scheme_uri() {
    let parsed = parse_uri("file:///tmp/root#subdirectory=behaviors/recipes").unwrap();
    assert_eq!(parsed.scheme, "file");
    assert_eq!(parsed.path, "/tmp/root");
    assert_eq!(parsed.subpath, "behaviors/recipes");
    assert!(parsed.is_file());
}

#[test]
fn absolute_path_is_file() {
    let parsed = parse_uri("/abs/path").unwrap();
    assert!(parsed.is_file());
    assert_eq!(parsed.scheme, "file");
}

#[test]
fn relative_path_is_file() {
    for uri in ["./rel/path", "../rel/path"] {
        let parsed = parse_uri(uri).unwrap();
        assert!(parsed.is_file());
        assert_eq!(parsed.path, uri);
    }
}

#[test]
fn http_uri_with_fragment() {
    let parsed = parse_uri("https://example.com/a/b#subdirectory=x").unwrap();
    assert!(parsed.is_http());
    assert_eq!(parsed.host, "example.com");
    assert_eq!(parsed.path, "/a/b");
    assert_eq!(parsed.subpath, "x");
}

#[test]
fn bare_name_is_package() {
    let parsed = parse_uri("foundation").unwrap();
    assert!(parsed.is_package());
    assert!(!parsed.is_file());
}

#[test]
fn bare_name_with_rest_is_still_package_by_invariant() {
    let parsed = parse_uri("foundation/providers/anthropic").unwrap();
    assert!(parsed.is_package());
    assert_eq!(parsed.path, "foundation");
    assert_eq!(parsed.subpath, "providers/anthropic");
}

#[test]
fn predicates_are_mutually_exclusive() {
    let cases = [
        "git+https://h/p",
        "zip+https://h/p",
        "file:///a",
        "/a",
        "./a",
        "https://h/p",
        "bare",
        "bare/rest",
    ];
    for uri in cases {
        let parsed = parse_uri(uri).unwrap();
        let flags = [
            parsed.is_git(),
            parsed.is_zip(),
            parsed.is_file(),
            parsed.is_http(),
            parsed.is_package(),
        ];
        let true_count = flags.iter().filter(|f| **f).count();
        assert_eq!(true_count, 1, "uri {uri} had flags {flags:?}");
    }
}
