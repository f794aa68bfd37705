use super::*;

#[test]
fn extracts_simple_mentions_in_order() {
    let text = "See @foo and then @bar:baz for details.";
    assert_eq!(parse_mentions(text), vec!["@foo", "@bar:baz"]);
}

#[test]
fn deduplicates_preserving_first_seen_order() {
    let text = "@a @b @a @c @b";
    assert_eq!(parse_mentions(text), vec!["@a", "@b", "@c"]);
}

#[test]
fn ignores_mentions_inside_fenced_code_blocks() {
    let text = "before\n```\n@not-a-mention\n```\nafter @real";
    assert_eq!(parse_mentions(text), vec!["@real"]);
}

#[test]
fn ignores_mentions_inside_inline_code() {
    let text = "use `@not-a-mention` but @real works";
    assert_eq!(parse_mentions(text), vec!["@real"]);
}

#[test]
fn ignores_email_addresses() {
    let text = "contact user@example.com or @agent:reviewer";
    assert_eq!(parse_mentions(text), vec!["@agent:reviewer"]);
}

#[test]
fn allows_paths_and_namespaces() {
    let text = "@./relative/path.md and @ns:name and @plain_name-1";
    assert_eq!(
        parse_mentions(text),
        vec!["@./relative/path.md", "@ns:name", "@plain_name-1"]
    );
}

#[test]
fn no_mentions_returns_empty() {
    assert!(parse_mentions("nothing to see here").is_empty());
}
