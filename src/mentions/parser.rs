// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[^\n]*\n.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").unwrap());
// The `regex` crate has no look-around support, so the email guard is
// applied as a separate masking pass rather than the original's negative
// lookahead: any `local-part@domain.tld`-shaped span is blanked out before
// the mention pattern runs, so its `@` never gets treated as a mention.
static EMAIL_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap());
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([a-zA-Z0-9_:./\-]+)").unwrap());

/// Extract `@mention` tokens from markdown text, skipping fenced and inline
/// code, and skipping anything that looks like an email address. Returns
/// unique mentions (with the leading `@`) in first-seen order.
pub fn parse_mentions(text: &str) -> Vec<String> {
    let without_code = strip_code_blocks(text);
    let without_emails = EMAIL_LIKE.replace_all(&without_code, "");

    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for caps in MENTION.captures_iter(&without_emails) {
        let mention = format!("@{}", &caps[1]);
        if seen.insert(mention.clone()) {
            result.push(mention);
        }
    }
    result
}

fn strip_code_blocks(text: &str) -> String {
    let without_fenced = FENCED_CODE_BLOCK.replace_all(text, "");
    INLINE_CODE.replace_all(&without_fenced, "").into_owned()
}

#[cfg(test)]
#[path = "./parser_test.rs"]
mod parser_test;
