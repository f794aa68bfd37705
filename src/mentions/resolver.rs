// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundle::Bundle;

/// Turns an `@mention` string into a filesystem path. Resolution never
/// fails loudly: a mention that can't be placed anywhere just yields
/// `None`, and the caller treats that as "not found" rather than an error.
pub trait MentionResolver: Send + Sync {
    fn resolve(&self, mention: &str) -> Option<PathBuf>;
}

/// Default resolver: `@ns:rest` looks up `ns` in a registered bundle and
/// asks it for `rest`'s context path; a bare `@path` is tried relative to
/// `base_path`, first literally, then with a `.md` suffix.
#[derive(Default)]
pub struct BaseMentionResolver {
    bundles: HashMap<String, Arc<Bundle>>,
    base_path: PathBuf,
}

impl BaseMentionResolver {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            bundles: HashMap::new(),
            base_path,
        }
    }

    pub fn register_bundle(&mut self, name: String, bundle: Arc<Bundle>) {
        self.bundles.insert(name, bundle);
    }
}

impl MentionResolver for BaseMentionResolver {
    fn resolve(&self, mention: &str) -> Option<PathBuf> {
        let body = mention.strip_prefix('@')?;

        if let Some((namespace, name)) = body.split_once(':') {
            let bundle = self.bundles.get(namespace)?;
            return bundle.resolve_context_path(name);
        }

        let literal = self.base_path.join(body);
        if literal.exists() {
            return Some(literal);
        }
        let with_md = self.base_path.join(format!("{body}.md"));
        if with_md.exists() {
            return Some(with_md);
        }
        None
    }
}
