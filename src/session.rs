// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! The narrow capability contract a host session runtime implements (§6).
//!
//! None of these types execute a prompt or mount a tool themselves — the
//! core only ever holds `Arc<dyn Trait>` handles to a host's
//! implementations, exactly as spec'd: the session runtime itself is out
//! of scope, and the core only ever speaks to it through this interface.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::value::Mapping;

/// One turn of conversation, carried across `spawn`'s parent→child
/// history inheritance (§4.7 step 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Resolves a module's declared `source` (if any) to a local filesystem
/// path, downloading/activating it as needed. Left entirely to the host;
/// the core only ever calls through this trait (§4.7 step 5).
#[async_trait]
pub trait ModuleSourceResolver: Send + Sync {
    async fn resolve(&self, module_id: &str, source: Option<&str>) -> Result<PathBuf>;
}

/// Produces a fresh system prompt on demand. Installed as a "dynamic"
/// factory so every turn re-reads context files and re-resolves mentions
/// rather than freezing the prompt at session-creation time (§4.7, §8
/// invariant 10).
#[async_trait]
pub trait SystemPromptFactory: Send + Sync {
    async fn build(&self) -> Result<String>;
}

/// The conversation-state capability a session exposes under
/// `coordinator.get("context")` (§6).
#[async_trait]
pub trait SessionContext: Send + Sync {
    async fn add_message(&self, message: Message);
    async fn set_messages(&self, messages: Vec<Message>);
    async fn set_system_prompt_factory(&self, factory: Arc<dyn SystemPromptFactory>);
}

/// The capability-mounting surface a session exposes to the core (§6):
/// `mount` installs the module resolver, `register_capability` publishes
/// an arbitrary named value (module paths, a mention resolver instance,
/// ...) for the host's tools to discover, `get_context` reaches the
/// conversation-state capability.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn mount(&self, capability_name: &str, resolver: Arc<dyn ModuleSourceResolver>);
    fn register_capability(&self, name: &str, value: Arc<dyn Any + Send + Sync>);
    fn get_context(&self) -> Arc<dyn SessionContext>;
}

/// A live, running session (§6): `execute`/`cleanup`/`initialize`, plus a
/// stable identifier used for parent/child spawn bookkeeping.
#[async_trait]
pub trait Session: Send + Sync {
    fn session_id(&self) -> &str;
    fn coordinator(&self) -> Arc<dyn Coordinator>;

    async fn initialize(&self) -> Result<()>;
    async fn execute(&self, prompt: &str) -> Result<String>;
    async fn cleanup(&self) -> Result<()>;
}

/// Constructs sessions from a mount plan (§4.7): the one factory seam the
/// host must supply for `create_session`/`spawn` to have anything to
/// build. `approval`/`display` are opaque host subsystems the core never
/// interprets, only threads through (§4.7 `create_session`'s
/// `approval_system`/`display_system` parameters).
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(
        &self,
        mount_plan: &Mapping,
        session_id: Option<String>,
        parent_id: Option<String>,
        approval: Option<Arc<dyn Any + Send + Sync>>,
        display: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<Arc<dyn Session>>;
}

/// App-layer policy hook letting a module's declared `source` be
/// rewritten before activation (e.g. settings-based overrides), without
/// the core knowing anything about the host's configuration (§4.7 step 4).
pub trait SourceOverride: Send + Sync {
    fn resolve(&self, module_id: &str, source: &str) -> String;
}
