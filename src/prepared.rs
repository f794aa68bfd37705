// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! A bundle prepared for execution (C8): the mount plan, a resolved module
//! resolver, and the mechanism for building child sessions and spawning
//! sub-sessions. Policy — which agent name maps to which bundle, and the
//! host's settings overrides — lives entirely outside this module; it is
//! delivered through the [`SourceOverride`] hook and the capabilities a
//! host registers on the parent session (grounded on
//! `original_source/amplifier_foundation/bundle.py`'s `PreparedBundle`,
//! `prepare`, `create_session`, and `spawn`).

use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::error::Result;
use crate::io_retry::read_with_retry;
use crate::mentions::{format_context_block, load_mentions, ContentDeduplicator};
use crate::modules::{BundleModuleResolver, ModuleActivator};
use crate::session::{
    Message, ModuleSourceResolver, Session, SessionFactory, SourceOverride, SystemPromptFactory,
};
use crate::sources::SourceResolver;
use crate::value::{Mapping, Value};

const MODULE_SOURCE_RESOLVER_CAPABILITY: &str = "module-source-resolver";
const BUNDLE_PACKAGE_PATHS_CAPABILITY: &str = "bundle_package_paths";
const MENTION_RESOLVER_CAPABILITY: &str = "mention_resolver";
const MENTION_DEDUPLICATOR_CAPABILITY: &str = "mention_deduplicator";

/// A bundle that has been prepared for execution: its mount plan, the
/// resolver that answers activated module paths, the bundle it was built
/// from (needed for `spawn`'s compose step and for the dynamic system
/// prompt factory), and every bundle-package directory activated along
/// the way (for child-session inheritance).
pub struct PreparedBundle {
    pub mount_plan: Mapping,
    pub resolver: Arc<dyn ModuleSourceResolver>,
    pub bundle: Bundle,
    pub bundle_package_paths: Vec<PathBuf>,
}

/// The result of a `spawn` call (§4.7): the child session's final response
/// and its id, for resuming or chaining further spawns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnResult {
    pub output: String,
    pub session_id: String,
}

/// Optional knobs for [`PreparedBundle::spawn`] (§4.7 step 2 and on).
#[derive(Default)]
pub struct SpawnOptions {
    pub compose: bool,
    pub parent_session: Option<Arc<dyn Session>>,
    pub session_id: Option<String>,
    pub orchestrator_config: Option<Mapping>,
    pub parent_messages: Option<Vec<Message>>,
    pub approval: Option<Arc<dyn Any + Send + Sync>>,
    pub display: Option<Arc<dyn Any + Send + Sync>>,
}

impl SpawnOptions {
    pub fn new() -> Self {
        Self {
            compose: true,
            ..Default::default()
        }
    }
}

impl Bundle {
    /// Prepare this bundle for execution (§4.7): installs bundle packages
    /// before modules, activates every module spec carrying a `source`
    /// (optionally rewritten through `source_override`), and returns the
    /// mount plan plus a resolver over the activated paths.
    pub async fn prepare(
        &self,
        cache_dir: PathBuf,
        install_deps: bool,
        source_override: Option<&dyn SourceOverride>,
    ) -> Result<PreparedBundle> {
        let mount_plan = self.to_mount_plan();

        let module_base = self.base_path.clone().unwrap_or_else(|| PathBuf::from("."));
        let source_resolver = SourceResolver::new(cache_dir, module_base);
        let activator = ModuleActivator::new(source_resolver, install_deps);

        if let Some(base) = &self.base_path {
            activator.activate_bundle_package(base).await?;
        }
        for path in self.source_base_paths.values() {
            if Some(path) != self.base_path.as_ref() {
                activator.activate_bundle_package(path).await?;
            }
        }

        let modules_to_activate = collect_module_specs(&mount_plan, source_override);
        let module_paths = activator.activate_all(&modules_to_activate).await?;
        let bundle_package_paths = activator.bundle_package_paths();

        Ok(PreparedBundle {
            mount_plan,
            resolver: Arc::new(BundleModuleResolver::new(module_paths)),
            bundle: self.clone(),
            bundle_package_paths,
        })
    }
}

/// Gather every module spec carrying both `module` and `source` from the
/// session orchestrator/context and the provider/tool/hook lists,
/// optionally rewriting `source` through the host's override policy
/// (§4.7 step 3-4).
fn collect_module_specs(mount_plan: &Mapping, source_override: Option<&dyn SourceOverride>) -> Vec<Mapping> {
    let mut specs = Vec::new();

    if let Some(Value::Mapping(session)) = mount_plan.get("session") {
        for key in ["orchestrator", "context"] {
            if let Some(Value::Mapping(spec)) = session.get(key) {
                if spec.contains_key("source") {
                    specs.push(apply_override(spec.clone(), source_override));
                }
            }
        }
    }

    for section in ["providers", "tools", "hooks"] {
        if let Some(Value::Sequence(entries)) = mount_plan.get(section) {
            for entry in entries {
                if let Value::Mapping(spec) = entry {
                    if spec.contains_key("source") {
                        specs.push(apply_override(spec.clone(), source_override));
                    }
                }
            }
        }
    }

    specs
}

fn apply_override(mut spec: Mapping, source_override: Option<&dyn SourceOverride>) -> Mapping {
    let Some(overrider) = source_override else {
        return spec;
    };
    let (Some(module_id), Some(source)) = (
        spec.get("module").and_then(Value::as_str).map(str::to_string),
        spec.get("source").and_then(Value::as_str).map(str::to_string),
    ) else {
        return spec;
    };
    let resolved = overrider.resolve(&module_id, &source);
    if resolved != source {
        spec.insert("source".to_string(), Value::String(resolved));
    }
    spec
}

impl PreparedBundle {
    /// Build `namespace -> Bundle` for mention resolution: every namespace
    /// in `source_base_paths` (plus the bundle's own name, if not already
    /// present) maps to a clone of `bundle` with `base_path` overridden to
    /// that namespace's base, so `@ns:context/x` resolves against the
    /// right directory.
    fn bundles_for_resolver(bundle: &Bundle) -> HashMap<String, Arc<Bundle>> {
        let mut namespaces: Vec<String> = bundle.source_base_paths.keys().cloned().collect();
        if !bundle.name.is_empty() && !namespaces.contains(&bundle.name) {
            namespaces.push(bundle.name.clone());
        }

        let mut result = HashMap::new();
        for namespace in namespaces {
            let base = bundle
                .source_base_paths
                .get(&namespace)
                .cloned()
                .or_else(|| bundle.base_path.clone());
            let scoped = Bundle {
                base_path: base,
                ..bundle.clone()
            };
            result.insert(namespace, Arc::new(scoped));
        }
        result
    }

    /// Create a host session from this prepared bundle's mount plan,
    /// mounting the module resolver, registering `bundle_package_paths`,
    /// initializing the session, resolving any still-pending namespaced
    /// context entries, and — if the bundle carries an instruction or
    /// context — installing the dynamic system-prompt factory (§4.7).
    pub async fn create_session(
        &mut self,
        factory: &dyn SessionFactory,
        session_id: Option<String>,
        parent_id: Option<String>,
        approval: Option<Arc<dyn Any + Send + Sync>>,
        display: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<Arc<dyn Session>> {
        let session = factory
            .create(&self.mount_plan, session_id, parent_id, approval, display)
            .await?;

        session
            .coordinator()
            .mount(MODULE_SOURCE_RESOLVER_CAPABILITY, self.resolver.clone())
            .await;

        if !self.bundle_package_paths.is_empty() {
            session.coordinator().register_capability(
                BUNDLE_PACKAGE_PATHS_CAPABILITY,
                Arc::new(self.bundle_package_paths.clone()),
            );
        }

        session.initialize().await?;

        self.bundle.resolve_pending_context();

        if self.bundle.instruction.is_some() || !self.bundle.context.is_empty() || !self.bundle.pending_context.is_empty() {
            let bundles = Self::bundles_for_resolver(&self.bundle);
            session
                .coordinator()
                .register_capability(MENTION_RESOLVER_CAPABILITY, Arc::new(bundles) as Arc<dyn Any + Send + Sync>);
            session.coordinator().register_capability(
                MENTION_DEDUPLICATOR_CAPABILITY,
                Arc::new(std::sync::Mutex::new(ContentDeduplicator::new())) as Arc<dyn Any + Send + Sync>,
            );

            let prompt_factory = Arc::new(DynamicSystemPromptFactory::new(self.bundle.clone()));
            session
                .coordinator()
                .get_context()
                .set_system_prompt_factory(prompt_factory)
                .await;
        }

        Ok(session)
    }

    /// Spawn a sub-session with a child bundle (§4.7): optionally compose
    /// with this bundle, build its mount plan, merge an orchestrator
    /// config override, build and initialize the child session, inherit
    /// parent conversation history for brand-new sessions, install the
    /// child's own dynamic prompt factory, execute the instruction, and
    /// clean up the child session regardless of outcome.
    pub async fn spawn(
        &self,
        child_bundle: Bundle,
        instruction: &str,
        options: SpawnOptions,
        factory: &dyn SessionFactory,
    ) -> Result<SpawnResult> {
        let effective_bundle = if options.compose {
            self.bundle.compose(std::slice::from_ref(&child_bundle))
        } else {
            child_bundle
        };

        let mut child_mount_plan = effective_bundle.to_mount_plan();
        if let Some(orchestrator_config) = &options.orchestrator_config {
            merge_orchestrator_config(&mut child_mount_plan, orchestrator_config);
        }

        let parent_id = options.parent_session.as_ref().map(|s| s.session_id().to_string());

        let child_session = factory
            .create(&child_mount_plan, options.session_id.clone(), parent_id, options.approval, options.display)
            .await?;

        child_session
            .coordinator()
            .mount(MODULE_SOURCE_RESOLVER_CAPABILITY, self.resolver.clone())
            .await;
        child_session.initialize().await?;

        if let Some(parent_messages) = options.parent_messages {
            if options.session_id.is_none() {
                child_session.coordinator().get_context().set_messages(parent_messages).await;
            }
        }

        if effective_bundle.instruction.is_some() || !effective_bundle.context.is_empty() {
            let prompt_factory = Arc::new(DynamicSystemPromptFactory::new(effective_bundle.clone()));
            child_session
                .coordinator()
                .get_context()
                .set_system_prompt_factory(prompt_factory)
                .await;
        }

        let execute_result = child_session.execute(instruction).await;
        let cleanup_result = child_session.cleanup().await;
        let output = execute_result?;
        cleanup_result?;

        Ok(SpawnResult {
            output,
            session_id: child_session.session_id().to_string(),
        })
    }
}

fn merge_orchestrator_config(mount_plan: &mut Mapping, orchestrator_config: &Mapping) {
    let orchestrator = mount_plan
        .entry("orchestrator".to_string())
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !matches!(orchestrator, Value::Mapping(_)) {
        *orchestrator = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(orchestrator_map) = orchestrator else {
        unreachable!("just normalized to a mapping above");
    };
    let config = orchestrator_map
        .entry("config".to_string())
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !matches!(config, Value::Mapping(_)) {
        *config = Value::Mapping(Mapping::new());
    }
    config.deep_merge(Value::Mapping(orchestrator_config.clone()));
}

/// Rebuilds the combined system prompt from scratch on every call: the
/// bundle's instruction, every declared `context` file re-read fresh, and
/// every `@mention` re-resolved and re-deduplicated, so filesystem
/// mutations mid-session (e.g. an edited `AGENTS.md`) show up on the very
/// next turn (§4.3, §8 invariant 10).
pub struct DynamicSystemPromptFactory {
    bundle: Bundle,
}

impl DynamicSystemPromptFactory {
    pub fn new(bundle: Bundle) -> Self {
        Self { bundle }
    }
}

#[async_trait::async_trait]
impl SystemPromptFactory for DynamicSystemPromptFactory {
    async fn build(&self) -> Result<String> {
        let mut instruction_parts = Vec::new();
        if let Some(instruction) = &self.bundle.instruction {
            instruction_parts.push(instruction.clone());
        }

        for (name, path) in &self.bundle.context {
            if path.is_file() {
                if let Ok(content) = read_with_retry(path).await {
                    instruction_parts.push(format!("# Context: {name}\n\n{content}"));
                }
            }
        }

        let combined_instruction = instruction_parts.join("\n\n---\n\n");

        let bundles = PreparedBundle::bundles_for_resolver(&self.bundle);
        let resolver = BaseMentionResolverOverBundles::new(
            self.bundle.base_path.clone().unwrap_or_default(),
            bundles,
        );

        let mut deduplicator = ContentDeduplicator::new();
        let mention_results = load_mentions(&combined_instruction, &resolver, &mut deduplicator).await;

        let mention_by_path: HashMap<&Path, &str> = mention_results
            .iter()
            .filter_map(|result| result.resolved_path.as_deref().map(|path| (path, result.mention.as_str())))
            .collect();

        let context_block = format_context_block(&deduplicator, &mention_by_path);

        if context_block.is_empty() {
            Ok(combined_instruction)
        } else {
            Ok(format!("{context_block}\n\n---\n\n{combined_instruction}"))
        }
    }
}

/// A [`crate::mentions::MentionResolver`] that looks namespaced mentions up
/// against a precomputed `namespace -> Bundle` map (each scoped to the
/// right `base_path`) instead of a single flat bundle registry, matching
/// `_build_bundles_for_resolver`'s per-namespace base path override.
struct BaseMentionResolverOverBundles {
    base_path: PathBuf,
    bundles: HashMap<String, Arc<Bundle>>,
}

impl BaseMentionResolverOverBundles {
    fn new(base_path: PathBuf, bundles: HashMap<String, Arc<Bundle>>) -> Self {
        Self { base_path, bundles }
    }
}

impl crate::mentions::MentionResolver for BaseMentionResolverOverBundles {
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

#[cfg(test)]
mod prepared_test {
    use super::*;
    use indexmap::IndexMap;

    use crate::session::{Coordinator, SessionContext};

    struct RecordingContext {
        messages: std::sync::Mutex<Vec<Message>>,
    }

    #[async_trait::async_trait]
    impl SessionContext for RecordingContext {
        async fn add_message(&self, message: Message) {
            self.messages.lock().unwrap().push(message);
        }
        async fn set_messages(&self, messages: Vec<Message>) {
            *self.messages.lock().unwrap() = messages;
        }
        async fn set_system_prompt_factory(&self, _factory: Arc<dyn SystemPromptFactory>) {}
    }

    struct RecordingCoordinator {
        context: Arc<RecordingContext>,
        mounted: std::sync::Mutex<Vec<String>>,
        capabilities: std::sync::Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    }

    #[async_trait::async_trait]
    impl Coordinator for RecordingCoordinator {
        async fn mount(&self, capability_name: &str, _resolver: Arc<dyn ModuleSourceResolver>) {
            self.mounted.lock().unwrap().push(capability_name.to_string());
        }
        fn register_capability(&self, name: &str, value: Arc<dyn Any + Send + Sync>) {
            self.capabilities.lock().unwrap().insert(name.to_string(), value);
        }
        fn get_context(&self) -> Arc<dyn SessionContext> {
            self.context.clone()
        }
    }

    struct RecordingSession {
        id: String,
        coordinator: Arc<RecordingCoordinator>,
        executed: std::sync::Mutex<Vec<String>>,
        cleaned_up: std::sync::Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl Session for RecordingSession {
        fn session_id(&self) -> &str {
            &self.id
        }
        fn coordinator(&self) -> Arc<dyn Coordinator> {
            self.coordinator.clone()
        }
        async fn initialize(&self) -> Result<()> {
            Ok(())
        }
        async fn execute(&self, prompt: &str) -> Result<String> {
            self.executed.lock().unwrap().push(prompt.to_string());
            Ok(format!("handled: {prompt}"))
        }
        async fn cleanup(&self) -> Result<()> {
            *self.cleaned_up.lock().unwrap() = true;
            Ok(())
        }
    }

    struct RecordingFactory;

    #[async_trait::async_trait]
    impl SessionFactory for RecordingFactory {
        async fn create(
            &self,
            _mount_plan: &Mapping,
            session_id: Option<String>,
            _parent_id: Option<String>,
            _approval: Option<Arc<dyn Any + Send + Sync>>,
            _display: Option<Arc<dyn Any + Send + Sync>>,
        ) -> Result<Arc<dyn Session>> {
            Ok(Arc::new(RecordingSession {
                id: session_id.unwrap_or_else(|| "generated".to_string()),
                coordinator: Arc::new(RecordingCoordinator {
                    context: Arc::new(RecordingContext { messages: std::sync::Mutex::new(Vec::new()) }),
                    mounted: std::sync::Mutex::new(Vec::new()),
                    capabilities: std::sync::Mutex::new(HashMap::new()),
                }),
                executed: std::sync::Mutex::new(Vec::new()),
                cleaned_up: std::sync::Mutex::new(false),
            }))
        }
    }

    fn empty_prepared(bundle: Bundle) -> PreparedBundle {
        PreparedBundle {
            mount_plan: bundle.to_mount_plan(),
            resolver: Arc::new(BundleModuleResolver::new(IndexMap::new())),
            bundle,
            bundle_package_paths: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_session_mounts_resolver_and_initializes() {
        let bundle = Bundle { name: "demo".to_string(), ..Bundle::default() };
        let mut prepared = empty_prepared(bundle);
        let factory = RecordingFactory;

        let session = prepared
            .create_session(&factory, Some("s1".to_string()), None, None, None)
            .await
            .unwrap();

        assert_eq!(session.session_id(), "s1");
    }

    #[tokio::test]
    async fn spawn_executes_instruction_and_cleans_up_regardless() {
        let parent = Bundle { name: "parent".to_string(), ..Bundle::default() };
        let prepared = empty_prepared(parent);
        let child = Bundle { name: "child".to_string(), ..Bundle::default() };
        let factory = RecordingFactory;

        let result = prepared
            .spawn(child, "do the thing", SpawnOptions::new(), &factory)
            .await
            .unwrap();

        assert_eq!(result.output, "handled: do the thing");
        assert_eq!(result.session_id, "generated");
    }

    #[tokio::test]
    async fn spawn_merges_orchestrator_config_override() {
        let mut session_map = Mapping::new();
        let mut orchestrator = Mapping::new();
        let mut config = Mapping::new();
        config.insert("existing".to_string(), Value::Int(1));
        orchestrator.insert("config".to_string(), Value::Mapping(config));
        session_map.insert("orchestrator".to_string(), Value::Mapping(orchestrator));

        let parent = Bundle { name: "parent".to_string(), session: session_map, ..Bundle::default() };
        let prepared = empty_prepared(parent.clone());
        let child = Bundle { name: "child".to_string(), ..Bundle::default() };

        let mut override_config = Mapping::new();
        override_config.insert("min_delay_between_calls_ms".to_string(), Value::Int(500));

        let mut options = SpawnOptions::new();
        options.orchestrator_config = Some(override_config);

        let factory = RecordingFactory;
        let result = prepared.spawn(child, "go", options, &factory).await.unwrap();
        assert_eq!(result.output, "handled: go");
    }

    #[tokio::test]
    async fn spawn_without_compose_uses_child_bundle_standalone() {
        let parent = Bundle {
            name: "parent".to_string(),
            tools: vec![{
                let mut m = Mapping::new();
                m.insert("module".to_string(), Value::String("parent-tool".into()));
                m
            }],
            ..Bundle::default()
        };
        let prepared = empty_prepared(parent);
        let child = Bundle { name: "child".to_string(), ..Bundle::default() };
        let factory = RecordingFactory;

        let mut options = SpawnOptions::new();
        options.compose = false;
        let result = prepared.spawn(child, "go", options, &factory).await.unwrap();
        assert_eq!(result.output, "handled: go");
    }
}
