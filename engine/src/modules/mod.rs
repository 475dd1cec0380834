// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Engine modules: named bundles of services/classes activated by list.
//!
//! The registry models module *activation*; locating and loading native
//! plugin binaries is a platform collaborator concern, fed by
//! [`module_search_paths`]. Failure policy: a missing module named in
//! `engine/modules/optionalModules` logs a warning and is skipped, any
//! other missing module is fatal.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::GlobalProperties;
use crate::error::EngineError;
use crate::service::ServiceProvider;

/// Configuration recognized at the `engine/modules` property path.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineModulesConfig {
    /// Additional directories for native plugin lookup.
    pub search_paths: Vec<String>,
    /// Modules whose load failure is non-fatal.
    pub optional_modules: Vec<String>,
    /// Also search the platform `PATH`.
    pub search_env_path: bool,
}

impl Default for EngineModulesConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            optional_modules: Vec::new(),
            search_env_path: true,
        }
    }
}

/// A module contributes services and game-system classes to the provider.
pub trait EngineModule: Send + Sync {
    fn module_name(&self) -> &str;

    fn initialize(&self, provider: &Arc<ServiceProvider>);

    fn post_init(&self) {}

    fn deinitialize(&self) {}
}

struct ModuleEntry {
    module: Arc<dyn EngineModule>,
    activated: bool,
}

pub struct ModuleManager {
    provider: Arc<ServiceProvider>,
    entries: Mutex<Vec<ModuleEntry>>,
}

impl ModuleManager {
    #[must_use]
    pub fn new(provider: Arc<ServiceProvider>) -> Self {
        Self {
            provider,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Makes a module available for activation.
    pub fn register_module(&self, module: Arc<dyn EngineModule>) {
        self.lock().push(ModuleEntry {
            module,
            activated: false,
        });
    }

    /// Activates the comma-separated `modules_list` in order. Reads the
    /// `engine/modules` configuration from `properties` for the
    /// optional-module policy.
    pub fn load_modules_list(
        &self,
        modules_list: &str,
        properties: Option<&GlobalProperties>,
    ) -> miette::Result<()> {
        if modules_list.trim().is_empty() {
            return Err(miette::miette!("no modules specified, list is empty"));
        }

        let config = properties
            .and_then(|properties| {
                properties.get_value::<EngineModulesConfig>("engine/modules")
            })
            .unwrap_or_default();

        for name in modules_list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            self.activate(name, &config)?;
        }
        Ok(())
    }

    fn activate(&self, name: &str, config: &EngineModulesConfig) -> miette::Result<()> {
        let module = {
            let mut entries = self.lock();
            match entries
                .iter_mut()
                .find(|entry| icase_equal(entry.module.module_name(), name))
            {
                Some(entry) if entry.activated => None,
                Some(entry) => {
                    entry.activated = true;
                    Some(entry.module.clone())
                }
                None => {
                    let optional = config
                        .optional_modules
                        .iter()
                        .any(|optional| icase_equal(optional, name));
                    if optional {
                        tracing::warn!(
                            target: "module",
                            module = name,
                            "optional module is not available, skipping"
                        );
                        return Ok(());
                    }
                    return Err(miette::Report::new(EngineError::ModuleLoad {
                        name: name.to_owned(),
                        reason: "module is not registered".into(),
                    }));
                }
            }
        };

        if let Some(module) = module {
            tracing::info!(target: "module", module = name, "initializing module");
            module.initialize(&self.provider);
        }
        Ok(())
    }

    /// Post-init hook across activated modules, in activation order.
    pub fn post_init_modules(&self) {
        let modules: Vec<_> = self
            .lock()
            .iter()
            .filter(|entry| entry.activated)
            .map(|entry| entry.module.clone())
            .collect();
        for module in modules {
            module.post_init();
        }
    }

    /// Deinitialization in reverse activation order.
    pub fn deinitialize_modules(&self) {
        let modules: Vec<_> = self
            .lock()
            .iter()
            .filter(|entry| entry.activated)
            .map(|entry| entry.module.clone())
            .collect();
        for module in modules.iter().rev() {
            module.deinitialize();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ModuleEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules", &self.lock().len())
            .finish()
    }
}

/// Directories to search for native plugin binaries: the configured extra
/// paths plus, when enabled, every existing directory on `PATH`.
#[must_use]
pub fn module_search_paths(config: &EngineModulesConfig) -> Vec<PathBuf> {
    let mut search_paths = Vec::new();

    if config.search_env_path
        && let Some(env_path) = std::env::var_os("PATH")
    {
        for directory in std::env::split_paths(&env_path) {
            if directory.is_dir() {
                search_paths.push(directory);
            }
        }
    }

    for configured in &config.search_paths {
        let directory = PathBuf::from(configured);
        if directory.is_dir() {
            search_paths.push(directory);
        }
    }

    search_paths
}

fn icase_equal(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}
