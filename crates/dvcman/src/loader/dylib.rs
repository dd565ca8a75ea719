use std::path::{Path, PathBuf};

use libloading::Library;

use super::{resolve_plugin_path, PluginLoader, PluginModule};
use crate::ffi::{self, DvcPluginEntryFn, DVC_PLUGIN_ENTRY_SYMBOL};
use crate::{DvcManConfig, DvcManResult, EntryPoints};

/// Loads plugins from native shared libraries exporting `DVCPluginEntry`.
///
/// Loaded code runs with the privileges of the host process. No sandboxing is performed.
#[derive(Debug, Clone)]
pub struct DylibPluginLoader {
    plugin_dir: PathBuf,
}

impl DylibPluginLoader {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
        }
    }

    pub fn from_config(config: &DvcManConfig) -> Self {
        Self::new(config.plugin_dir.clone())
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn resolve(&self, name_or_path: &str) -> PathBuf {
        resolve_plugin_path(name_or_path, &self.plugin_dir)
    }
}

impl PluginLoader for DylibPluginLoader {
    fn load(&mut self, name_or_path: &str) -> DvcManResult<Box<dyn PluginModule>> {
        let path = self.resolve(name_or_path);

        debug!(path = %path.display(), "Loading DVC plugin library");

        // SAFETY: loading a plugin runs its initialization routines; plugins are trusted
        // with the privileges of the host process.
        let library = unsafe { Library::new(&path) }.map_err(|e| load_err!("load plugin library", e))?;

        Ok(Box::new(DylibModule {
            locator: path.display().to_string(),
            library,
        }))
    }
}

struct DylibModule {
    locator: String,
    library: Library,
}

impl PluginModule for DylibModule {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn call_entry_point(&mut self, entry_points: &mut EntryPoints<'_>) -> bool {
        // SAFETY: the exported symbol is required to have the `DvcPluginEntryFn` signature.
        let entry: DvcPluginEntryFn = match unsafe { self.library.get::<DvcPluginEntryFn>(DVC_PLUGIN_ENTRY_SYMBOL) } {
            Ok(symbol) => *symbol,
            Err(error) => {
                debug!(module = %self.locator, %error, "Entry point lookup failed");
                return false;
            }
        };

        // SAFETY: `entry` comes from the library owned by `self`, which is still loaded.
        let status = unsafe { ffi::invoke_entry_point(entry, &self.locator, entry_points) };
        if status != ffi::DVC_OK {
            warn!(module = %self.locator, status, "DVC plugin entry point reported a failure");
        }

        true
    }
}
