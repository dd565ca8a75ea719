//! Plugin loading strategies.
//!
//! A [`PluginLoader`] turns a plugin name (or path) into a [`PluginModule`], whose entry point the
//! [`ChannelManager`](crate::ChannelManager) then invokes with an [`EntryPoints`] capability.
//! The manager keeps every module it loaded alive until it is freed.

mod dylib;
mod static_registry;

use std::path::{Path, PathBuf};

pub use dylib::DylibPluginLoader;
pub use static_registry::{StaticEntryFn, StaticPluginLoader};

use crate::{DvcManResult, EntryPoints};

/// Result of a successful `load_plugin` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The entry point was invoked and registered `registered` plugins.
    ///
    /// A module registering zero plugins stays loaded but is inert.
    EntryPointInvoked { registered: usize },
    /// The module was loaded but exposes no entry point. Nothing was registered.
    MissingEntryPoint,
}

/// A loaded plugin module.
pub trait PluginModule {
    /// Human-readable locator of the module (path or name).
    fn locator(&self) -> &str;

    /// Invokes the module entry point exactly once with `entry_points`.
    ///
    /// Returns `false` without side effects when the module has no entry point.
    fn call_entry_point(&mut self, entry_points: &mut EntryPoints<'_>) -> bool;
}

/// Strategy resolving plugin names to loaded modules.
pub trait PluginLoader {
    /// Loads the module designated by `name_or_path`.
    ///
    /// Fails with a `Load` error when the module cannot be found or loaded.
    fn load(&mut self, name_or_path: &str) -> DvcManResult<Box<dyn PluginModule>>;
}

/// Returns `true` when `name_or_path` already designates a filesystem path.
pub fn is_path(name_or_path: &str) -> bool {
    name_or_path.contains(['/', std::path::MAIN_SEPARATOR])
}

/// Resolves a plugin name to the path of its shared library.
///
/// Paths are kept verbatim, bare names are looked up in `plugin_dir` with the platform library suffix.
pub fn resolve_plugin_path(name_or_path: &str, plugin_dir: &Path) -> PathBuf {
    if is_path(name_or_path) {
        PathBuf::from(name_or_path)
    } else {
        plugin_dir.join(format!("{name_or_path}{}", std::env::consts::DLL_SUFFIX))
    }
}
