use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use core::fmt;

use super::{is_path, PluginLoader, PluginModule};
use crate::{DvcManResult, EntryPoints};

/// Entry point of a plugin linked into the host binary.
pub type StaticEntryFn = Rc<dyn Fn(&mut EntryPoints<'_>)>;

/// Loads plugins from a table of entry functions linked into the binary.
///
/// Useful on targets without dynamic loading, and for tests.
#[derive(Clone, Default)]
pub struct StaticPluginLoader {
    modules: BTreeMap<String, Option<StaticEntryFn>>,
}

impl StaticPluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_plugin<F>(mut self, name: impl Into<String>, entry: F) -> Self
    where
        F: Fn(&mut EntryPoints<'_>) + 'static,
    {
        self.register(name, entry);
        self
    }

    /// Adds a module exposing no entry point.
    #[must_use]
    pub fn with_module_without_entry_point(mut self, name: impl Into<String>) -> Self {
        self.modules.insert(name.into(), None);
        self
    }

    pub fn register<F>(&mut self, name: impl Into<String>, entry: F)
    where
        F: Fn(&mut EntryPoints<'_>) + 'static,
    {
        self.modules.insert(name.into(), Some(Rc::new(entry)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}

impl PluginLoader for StaticPluginLoader {
    fn load(&mut self, name_or_path: &str) -> DvcManResult<Box<dyn PluginModule>> {
        // A path designates the module named after its file stem.
        let name = if is_path(name_or_path) {
            Path::new(name_or_path)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(name_or_path)
        } else {
            name_or_path
        };

        let entry = self.modules.get(name).cloned().ok_or_else(|| {
            load_err!(
                "load static plugin",
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("no plugin named `{name}`"))
            )
        })?;

        Ok(Box::new(StaticModule {
            name: name.to_owned(),
            entry,
        }))
    }
}

impl fmt::Debug for StaticPluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.modules.iter().map(|(name, entry)| (name, entry.is_some())))
            .finish()
    }
}

struct StaticModule {
    name: String,
    entry: Option<StaticEntryFn>,
}

impl PluginModule for StaticModule {
    fn locator(&self) -> &str {
        &self.name
    }

    fn call_entry_point(&mut self, entry_points: &mut EntryPoints<'_>) -> bool {
        match &self.entry {
            Some(entry) => {
                entry(entry_points);
                true
            }
            None => false,
        }
    }
}
