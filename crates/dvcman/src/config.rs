use std::path::PathBuf;

/// Maximum number of plugins and of listeners a manager accepts unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 10;

/// Directory searched for plugins given by name.
///
/// Can be overridden at build time with the `DVCMAN_PLUGIN_PATH` environment variable.
pub const DEFAULT_PLUGIN_DIR: &str = match option_env!("DVCMAN_PLUGIN_PATH") {
    Some(path) => path,
    None => "/usr/local/lib/dvcman/plugins",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvcManConfig {
    /// Upper bound of the plugin registry
    pub max_plugins: usize,
    /// Upper bound of the listener registry
    pub max_listeners: usize,
    /// Directory used to locate plugins given by bare name (no path separator)
    pub plugin_dir: PathBuf,
}

impl DvcManConfig {
    /// Configuration applying the same capacity to both registries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            max_plugins: capacity,
            max_listeners: capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_plugin_dir(mut self, plugin_dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = plugin_dir.into();
        self
    }
}

impl Default for DvcManConfig {
    fn default() -> Self {
        Self {
            max_plugins: DEFAULT_CAPACITY,
            max_listeners: DEFAULT_CAPACITY,
            plugin_dir: PathBuf::from(DEFAULT_PLUGIN_DIR),
        }
    }
}
