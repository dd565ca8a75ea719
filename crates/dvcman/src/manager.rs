use core::fmt;

use crate::listener::{Listener, ListenerCallback, ListenerId, ListenerRegistry, ManagerId};
use crate::loader::{DylibPluginLoader, LoadOutcome, PluginLoader, PluginModule};
use crate::plugin::{PluginRegistry, PluginState, VirtualChannelManager as _};
use crate::{DvcManConfig, DvcManResult, EntryPoints};

/// Root of the DVC plugin infrastructure for one session.
///
/// Owns the plugin registry, the listener registry and every loaded module.
/// Plugins are initialized and terminated in registration order.
///
/// Dropping the manager performs the same teardown as [`ChannelManager::free`].
pub struct ChannelManager {
    id: ManagerId,
    config: DvcManConfig,
    loader: Box<dyn PluginLoader>,
    plugins: PluginRegistry,
    listeners: ListenerRegistry,
    // Unloaded last: plugin objects and listener callbacks may live in these modules.
    modules: Vec<Box<dyn PluginModule>>,
}

impl ChannelManager {
    /// Creates a manager accepting at most `capacity` plugins and `capacity` listeners,
    /// loading native plugins from the default plugin directory.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(DvcManConfig::with_capacity(capacity))
    }

    pub fn with_config(config: DvcManConfig) -> Self {
        let loader = DylibPluginLoader::from_config(&config);
        Self::with_loader(config, loader)
    }

    /// Creates a manager using a custom loading strategy.
    ///
    /// `config.plugin_dir` is not used unless the loader reads it.
    pub fn with_loader(config: DvcManConfig, loader: impl PluginLoader + 'static) -> Self {
        let id = ManagerId::next();

        debug!(%id, max_plugins = config.max_plugins, max_listeners = config.max_listeners, "Create DVC manager");

        Self {
            id,
            plugins: PluginRegistry::new(config.max_plugins),
            listeners: ListenerRegistry::new(id, config.max_listeners),
            config,
            loader: Box::new(loader),
            modules: Vec::new(),
        }
    }

    pub fn id(&self) -> ManagerId {
        self.id
    }

    pub fn config(&self) -> &DvcManConfig {
        &self.config
    }

    /// Loads the plugin designated by `name_or_path` and invokes its entry point.
    ///
    /// A module without entry point is kept loaded and reported as [`LoadOutcome::MissingEntryPoint`],
    /// not as an error. Load failures leave the registries untouched.
    pub fn load_plugin(&mut self, name_or_path: &str) -> DvcManResult<LoadOutcome> {
        let mut module = self.loader.load(name_or_path)?;

        let outcome = {
            let mut entry_points = EntryPoints::new(&mut self.plugins, &mut self.listeners);

            if module.call_entry_point(&mut entry_points) {
                LoadOutcome::EntryPointInvoked {
                    registered: entry_points.registered_count(),
                }
            } else {
                LoadOutcome::MissingEntryPoint
            }
        };

        match outcome {
            LoadOutcome::EntryPointInvoked { registered } => {
                info!(module = module.locator(), registered, "Loaded DVC plugin");
            }
            LoadOutcome::MissingEntryPoint => {
                warn!(module = module.locator(), "DVC plugin module has no entry point; ignored");
            }
        }

        self.modules.push(module);

        Ok(outcome)
    }

    /// Creates a listener owned by this manager.
    ///
    /// Channel names are not required to be unique.
    pub fn create_listener(
        &mut self,
        channel_name: &str,
        flags: u32,
        callback: Box<dyn ListenerCallback>,
    ) -> DvcManResult<ListenerId> {
        self.listeners.create_listener(channel_name, flags, callback)
    }

    /// Calls the `initialize` hook of every registered plugin not yet initialized, in registration order.
    ///
    /// Calling it again after all plugins were initialized does nothing.
    pub fn initialize(&mut self) {
        for slot in self.plugins.slots_mut() {
            if slot.state != PluginState::Registered {
                continue;
            }

            debug!(plugin = slot.plugin.name(), "Initialize DVC plugin");
            slot.plugin.initialize(&mut self.listeners);
            slot.state = PluginState::Initialized;
        }
    }

    /// Terminates every plugin in registration order, then releases listeners, plugins and modules.
    pub fn free(self) {
        drop(self);
    }

    fn teardown(&mut self) {
        for slot in self.plugins.slots_mut() {
            if slot.state == PluginState::Terminated {
                continue;
            }

            debug!(plugin = slot.plugin.name(), "Terminate DVC plugin");
            slot.plugin.terminate();
            slot.state = PluginState::Terminated;
        }

        self.listeners.clear();
        self.plugins.clear();
        self.modules.clear();

        debug!(id = %self.id, "DVC manager freed");
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    pub fn plugin_states(&self) -> Vec<PluginState> {
        self.plugins.states().collect()
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listener(&self, id: ListenerId) -> Option<&Listener> {
        self.listeners.get(id)
    }

    pub fn listener_mut(&mut self, id: ListenerId) -> Option<&mut Listener> {
        self.listeners.get_mut(id)
    }

    /// Listener the protocol engine should bind `channel_name` to.
    ///
    /// When several listeners share the name, the first registered one wins.
    pub fn find_listener(&self, channel_name: &str) -> Option<&Listener> {
        self.listeners.find(channel_name)
    }

    pub fn find_listener_mut(&mut self, channel_name: &str) -> Option<&mut Listener> {
        self.listeners.find_mut(channel_name)
    }

    /// Number of modules kept loaded, including those without entry point.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelManager")
            .field("id", &self.id)
            .field("plugins", &self.plugins)
            .field("listeners", &self.listeners)
            .field("modules", &self.modules.iter().map(|m| m.locator()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
