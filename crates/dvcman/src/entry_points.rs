use crate::listener::{ListenerCallback, ListenerId, ListenerRegistry};
use crate::plugin::{DvcPlugin, PluginRegistry, VirtualChannelManager};
use crate::DvcManResult;

/// Capability handed to a plugin entry point.
///
/// It borrows the registries of the target manager and therefore only lives for the duration
/// of the entry point call.
pub struct EntryPoints<'a> {
    plugins: &'a mut PluginRegistry,
    listeners: &'a mut ListenerRegistry,
    registered: usize,
}

impl<'a> EntryPoints<'a> {
    pub(crate) fn new(plugins: &'a mut PluginRegistry, listeners: &'a mut ListenerRegistry) -> Self {
        Self {
            plugins,
            listeners,
            registered: 0,
        }
    }

    /// Adds `plugin` to the plugin registry of the manager.
    ///
    /// Fails with `CapacityExceeded` when the registry is full.
    pub fn register_plugin(&mut self, plugin: Box<dyn DvcPlugin>) -> DvcManResult<()> {
        self.plugins.insert(plugin)?;
        self.registered += 1;
        Ok(())
    }

    /// Number of plugins successfully registered through this capability.
    pub fn registered_count(&self) -> usize {
        self.registered
    }
}

impl VirtualChannelManager for EntryPoints<'_> {
    fn create_listener(
        &mut self,
        channel_name: &str,
        flags: u32,
        callback: Box<dyn ListenerCallback>,
    ) -> DvcManResult<ListenerId> {
        self.listeners.create_listener(channel_name, flags, callback)
    }
}
