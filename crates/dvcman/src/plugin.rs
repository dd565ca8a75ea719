use core::fmt;

use ironrdp_core::AsAny;

use crate::listener::{ListenerCallback, ListenerId, ListenerRegistry};
use crate::{DvcManError, DvcManErrorExt as _, DvcManResult, Registry};

/// Registration interface a plugin uses to create listeners.
///
/// Handed to [`DvcPlugin::initialize`], and available through [`EntryPoints`](crate::EntryPoints)
/// while the plugin entry point runs.
pub trait VirtualChannelManager {
    /// Registers a listener for `channel_name`.
    ///
    /// Fails with `CapacityExceeded` when the listener registry is full, in which case nothing is stored.
    fn create_listener(
        &mut self,
        channel_name: &str,
        flags: u32,
        callback: Box<dyn ListenerCallback>,
    ) -> DvcManResult<ListenerId>;
}

impl VirtualChannelManager for ListenerRegistry {
    fn create_listener(
        &mut self,
        channel_name: &str,
        flags: u32,
        callback: Box<dyn ListenerCallback>,
    ) -> DvcManResult<ListenerId> {
        self.insert(channel_name, flags, callback)
    }
}

impl<T: VirtualChannelManager + ?Sized> VirtualChannelManager for &mut T {
    fn create_listener(
        &mut self,
        channel_name: &str,
        flags: u32,
        callback: Box<dyn ListenerCallback>,
    ) -> DvcManResult<ListenerId> {
        (**self).create_listener(channel_name, flags, callback)
    }
}

/// A loaded DVC plugin.
///
/// Both lifecycle hooks are optional: the default implementations do nothing.
pub trait DvcPlugin: AsAny {
    /// Name used in logs.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Called once by [`ChannelManager::initialize`](crate::ChannelManager::initialize), in registration order.
    fn initialize(&mut self, _manager: &mut dyn VirtualChannelManager) {}

    /// Called once when the manager is freed, in registration order.
    fn terminate(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Registered,
    Initialized,
    Terminated,
}

pub(crate) struct PluginSlot {
    pub(crate) plugin: Box<dyn DvcPlugin>,
    pub(crate) state: PluginState,
}

/// Ordered, capacity-bounded set of registered plugins.
pub struct PluginRegistry {
    capacity: usize,
    slots: Vec<PluginSlot>,
}

impl PluginRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifecycle state of each plugin, in registration order.
    pub fn states(&self) -> impl Iterator<Item = PluginState> + '_ {
        self.slots.iter().map(|slot| slot.state)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.plugin.name())
    }

    pub fn get(&self, index: usize) -> Option<&dyn DvcPlugin> {
        self.slots.get(index).map(|slot| slot.plugin.as_ref())
    }

    pub fn get_downcast_ref<T: DvcPlugin>(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(|slot| slot.plugin.as_any().downcast_ref())
    }

    pub(crate) fn insert(&mut self, plugin: Box<dyn DvcPlugin>) -> DvcManResult<usize> {
        if self.slots.len() >= self.capacity {
            warn!(plugin = plugin.name(), capacity = self.capacity, "Maximum DVC plugin number reached");
            return Err(DvcManError::capacity_exceeded(
                "register plugin",
                Registry::Plugins,
                self.capacity,
            ));
        }

        let index = self.slots.len();
        info!(index, plugin = plugin.name(), "Register DVC plugin");

        self.slots.push(PluginSlot {
            plugin,
            state: PluginState::Registered,
        });

        Ok(index)
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = &mut PluginSlot> {
        self.slots.iter_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|slot| (slot.plugin.name(), slot.state)))
            .finish()
    }
}
