use std::collections::BTreeMap;

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use ironrdp_core::AsAny;

use crate::{DvcManError, DvcManErrorExt as _, DvcManResult, Registry};

/// Identifies one [`ChannelManager`](crate::ChannelManager) instance.
///
/// Listeners keep it as a back-reference to the manager owning them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(u64);

impl ManagerId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dvcman#{}", self.0)
    }
}

/// Plugin-provided object receiving channel connections for a listener.
///
/// Its contract is between the plugin and the protocol engine: the manager stores it
/// and hands it out unchanged.
pub trait ListenerCallback: AsAny {
    /// Called when the server creates a channel matching the listener name.
    ///
    /// Returns `false` when the plugin rejects the channel.
    fn on_new_channel_connection(&mut self, channel_id: u32) -> bool;
}

/// Handle returned by `create_listener`, usable to look the listener up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId {
    manager: ManagerId,
    index: usize,
}

impl ListenerId {
    pub fn manager(self) -> ManagerId {
        self.manager
    }

    /// Position of the listener in registration order.
    pub fn index(self) -> usize {
        self.index
    }
}

/// Listener configuration, as a set of named properties.
pub type PropertyBag = BTreeMap<String, String>;

/// A named endpoint the server may bind a dynamic channel to.
pub struct Listener {
    manager: ManagerId,
    channel_name: String,
    flags: u32,
    callback: Box<dyn ListenerCallback>,
}

impl Listener {
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Opaque flags passed by the plugin, interpreted by the protocol engine.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Manager owning this listener.
    pub fn manager(&self) -> ManagerId {
        self.manager
    }

    pub fn callback(&self) -> &dyn ListenerCallback {
        self.callback.as_ref()
    }

    pub fn callback_mut(&mut self) -> &mut dyn ListenerCallback {
        self.callback.as_mut()
    }

    pub fn callback_downcast_ref<T: ListenerCallback>(&self) -> Option<&T> {
        self.callback.as_any().downcast_ref()
    }

    /// Listeners carry no configuration; this always fails with `NotImplemented`.
    pub fn configuration(&self) -> DvcManResult<PropertyBag> {
        trace!(channel_name = %self.channel_name, "Listener configuration requested");
        Err(DvcManError::not_implemented("listener configuration"))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("manager", &self.manager)
            .field("channel_name", &self.channel_name)
            .field("flags", &format_args!("{:#010x}", self.flags))
            .finish_non_exhaustive()
    }
}

/// Ordered, capacity-bounded set of listeners.
///
/// Channel names are not required to be unique.
pub struct ListenerRegistry {
    manager: ManagerId,
    capacity: usize,
    listeners: Vec<Listener>,
}

impl ListenerRegistry {
    pub(crate) fn new(manager: ManagerId, capacity: usize) -> Self {
        Self {
            manager,
            capacity,
            listeners: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listener> {
        self.listeners.iter()
    }

    pub fn get(&self, id: ListenerId) -> Option<&Listener> {
        if id.manager != self.manager {
            return None;
        }
        self.listeners.get(id.index)
    }

    pub fn get_mut(&mut self, id: ListenerId) -> Option<&mut Listener> {
        if id.manager != self.manager {
            return None;
        }
        self.listeners.get_mut(id.index)
    }

    /// First listener registered under `channel_name`.
    pub fn find(&self, channel_name: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.channel_name == channel_name)
    }

    pub fn find_mut(&mut self, channel_name: &str) -> Option<&mut Listener> {
        self.listeners.iter_mut().find(|l| l.channel_name == channel_name)
    }

    /// Every listener registered under `channel_name`, in registration order.
    pub fn find_all<'a>(&'a self, channel_name: &'a str) -> impl Iterator<Item = &'a Listener> {
        self.listeners.iter().filter(move |l| l.channel_name == channel_name)
    }

    pub(crate) fn insert(
        &mut self,
        channel_name: &str,
        flags: u32,
        callback: Box<dyn ListenerCallback>,
    ) -> DvcManResult<ListenerId> {
        if channel_name.is_empty() || channel_name.contains('\0') {
            warn!(channel_name, "Rejected listener with an invalid channel name");
            return Err(DvcManError::invalid_channel_name("create listener"));
        }

        if self.listeners.len() >= self.capacity {
            warn!(channel_name, capacity = self.capacity, "Maximum DVC listener number reached");
            return Err(DvcManError::capacity_exceeded(
                "create listener",
                Registry::Listeners,
                self.capacity,
            ));
        }

        let index = self.listeners.len();
        debug!(index, channel_name, flags, "Create DVC listener");

        self.listeners.push(Listener {
            manager: self.manager,
            channel_name: channel_name.to_owned(),
            flags,
            callback,
        });

        Ok(ListenerId {
            manager: self.manager,
            index,
        })
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerRegistry([")?;

        for (i, listener) in self.listeners.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", listener.channel_name)?;
        }

        write!(f, "])")
    }
}
