//! Dynamic Virtual Channel (DVC) manager.
//!
//! Dynamic virtual channels are opened and closed by the server at any point of the RDP session.
//! Before the server can open a channel, a client-side component must have registered a listener
//! for its name. This crate owns the registry of such listeners and of the plugins that created them:
//!
//! - a [`PluginLoader`] resolves a plugin name, loads the module and calls its entry point with
//!   an [`EntryPoints`] capability bound to the [`ChannelManager`];
//! - the entry point registers one or more [`DvcPlugin`]s, and may create [`Listener`]s;
//! - [`ChannelManager::initialize`] calls every plugin `initialize` hook in registration order;
//! - [`ChannelManager::free`] calls every plugin `terminate` hook, then releases listeners and modules.
//!
//! The protocol engine looks listeners up by channel name ([`ChannelManager::find_listener`]) in order
//! to route incoming channel creation requests to the callback provided by the plugin.

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

pub mod config;
pub mod ffi;
pub mod loader;

mod entry_points;
mod listener;
mod manager;
mod plugin;

use core::fmt;

pub use config::DvcManConfig;
pub use entry_points::EntryPoints;
pub use listener::{Listener, ListenerCallback, ListenerId, ListenerRegistry, ManagerId, PropertyBag};
pub use loader::{DylibPluginLoader, LoadOutcome, PluginLoader, PluginModule, StaticPluginLoader};
pub use manager::ChannelManager;
pub use plugin::{DvcPlugin, PluginRegistry, PluginState, VirtualChannelManager};

pub type DvcManResult<T> = Result<T, DvcManError>;

/// Registry a capacity error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registry {
    Plugins,
    Listeners,
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Registry::Plugins => write!(f, "plugin"),
            Registry::Listeners => write!(f, "listener"),
        }
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub enum DvcManErrorKind {
    /// The registry already holds its maximum number of entries.
    CapacityExceeded { registry: Registry, capacity: usize },
    /// The plugin module could not be resolved or loaded.
    Load,
    /// A listener was requested with an empty or malformed channel name.
    InvalidChannelName,
    NotImplemented,
}

impl fmt::Display for DvcManErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            DvcManErrorKind::CapacityExceeded { registry, capacity } => {
                write!(f, "maximum {registry} number reached ({capacity})")
            }
            DvcManErrorKind::Load => write!(f, "plugin load error"),
            DvcManErrorKind::InvalidChannelName => write!(f, "invalid channel name"),
            DvcManErrorKind::NotImplemented => write!(f, "not implemented"),
        }
    }
}

impl std::error::Error for DvcManErrorKind {}

pub type DvcManError = ironrdp_error::Error<DvcManErrorKind>;

pub trait DvcManErrorExt {
    fn capacity_exceeded(context: &'static str, registry: Registry, capacity: usize) -> Self;
    fn load<E>(context: &'static str, e: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static;
    fn invalid_channel_name(context: &'static str) -> Self;
    fn not_implemented(context: &'static str) -> Self;
}

impl DvcManErrorExt for DvcManError {
    fn capacity_exceeded(context: &'static str, registry: Registry, capacity: usize) -> Self {
        Self::new(context, DvcManErrorKind::CapacityExceeded { registry, capacity })
    }

    fn load<E>(context: &'static str, e: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static,
    {
        Self::new(context, DvcManErrorKind::Load).with_source(e)
    }

    fn invalid_channel_name(context: &'static str) -> Self {
        Self::new(context, DvcManErrorKind::InvalidChannelName)
    }

    fn not_implemented(context: &'static str) -> Self {
        Self::new(context, DvcManErrorKind::NotImplemented)
    }
}

/// Returns `true` when the error is a capacity rejection, regardless of the registry.
pub fn is_capacity_exceeded(error: &DvcManError) -> bool {
    matches!(error.kind(), DvcManErrorKind::CapacityExceeded { .. })
}
