//! Fixtures shared by the integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use dvcman::{DvcPlugin, EntryPoints, ListenerCallback, VirtualChannelManager};
use ironrdp_core::impl_as_any;

/// Something observable that happened to a plugin or a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Initialize(String),
    Terminate(String),
    ListenerCreated(String),
    ListenerRejected(String),
    ListenerDropped(String),
    ChannelConnection { channel_name: String, channel_id: u32 },
}

/// Shared, ordered record of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Listener callback recording connections and its own destruction.
pub struct RecordingCallback {
    channel_name: String,
    accept: bool,
    log: EventLog,
}

impl RecordingCallback {
    pub fn new(channel_name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            channel_name: channel_name.into(),
            accept: true,
            log: log.clone(),
        }
    }

    #[must_use]
    pub fn rejecting(mut self) -> Self {
        self.accept = false;
        self
    }

    pub fn boxed(self) -> Box<dyn ListenerCallback> {
        Box::new(self)
    }
}

impl_as_any!(RecordingCallback);

impl ListenerCallback for RecordingCallback {
    fn on_new_channel_connection(&mut self, channel_id: u32) -> bool {
        self.log.push(Event::ChannelConnection {
            channel_name: self.channel_name.clone(),
            channel_id,
        });
        self.accept
    }
}

impl Drop for RecordingCallback {
    fn drop(&mut self) {
        self.log.push(Event::ListenerDropped(self.channel_name.clone()));
    }
}

/// Plugin recording its lifecycle hooks, creating listeners from `initialize`.
pub struct RecordingPlugin {
    name: String,
    listeners: Vec<String>,
    log: EventLog,
}

impl RecordingPlugin {
    pub fn new(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            listeners: Vec::new(),
            log: log.clone(),
        }
    }

    /// Creates a listener for `channel_name` when initialized.
    #[must_use]
    pub fn with_listener(mut self, channel_name: impl Into<String>) -> Self {
        self.listeners.push(channel_name.into());
        self
    }

    /// Plugin relying on the default (empty) lifecycle hooks.
    pub fn without_hooks(name: impl Into<String>, log: &EventLog) -> Box<dyn DvcPlugin> {
        Box::new(HooklessPlugin {
            name: name.into(),
            _log: log.clone(),
        })
    }

    pub fn boxed(self) -> Box<dyn DvcPlugin> {
        Box::new(self)
    }
}

impl_as_any!(RecordingPlugin);

impl DvcPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, manager: &mut dyn VirtualChannelManager) {
        self.log.push(Event::Initialize(self.name.clone()));

        for channel_name in &self.listeners {
            let callback = RecordingCallback::new(channel_name.clone(), &self.log).boxed();
            match manager.create_listener(channel_name, 0, callback) {
                Ok(_) => self.log.push(Event::ListenerCreated(channel_name.clone())),
                Err(_) => self.log.push(Event::ListenerRejected(channel_name.clone())),
            }
        }
    }

    fn terminate(&mut self) {
        self.log.push(Event::Terminate(self.name.clone()));
    }
}

struct HooklessPlugin {
    name: String,
    _log: EventLog,
}

impl_as_any!(HooklessPlugin);

impl DvcPlugin for HooklessPlugin {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Entry function registering a single plugin created by `make_plugin`.
pub fn register_one<F>(make_plugin: F) -> impl Fn(&mut EntryPoints<'_>) + 'static
where
    F: Fn() -> Box<dyn DvcPlugin> + 'static,
{
    move |entry_points: &mut EntryPoints<'_>| {
        let _ = entry_points.register_plugin(make_plugin());
    }
}
