//! C ABI between the manager and native plugin libraries.
//!
//! A native plugin exports [`DVC_PLUGIN_ENTRY_SYMBOL`] with the [`DvcPluginEntryFn`] signature.
//! The entry point receives a [`DvcEntryPoints`] table and is expected to call `register_plugin`
//! with a pointer to an object starting with a [`DvcPluginVTable`]. It may also create listeners
//! through `entry_points->manager`.
//!
//! Pointer validity:
//!
//! - the `DvcEntryPoints` table is only valid during the entry point call;
//! - a `DvcChannelManagerVTable` is only valid during the call it was passed to
//!   (the entry point, or the plugin `initialize` hook);
//! - plugin objects and listener callbacks must stay valid until the plugin `terminated` hook returns.
//!
//! Functions return [`DVC_OK`] on success and [`DVC_ERROR`] otherwise.

use core::ffi::{c_char, c_void, CStr};
use core::ptr::NonNull;

use ironrdp_core::impl_as_any;

use crate::listener::ListenerCallback;
use crate::plugin::{DvcPlugin, VirtualChannelManager};
use crate::{DvcManResult, EntryPoints, ListenerId};

/// Name of the symbol a native plugin exports.
pub const DVC_PLUGIN_ENTRY_SYMBOL: &[u8] = b"DVCPluginEntry\0";

pub const DVC_OK: i32 = 0;
pub const DVC_ERROR: i32 = 1;

pub type DvcPluginEntryFn = unsafe extern "C" fn(entry_points: *mut DvcEntryPoints) -> i32;

#[repr(C)]
pub struct DvcEntryPoints {
    pub register_plugin: unsafe extern "C" fn(entry_points: *mut DvcEntryPoints, plugin: *mut DvcPluginVTable) -> i32,
    pub manager: *mut DvcChannelManagerVTable,
    /// Host private data
    pub context: *mut c_void,
}

#[repr(C)]
pub struct DvcPluginVTable {
    pub initialize:
        Option<unsafe extern "C" fn(plugin: *mut DvcPluginVTable, manager: *mut DvcChannelManagerVTable) -> i32>,
    pub terminated: Option<unsafe extern "C" fn(plugin: *mut DvcPluginVTable)>,
}

#[repr(C)]
pub struct DvcChannelManagerVTable {
    pub create_listener: unsafe extern "C" fn(
        manager: *mut DvcChannelManagerVTable,
        channel_name: *const c_char,
        flags: u32,
        callback: *mut DvcListenerCallbackVTable,
    ) -> i32,
    /// Host private data
    pub context: *mut c_void,
}

#[repr(C)]
pub struct DvcListenerCallbackVTable {
    pub on_new_channel_connection:
        Option<unsafe extern "C" fn(callback: *mut DvcListenerCallbackVTable, channel_id: u32, accept: *mut i32) -> i32>,
}

/// Invokes a native entry point, bridging its calls to `entry_points`.
///
/// Returns the status reported by the entry point.
///
/// # Safety
///
/// `entry` must follow the contract documented at the module level, and the code it points to must
/// stay loaded for as long as the plugins it registers are alive.
pub unsafe fn invoke_entry_point(entry: DvcPluginEntryFn, module: &str, entry_points: &mut EntryPoints<'_>) -> i32 {
    let mut host = EntryHost { entry_points, module };
    let host_ptr: *mut EntryHost<'_, '_> = &mut host;

    let mut manager = DvcChannelManagerVTable {
        create_listener: create_listener_thunk::<EntryHost<'_, '_>>,
        context: host_ptr.cast(),
    };

    let mut table = DvcEntryPoints {
        register_plugin: register_plugin_thunk,
        manager: &mut manager,
        context: host_ptr.cast(),
    };

    // SAFETY: upheld by the caller; the tables and `host` outlive the call.
    unsafe { entry(&mut table) }
}

struct EntryHost<'a, 'b> {
    entry_points: &'b mut EntryPoints<'a>,
    module: &'b str,
}

impl VirtualChannelManager for EntryHost<'_, '_> {
    fn create_listener(
        &mut self,
        channel_name: &str,
        flags: u32,
        callback: Box<dyn ListenerCallback>,
    ) -> DvcManResult<ListenerId> {
        self.entry_points.create_listener(channel_name, flags, callback)
    }
}

unsafe extern "C" fn register_plugin_thunk(entry_points: *mut DvcEntryPoints, plugin: *mut DvcPluginVTable) -> i32 {
    let Some(plugin) = NonNull::new(plugin) else {
        warn!("Native plugin registered a null plugin object");
        return DVC_ERROR;
    };

    if entry_points.is_null() {
        return DVC_ERROR;
    }

    // SAFETY: `entry_points` is the table built by `invoke_entry_point`.
    let context = unsafe { (*entry_points).context };
    // SAFETY: the context of that table is a live `EntryHost`.
    let host = unsafe { &mut *context.cast::<EntryHost<'_, '_>>() };

    let plugin = ForeignPlugin {
        raw: plugin,
        name: host.module.to_owned(),
    };

    match host.entry_points.register_plugin(Box::new(plugin)) {
        Ok(()) => DVC_OK,
        Err(_) => DVC_ERROR,
    }
}

unsafe extern "C" fn create_listener_thunk<M: VirtualChannelManager>(
    manager: *mut DvcChannelManagerVTable,
    channel_name: *const c_char,
    flags: u32,
    callback: *mut DvcListenerCallbackVTable,
) -> i32 {
    let Some(callback) = NonNull::new(callback) else {
        warn!("Native plugin passed a null listener callback");
        return DVC_ERROR;
    };

    if manager.is_null() || channel_name.is_null() {
        return DVC_ERROR;
    }

    // SAFETY: `channel_name` is a NUL-terminated string provided by the plugin.
    let channel_name = match unsafe { CStr::from_ptr(channel_name) }.to_str() {
        Ok(name) => name,
        Err(error) => {
            warn!(%error, "Native plugin passed a non UTF-8 channel name");
            return DVC_ERROR;
        }
    };

    // SAFETY: `manager` is a table built by this module.
    let context = unsafe { (*manager).context };
    // SAFETY: the context of that table points to a live `M`.
    let host = unsafe { &mut *context.cast::<M>() };

    match host.create_listener(channel_name, flags, Box::new(ForeignListenerCallback { raw: callback })) {
        Ok(_) => DVC_OK,
        Err(_) => DVC_ERROR,
    }
}

/// Plugin object living in a native library.
struct ForeignPlugin {
    raw: NonNull<DvcPluginVTable>,
    name: String,
}

impl_as_any!(ForeignPlugin);

impl DvcPlugin for ForeignPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, manager: &mut dyn VirtualChannelManager) {
        // SAFETY: the plugin object stays valid until `terminated` returns.
        let Some(initialize) = (unsafe { self.raw.as_ref() }).initialize else {
            return;
        };

        let mut manager = manager;
        let manager_ptr: *mut &mut dyn VirtualChannelManager = &mut manager;

        let mut table = DvcChannelManagerVTable {
            create_listener: create_listener_thunk::<&mut dyn VirtualChannelManager>,
            context: manager_ptr.cast(),
        };

        // SAFETY: `table` and the manager it refers to outlive the call.
        let status = unsafe { initialize(self.raw.as_ptr(), &mut table) };
        if status != DVC_OK {
            warn!(plugin = %self.name, status, "Native plugin initialization reported a failure");
        }
    }

    fn terminate(&mut self) {
        // SAFETY: the plugin object stays valid until `terminated` returns.
        if let Some(terminated) = (unsafe { self.raw.as_ref() }).terminated {
            // SAFETY: called once, as the last call made on the plugin object.
            unsafe { terminated(self.raw.as_ptr()) };
        }
    }
}

/// Listener callback living in a native library.
struct ForeignListenerCallback {
    raw: NonNull<DvcListenerCallbackVTable>,
}

impl_as_any!(ForeignListenerCallback);

impl ListenerCallback for ForeignListenerCallback {
    fn on_new_channel_connection(&mut self, channel_id: u32) -> bool {
        // SAFETY: listener callbacks stay valid until the owning plugin is terminated.
        let Some(on_new_channel_connection) = (unsafe { self.raw.as_ref() }).on_new_channel_connection else {
            return false;
        };

        let mut accept = 0;

        // SAFETY: same as above; `accept` outlives the call.
        let status = unsafe { on_new_channel_connection(self.raw.as_ptr(), channel_id, &mut accept) };

        status == DVC_OK && accept != 0
    }
}
