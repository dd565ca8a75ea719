//! Reference native DVC plugin.
//!
//! Registers a single plugin whose `initialize` hook creates a listener for the [`CHANNEL_NAME`]
//! channel. Every channel connection is accepted.

use core::ffi::CStr;
use core::ptr;

use dvcman::ffi::{DvcChannelManagerVTable, DvcEntryPoints, DvcListenerCallbackVTable, DvcPluginVTable, DVC_ERROR, DVC_OK};

pub const CHANNEL_NAME: &CStr = c"ECHO";

// Must start with the vtable: the host sees a `*mut DvcPluginVTable`.
#[repr(C)]
struct EchoPlugin {
    vtable: DvcPluginVTable,
    listener_callback: EchoListenerCallback,
}

#[repr(C)]
struct EchoListenerCallback {
    vtable: DvcListenerCallbackVTable,
    connections: u32,
}

/// # Safety
///
/// `entry_points` must be the table provided by the DVC manager.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn DVCPluginEntry(entry_points: *mut DvcEntryPoints) -> i32 {
    if entry_points.is_null() {
        return DVC_ERROR;
    }

    let plugin = Box::into_raw(Box::new(EchoPlugin {
        vtable: DvcPluginVTable {
            initialize: Some(initialize),
            terminated: Some(terminated),
        },
        listener_callback: EchoListenerCallback {
            vtable: DvcListenerCallbackVTable {
                on_new_channel_connection: Some(on_new_channel_connection),
            },
            connections: 0,
        },
    }));

    // SAFETY: `entry_points` is a valid table for the duration of this call.
    let register_plugin = unsafe { (*entry_points).register_plugin };

    // SAFETY: `plugin` starts with its vtable and stays alive until `terminated`.
    let status = unsafe { register_plugin(entry_points, plugin.cast()) };

    if status != DVC_OK {
        // SAFETY: the host refused the plugin and holds no pointer to it.
        drop(unsafe { Box::from_raw(plugin) });
    }

    status
}

unsafe extern "C" fn initialize(plugin: *mut DvcPluginVTable, manager: *mut DvcChannelManagerVTable) -> i32 {
    if plugin.is_null() || manager.is_null() {
        return DVC_ERROR;
    }

    let plugin = plugin.cast::<EchoPlugin>();

    // SAFETY: `plugin` was allocated by `DVCPluginEntry`.
    let callback = unsafe { ptr::addr_of_mut!((*plugin).listener_callback) };

    // SAFETY: `manager` is valid for the duration of this call.
    let create_listener = unsafe { (*manager).create_listener };

    // SAFETY: the channel name is NUL-terminated and the callback lives as long as the plugin.
    unsafe { create_listener(manager, CHANNEL_NAME.as_ptr(), 0, callback.cast()) }
}

unsafe extern "C" fn terminated(plugin: *mut DvcPluginVTable) {
    if plugin.is_null() {
        return;
    }

    // SAFETY: `plugin` was allocated by `DVCPluginEntry` and `terminated` is the last call made on it.
    drop(unsafe { Box::from_raw(plugin.cast::<EchoPlugin>()) });
}

unsafe extern "C" fn on_new_channel_connection(
    callback: *mut DvcListenerCallbackVTable,
    _channel_id: u32,
    accept: *mut i32,
) -> i32 {
    if callback.is_null() || accept.is_null() {
        return DVC_ERROR;
    }

    // SAFETY: `callback` points to the `EchoListenerCallback` embedded in the plugin.
    let callback = unsafe { &mut *callback.cast::<EchoListenerCallback>() };
    callback.connections = callback.connections.saturating_add(1);

    // SAFETY: `accept` was checked for null and is writable for the duration of the call.
    unsafe { accept.write(1) };

    DVC_OK
}
