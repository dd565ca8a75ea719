use dvcman::{ChannelManager, LoadOutcome};

/// Outcome of a load attempt, as shown to the user.
#[derive(Debug)]
pub struct LoadReport {
    pub plugin: String,
    pub result: Result<LoadOutcome, String>,
}

impl LoadReport {
    pub fn new(plugin: impl Into<String>, result: dvcman::DvcManResult<LoadOutcome>) -> Self {
        Self {
            plugin: plugin.into(),
            result: result.map_err(|e| e.report().to_string()),
        }
    }
}

/// Renders the load results followed by the plugin and listener registries.
pub fn render(loads: &[LoadReport], manager: &ChannelManager) -> String {
    let mut out = String::from("modules:\n");

    for load in loads {
        let status = match &load.result {
            Ok(LoadOutcome::EntryPointInvoked { registered }) => format!("loaded, {registered} plugin(s) registered"),
            Ok(LoadOutcome::MissingEntryPoint) => "loaded, no entry point".to_owned(),
            Err(error) => format!("failed: {error}"),
        };
        out.push_str(&format!("  {}: {status}\n", load.plugin));
    }

    let plugins = manager.plugins();
    out.push_str(&format!("plugins: {}/{}\n", plugins.len(), plugins.capacity()));
    for (index, (name, state)) in plugins.names().zip(plugins.states()).enumerate() {
        out.push_str(&format!("  #{index} {name} ({state:?})\n"));
    }

    let listeners = manager.listeners();
    out.push_str(&format!("listeners: {}/{}\n", listeners.len(), listeners.capacity()));
    for (index, listener) in listeners.iter().enumerate() {
        out.push_str(&format!(
            "  #{index} {} flags={:#010x}\n",
            listener.channel_name(),
            listener.flags()
        ));
    }

    trace!(size = out.len(), "Rendered DVC manager report");

    out
}
