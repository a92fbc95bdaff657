//! Plugin registration table.
//!
//! Adding a new plugin: append one entry to `PLUGINS`.

use crate::core::error::SwitchboardError;
use crate::core::registry::RegistryBuilder;
use crate::plugins::{admin, calc, meta, snippet, text};
use tracing::debug;

pub struct PluginInit {
    pub name: &'static str,
    pub register: fn(&mut RegistryBuilder) -> Result<(), SwitchboardError>,
}

/// Registration order is listing order.
pub const PLUGINS: &[PluginInit] = &[
    PluginInit { name: "meta", register: meta::register },
    PluginInit { name: "text", register: text::register },
    PluginInit { name: "snippet", register: snippet::register },
    PluginInit { name: "calc", register: calc::register },
    PluginInit { name: "admin", register: admin::register },
];

pub fn register_builtins(builder: &mut RegistryBuilder) -> Result<(), SwitchboardError> {
    for plugin in PLUGINS {
        (plugin.register)(builder)?;
        debug!(plugin = plugin.name, "plugin registered");
    }
    Ok(())
}
