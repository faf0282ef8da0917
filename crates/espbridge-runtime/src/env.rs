//! Settings for runtime objects built without explicit configuration.

use espbridge_core::BridgeSettings;
use tracing::warn;

/// `BridgeSettings::from_env`, falling back to the defaults when an override
/// is invalid.
pub(crate) fn settings_from_env(component: &'static str) -> BridgeSettings {
    BridgeSettings::from_env().unwrap_or_else(|e| {
        warn!(error = %e, component, "Ignoring invalid bridge settings");
        BridgeSettings::with_defaults()
    })
}
