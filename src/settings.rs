//! Boolean-setting lookup seam into the host configuration store.
//!
//! The configuration manager itself lives outside this crate; callers here
//! only need [`setting_bool_get`], which is false-by-default on every failure
//! path (no backend, missing section, missing name, zero value). The hosting
//! application registers its store once at startup.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

/// Read access to the host's key/value configuration store.
pub trait SettingsBackend: Send + Sync {
    /// Returns the stored unsigned value for `section`/`name`, if present.
    fn get_uint(&self, section: &str, name: &str) -> Option<u64>;
}

static BACKEND: OnceCell<Arc<dyn SettingsBackend>> = OnceCell::new();

/// Registers the process-wide settings backend. Set-once: returns false (and
/// keeps the original) if a backend was already registered.
pub fn register_settings_backend(backend: Arc<dyn SettingsBackend>) -> bool {
    let registered = BACKEND.set(backend).is_ok();
    if !registered {
        debug!("settings backend already registered, keeping the original");
    }
    registered
}

/// Looks up a boolean setting.
///
/// True iff the named setting exists and is non-zero; false in every other
/// case, including a missing backend. Callers rely on this exact
/// false-by-default behavior.
pub fn setting_bool_get(section: &str, name: &str) -> bool {
    match BACKEND.get().and_then(|b| b.get_uint(section, name)) {
        Some(value) => value != 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapBackend(HashMap<String, u64>);

    impl SettingsBackend for MapBackend {
        fn get_uint(&self, section: &str, name: &str) -> Option<u64> {
            self.0.get(&format!("{section}/{name}")).copied()
        }
    }

    #[test]
    fn test_setting_bool_get_defaults_false() {
        // Runs against whatever is (or is not) registered; an unknown
        // section/name must never be true.
        assert!(!setting_bool_get("NoSuchSection", "NoSuchName"));
    }

    #[test]
    fn test_setting_bool_get_with_backend() {
        let mut map = HashMap::new();
        map.insert("Engine/EnableDebugPrivilege".to_string(), 1u64);
        map.insert("Engine/DisableAslr".to_string(), 0u64);
        register_settings_backend(Arc::new(MapBackend(map)));

        assert!(setting_bool_get("Engine", "EnableDebugPrivilege"));
        assert!(!setting_bool_get("Engine", "DisableAslr"));
        assert!(!setting_bool_get("Engine", "Missing"));
        assert!(!setting_bool_get("Gui", "EnableDebugPrivilege"));
    }
}
