pub mod settings;

pub use settings::{
    apply_overrides, default_settings_path, load_settings, parse_settings, serialize_settings,
    validate_settings, AlertingSettings, FirehoseSettings, Settings, SettingsError, SinkDefaults,
    StencilSettings, StreamRegistrySettings, MAX_LOG_SINK_TTL_HOURS,
};
