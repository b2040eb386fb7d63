pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AppConfigLayer, ConfigError, ConfigManager, ConsoleConfig, FilesConfig,
    InsightsConfig, ListParamsStyle, LoggingConfig, ServerProfile, TransportConfig,
};
