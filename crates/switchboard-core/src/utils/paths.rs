use std::path::PathBuf;

/// Standardized application directories for Switchboard.
///
/// - Project-level: ./.switchboard
/// - User-level config: uses OS-specific dirs
/// - User-level data (logs): uses OS-specific dirs
pub struct AppPaths;

impl AppPaths {
    /// Return the project-level .switchboard directory (relative to current working dir)
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".switchboard")
    }

    /// Return the project-level config path: ./.switchboard/config.toml
    pub fn project_config() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Return the user-level config directory (platform-specific)
    pub fn user_config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "switchboard").map(|d| d.config_dir().to_path_buf())
    }

    /// Return the user-level data directory (platform-specific)
    pub fn user_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "switchboard").map(|d| d.data_dir().to_path_buf())
    }

    /// Return the user-level config path (platform-specific)
    pub fn user_config() -> Option<PathBuf> {
        Self::user_config_dir().map(|d| d.join("config.toml"))
    }

    /// Default directory for log files
    pub fn log_dir() -> Option<PathBuf> {
        Self::user_data_dir().map(|d| d.join("logs"))
    }

    /// Config files that exist, project first, then user-level
    pub fn discover_configs() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let project = Self::project_config();
        if project.exists() {
            paths.push(project);
        }
        if let Some(user) = Self::user_config() {
            if user.exists() {
                paths.push(user);
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_paths_are_static() {
        assert_eq!(AppPaths::project_dir(), PathBuf::from(".switchboard"));
        assert_eq!(
            AppPaths::project_config(),
            PathBuf::from(".switchboard/config.toml")
        );
    }

    #[test]
    fn discover_configs_order_is_deterministic() {
        let configs = AppPaths::discover_configs();
        assert!(configs.len() <= 2);
        if configs.len() == 2 {
            assert_eq!(configs[0], AppPaths::project_config());
            assert_eq!(Some(configs[1].clone()), AppPaths::user_config());
        }
    }

    #[test]
    fn log_dir_lives_under_data_dir() {
        if let (Some(logs), Some(data)) = (AppPaths::log_dir(), AppPaths::user_data_dir()) {
            assert!(logs.starts_with(data));
        }
    }
}
