use directories::ProjectDirs;
use std::path::PathBuf;

/// Per-user directories for config, data and logs
///
/// Thin wrapper over [`ProjectDirs`]; follows XDG on Linux and the platform
/// conventions elsewhere.
pub struct ProjectPaths {
    dirs: ProjectDirs,
}

impl ProjectPaths {
    /// `None` when no home directory can be determined
    pub fn new(name: &str) -> Option<Self> {
        ProjectDirs::from("", "", name).map(|dirs| Self { dirs })
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dirs.config_dir().to_path_buf()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dirs.data_dir().to_path_buf()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_contain_name() {
        if let Some(paths) = ProjectPaths::new("telebridge") {
            assert!(paths.config_dir().to_string_lossy().contains("telebridge"));
            assert!(paths.log_dir().ends_with("logs"));
        }
    }
}
