use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub state_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_dir: "./data/agentd".to_string(),
        }
    }
}

impl PersistenceConfig {
    pub fn checkpoints_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join("checkpoints")
    }

    pub fn profiles_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join("profiles")
    }
}
