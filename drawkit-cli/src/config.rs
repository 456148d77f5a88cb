use std::path::PathBuf;

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drawkit")
        .join("cluster.json")
}
