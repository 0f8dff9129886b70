use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{DpiError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| DpiError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| DpiError::Config(format!("failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.runtime.workers == 0 {
        return Err(DpiError::Config("runtime.workers must be at least 1".to_string()));
    }
    if cfg.runtime.queue_capacity == 0 {
        return Err(DpiError::Config("runtime.queue_capacity must be at least 1".to_string()));
    }
    if cfg.runtime.flow_capacity == 0 {
        return Err(DpiError::Config("runtime.flow_capacity must be at least 1".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = \"127.0.0.1:8080\"").unwrap();
        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.runtime.workers, 4);
        assert!(cfg.rule_store.is_in_memory());
    }

    #[test]
    fn rejects_zero_workers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = \"127.0.0.1:8080\"").unwrap();
        writeln!(file, "[runtime]").unwrap();
        writeln!(file, "workers = 0").unwrap();
        assert!(load_from_path(file.path()).is_err());
    }
}
