//! INI file configuration adapter.

use crate::domain::error::OrderPointError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OrderPointError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| OrderPointError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, OrderPointError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| OrderPointError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn sections(&self) -> Vec<String> {
        let mut sections: Vec<String> = self
            .config
            .get_map_ref()
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        sections.sort();
        sections
    }
}
