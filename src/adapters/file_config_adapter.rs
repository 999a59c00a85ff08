//! INI file configuration adapter.

use crate::domain::error::ArimaTraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArimaTraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| ArimaTraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        tracing::debug!(file = %path.display(), "loaded config");
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ArimaTraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ArimaTraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL: &str = r#"
[data]
directory = /srv/prices
symbol = SPY
frequency = weekly

[model]
train_fraction = 0.75
max_p = 3
stepwise = no

[evaluation]
annualization_factor = 52
"#;

    #[test]
    fn from_string_reads_every_section() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(adapter.get_string("data", "symbol"), Some("SPY".to_string()));
        assert_eq!(adapter.get_string("model", "max_p"), Some("3".to_string()));
        assert_eq!(adapter.get_string("model", "train_fraction"), Some("0.75".to_string()));
        assert!(!adapter.get_bool("model", "stepwise", true));
        assert_eq!(
            adapter.get_string("evaluation", "annualization_factor"),
            Some("52".to_string())
        );
    }

    #[test]
    fn missing_keys_fall_back() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(adapter.get_string("data", "start_date"), None);
        assert_eq!(adapter.get_string("output", "directory"), None);
        assert_eq!(adapter.get_string("model", "max_q"), None);
        assert!(adapter.get_bool("model", "parallel", true));
    }

    #[test]
    fn keys_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Model]\nMax_P = 4\n").unwrap();
        assert_eq!(adapter.get_string("model", "max_p"), Some("4".to_string()));
    }

    #[test]
    fn bool_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[model]\na = YES\nb = 0\nc = sometimes\n").unwrap();
        assert!(adapter.get_bool("model", "a", false));
        assert!(!adapter.get_bool("model", "b", true));
        assert!(adapter.get_bool("model", "c", true));
    }

    #[test]
    fn non_empty_trims_and_drops_blank() {
        let adapter = FileConfigAdapter::from_string("[data]\nsymbol =   \nother = x\n").unwrap();
        assert_eq!(adapter.get_non_empty("data", "symbol"), None);
        assert_eq!(adapter.get_non_empty("data", "other"), Some("x".to_string()));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[output]\ndirectory = /tmp/out\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("output", "directory"),
            Some("/tmp/out".to_string())
        );
    }

    #[test]
    fn from_file_reports_parse_error_with_path() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        match err {
            ArimaTraderError::ConfigParse { file, .. } => assert!(file.contains("config.ini")),
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }
}
