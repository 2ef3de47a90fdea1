//! INI file configuration adapter.
//!
//! Keys are case-insensitive and come back lowercased; section and key
//! order follow the file.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
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

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        self.config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
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

    const SIGNALS: &str = r#"
[data]
path = bars/rb2405.csv
date_column = date
strict = yes

[output]
max_rows = 20

[signals]
oversold = J < 0
rebound = J cross_up 0 & $oversold
trend = COUNT(close > ma_5, close > ma_20) >= 2
"#;

    #[test]
    fn from_string_parses_config() {
        let adapter = FileConfigAdapter::from_string(SIGNALS).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("bars/rb2405.csv".to_string())
        );
        assert_eq!(
            adapter.get_string("signals", "trend"),
            Some("COUNT(close > ma_5, close > ma_20) >= 2".to_string())
        );
    }

    #[test]
    fn keys_follow_file_order() {
        let adapter = FileConfigAdapter::from_string(SIGNALS).unwrap();
        assert_eq!(adapter.keys("signals"), vec!["oversold", "rebound", "trend"]);
        assert_eq!(adapter.keys("SIGNALS"), vec!["oversold", "rebound", "trend"]);
        assert!(adapter.keys("missing").is_empty());
    }

    #[test]
    fn keys_are_lowercased() {
        let adapter = FileConfigAdapter::from_string("[signals]\nGoldenCross = J > 0\n").unwrap();
        assert_eq!(adapter.keys("signals"), vec!["goldencross"]);
        assert_eq!(
            adapter.get_string("signals", "GoldenCross"),
            Some("J > 0".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string(SIGNALS).unwrap();
        assert_eq!(adapter.get_string("data", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_falls_back_to_default() {
        let adapter = FileConfigAdapter::from_string(SIGNALS).unwrap();
        assert_eq!(adapter.get_int("output", "max_rows", 0), 20);
        assert_eq!(adapter.get_int("data", "path", 42), 42);
        assert_eq!(adapter.get_int("output", "missing", 7), 7);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(SIGNALS).unwrap();
        assert!(adapter.get_bool("data", "strict", false));
        assert!(adapter.get_bool("data", "missing", true));
        assert!(!adapter.get_bool("data", "missing", false));
        assert!(!adapter.get_bool("data", "path", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config(SIGNALS);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("data", "date_column"), Some("date".to_string()));
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/signals.ini");
        assert!(result.is_err());
    }
}
