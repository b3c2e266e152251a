use {
    crate::error::{Result, SurrogateError},
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

/// Graph optimizations the runtime applies when loading the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimization {
    Disabled,
    Basic,
    Extended,
    #[default]
    All,
}

impl From<Optimization> for onnx::OptimizationLevel {
    fn from(level: Optimization) -> Self {
        match level {
            Optimization::Disabled => onnx::OptimizationLevel::Disabled,
            Optimization::Basic => onnx::OptimizationLevel::EnableBasic,
            Optimization::Extended => onnx::OptimizationLevel::EnableExtended,
            Optimization::All => onnx::OptimizationLevel::EnableAll,
        }
    }
}

/// Severity threshold of the runtime's own log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeLogLevel {
    Verbose,
    Info,
    #[default]
    Warning,
    Error,
    Fatal,
}

impl From<RuntimeLogLevel> for onnx::LogLevel {
    fn from(level: RuntimeLogLevel) -> Self {
        match level {
            RuntimeLogLevel::Verbose => onnx::LogLevel::Verbose,
            RuntimeLogLevel::Info => onnx::LogLevel::Info,
            RuntimeLogLevel::Warning => onnx::LogLevel::Warning,
            RuntimeLogLevel::Error => onnx::LogLevel::Error,
            RuntimeLogLevel::Fatal => onnx::LogLevel::Fatal,
        }
    }
}

/// Everything needed to load one surrogate model.
///
/// ```json
/// {
///     "model_path": "residual.onnx",
///     "model_name": "simpleLoop_eq14",
///     "input_size": 2,
///     "output_size": 1,
///     "input_name": "x",
///     "output_name": "y"
/// }
/// ```
///
/// `input_name` and `output_name` may be left out, in which case the names
/// declared by the model are used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurrogateConfig {
    pub model_path: PathBuf,
    pub model_name: String,
    pub input_size: usize,
    pub output_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    #[serde(default)]
    pub optimization_level: Optimization,
    #[serde(default)]
    pub log_level: RuntimeLogLevel,
}

impl SurrogateConfig {
    pub fn new(
        model_path: impl Into<PathBuf>,
        model_name: impl Into<String>,
        input_size: usize,
        output_size: usize,
        input_name: Option<&str>,
        output_name: Option<&str>,
    ) -> Self {
        SurrogateConfig {
            model_path: model_path.into(),
            model_name: model_name.into(),
            input_size,
            output_size,
            input_name: input_name.map(str::to_string),
            output_name: output_name.map(str::to_string),
            optimization_level: Optimization::default(),
            log_level: RuntimeLogLevel::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SurrogateError::Config(format!("Invalid surrogate config: {}", e)))
    }

    /// Read a config file. A relative `model_path` is taken relative to the
    /// directory containing the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            SurrogateError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_json_str(&json)?;
        if config.model_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.model_path = dir.join(&config.model_path);
            }
        }
        Ok(config)
    }

    /// Check the parameters that do not depend on the model itself.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.output_size == 0 {
            return Err(SurrogateError::Load(format!(
                "Input and output sizes must be positive (got {} and {})",
                self.input_size, self.output_size
            )));
        }
        check_name("model name", &self.model_name)?;
        if let Some(name) = &self.input_name {
            check_name("input node name", name)?;
        }
        if let Some(name) = &self.output_name {
            check_name("output node name", name)?;
        }
        Ok(())
    }
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SurrogateError::Load(format!("Empty {}", what)));
    }
    if name.contains('\0') {
        return Err(SurrogateError::Load(format!("Null byte in {} {:?}", what, name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config = SurrogateConfig::from_json_str(
            r#"{"model_path": "m.onnx", "model_name": "eq14", "input_size": 2, "output_size": 1}"#,
        )
        .unwrap();
        assert_eq!(config.model_path, PathBuf::from("m.onnx"));
        assert_eq!(config.input_name, None);
        assert_eq!(config.output_name, None);
        assert_eq!(config.optimization_level, Optimization::All);
        assert_eq!(config.log_level, RuntimeLogLevel::Warning);
    }

    #[test]
    fn test_full_json() {
        let config = SurrogateConfig::from_json_str(
            r#"{
                "model_path": "/models/m.onnx",
                "model_name": "eq14",
                "input_size": 3,
                "output_size": 2,
                "input_name": "x",
                "output_name": "y",
                "optimization_level": "disabled",
                "log_level": "error"
            }"#,
        )
        .unwrap();
        assert_eq!(config.input_name.as_deref(), Some("x"));
        assert_eq!(config.output_name.as_deref(), Some("y"));
        assert_eq!(config.optimization_level, Optimization::Disabled);
        assert_eq!(config.log_level, RuntimeLogLevel::Error);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let result = SurrogateConfig::from_json_str("{\"model_path\": ");
        assert!(matches!(result, Err(SurrogateError::Config(_))));

        let result = SurrogateConfig::from_json_str(r#"{"model_path": "m.onnx"}"#);
        assert!(matches!(result, Err(SurrogateError::Config(_))));
    }

    #[test]
    fn test_unknown_optimization_level_is_config_error() {
        let result = SurrogateConfig::from_json_str(
            r#"{"model_path": "m", "model_name": "n", "input_size": 1, "output_size": 1, "optimization_level": "max"}"#,
        );
        assert!(matches!(result, Err(SurrogateError::Config(_))));
    }

    #[test]
    fn test_from_file_resolves_relative_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surrogate.json");
        fs::write(
            &path,
            r#"{"model_path": "nn/m.onnx", "model_name": "eq", "input_size": 1, "output_size": 1}"#,
        )
        .unwrap();
        let config = SurrogateConfig::from_file(&path).unwrap();
        assert_eq!(config.model_path, dir.path().join("nn/m.onnx"));
    }

    #[test]
    fn test_from_missing_file_is_config_error() {
        let result = SurrogateConfig::from_file("/nonexistent/surrogate.json");
        assert!(matches!(result, Err(SurrogateError::Config(_))));
    }

    #[test]
    fn test_validate() {
        let config = SurrogateConfig::new("m.onnx", "eq", 2, 1, Some("x"), None);
        assert!(config.validate().is_ok());

        let zero = SurrogateConfig::new("m.onnx", "eq", 0, 1, None, None);
        assert!(matches!(zero.validate(), Err(SurrogateError::Load(_))));

        let empty_name = SurrogateConfig::new("m.onnx", "eq", 2, 1, Some(""), None);
        assert!(matches!(empty_name.validate(), Err(SurrogateError::Load(_))));

        let nul = SurrogateConfig::new("m.onnx", "eq", 2, 1, None, Some("y\0"));
        assert!(matches!(nul.validate(), Err(SurrogateError::Load(_))));

        let no_model_name = SurrogateConfig::new("m.onnx", "", 2, 1, None, None);
        assert!(matches!(no_model_name.validate(), Err(SurrogateError::Load(_))));
    }

    #[test]
    fn test_serialize_omits_absent_names() {
        let config = SurrogateConfig::new("m.onnx", "eq", 2, 1, None, None);
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("input_name"));
        assert_eq!(SurrogateConfig::from_json_str(&json).unwrap(), config);
    }
}
