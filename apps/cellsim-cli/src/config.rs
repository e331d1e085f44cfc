use anyhow::Context;
use cellsim_kernel::SimulatorConfig;
use cellsim_physics::NativePhysicsConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings file for the command-line front end.
///
/// ```yaml
/// simulator: { time_step: 0.5, step_interval_ms: 10 }
/// physics: { linear_damping: 0.2 }
/// plugin_dirs: [./plugins]
/// parameters: { count: "20" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub simulator: SimulatorConfig,
    pub physics: NativePhysicsConfig,
    pub plugin_dirs: Vec<PathBuf>,
    pub parameters: BTreeMap<String, String>,
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Command-line directories are searched before configured ones;
    /// command-line parameters replace configured values of the same name.
    pub fn merge(&mut self, plugin_dirs: &[PathBuf], parameters: &[(String, String)]) {
        let mut dirs = plugin_dirs.to_vec();
        dirs.append(&mut self.plugin_dirs);
        self.plugin_dirs = dirs;
        for (name, value) in parameters {
            self.parameters.insert(name.clone(), value.clone());
        }
    }
}

/// Parse a `name=value` argument.
pub fn parse_param(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got `{arg}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(parse_param("seed=7"), Ok(("seed".into(), "7".into())));
        assert_eq!(parse_param("expr=a=b"), Ok(("expr".into(), "a=b".into())));
        assert!(parse_param("seed").is_err());
        assert!(parse_param("=7").is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cellsim.yaml");
        std::fs::write(&path, "simulator: { time_step: 0.5 }\nplugin_dirs: [plugins]\n").unwrap();
        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.simulator.time_step, 0.5);
        assert_eq!(config.simulator.step_interval_ms, 0);
        assert_eq!(config.plugin_dirs, vec![PathBuf::from("plugins")]);
        assert_eq!(config.physics, NativePhysicsConfig::default());
    }

    #[test]
    fn unknown_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cellsim.yaml");
        std::fs::write(&path, "simulatr: {}\n").unwrap();
        assert!(CliConfig::load(&path).is_err());
    }

    #[test]
    fn command_line_takes_precedence() {
        let mut config = CliConfig {
            plugin_dirs: vec![PathBuf::from("configured")],
            parameters: BTreeMap::from([("n".to_string(), "1".to_string())]),
            ..CliConfig::default()
        };
        config.merge(&[PathBuf::from("flag")], &[("n".to_string(), "5".to_string())]);
        assert_eq!(config.plugin_dirs, vec![PathBuf::from("flag"), PathBuf::from("configured")]);
        assert_eq!(config.parameters["n"], "5");
    }
}
