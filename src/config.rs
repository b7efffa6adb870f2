use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

// Pointer interaction.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ForceConfig {
    // Scales pointer movement (in pixels, multiplied with the grid scale) to velocity.
    pub gain: f32,
    // Radius of the splat, in domain units (longest grid side is 1).
    pub impulse_radius: f32,
    // Ink added to the color field while dragging.
    pub color_tint: [f32; 4],
}

impl Default for ForceConfig {
    fn default() -> Self {
        ForceConfig {
            gain: 60.0,
            impulse_radius: 0.05,
            color_tint: [0.1, 0.45, 1.0, 1.0],
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub timestep: f32,
    // Kinematic viscosity.
    pub viscosity: f32,
    // Used for both the viscous diffusion and the pressure solve.
    pub jacobi_iterations: u32,
    pub force: ForceConfig,
    // Number of frames the cpu may record ahead of the gpu.
    pub frames_in_flight: usize,
    pub vsync: bool,
    pub shader_directory: PathBuf,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            timestep: 0.005,
            viscosity: 1.5,
            jacobi_iterations: 50,
            force: ForceConfig::default(),
            frames_in_flight: 2,
            vsync: true,
            shader_directory: PathBuf::from("shader"),
        }
    }
}

impl SimulationConfig {
    pub const DEFAULT_PATH: &'static str = "config/ink.json";
    pub const PATH_ENV_VARIABLE: &'static str = "INK_CONFIG";

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("frames_in_flight has to be at least 1"));
        }
        if !(self.timestep > 0.0) {
            return Err(ConfigError::Invalid("timestep has to be positive"));
        }
        if !(self.viscosity > 0.0) {
            return Err(ConfigError::Invalid("viscosity has to be positive"));
        }
        Ok(())
    }

    // Config file path is taken from INK_CONFIG if set. A missing default file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(Self::PATH_ENV_VARIABLE) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                let path = Path::new(Self::DEFAULT_PATH);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    info!("no config file at {:?}, using defaults", path);
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{ "jacobi_iterations": 20, "force": { "gain": 10.0 } }"#).unwrap();
        assert_eq!(config.jacobi_iterations, 20);
        assert_eq!(config.force.gain, 10.0);
        assert_eq!(config.force.impulse_radius, ForceConfig::default().impulse_radius);
        assert_eq!(config.timestep, 0.005);
        assert_eq!(config.viscosity, 1.5);
        assert_eq!(config.frames_in_flight, 2);
    }

    #[test]
    fn shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(SimulationConfig::DEFAULT_PATH);
        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(config.jacobi_iterations, 50);
    }

    #[test]
    fn zero_frames_in_flight_are_rejected() {
        let config = SimulationConfig {
            frames_in_flight: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_reported() {
        match SimulationConfig::from_file(Path::new("does/not/exist.json")) {
            Err(ConfigError::Io { .. }) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
