use notify::Watcher;
use regex::Regex;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// All entry points need to have this name.
// (could make customizable, but forcing this has perks as well)
pub const SHADER_ENTRY_POINT_NAME: &str = "main";

#[derive(thiserror::Error, Debug)]
pub enum ShaderError {
    #[error("failed to read shader file {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("did not recognize file extension for shader file {0:?}")]
    UnknownExtension(PathBuf),
    #[error("failed to process include in {path:?} line {line}: {source}")]
    Include {
        path: PathBuf,
        line: usize,
        source: Box<ShaderError>,
    },
    #[error("failed to compile {identifier}:\n{message}")]
    Compilation { identifier: String, message: String },
    #[error("failed to watch shader directory: {0}")]
    Watch(#[from] notify::Error),
}

fn shader_stage(path: &Path) -> Result<naga::ShaderStage, ShaderError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("frag") => Ok(naga::ShaderStage::Fragment),
        Some("vert") => Ok(naga::ShaderStage::Vertex),
        Some("comp") => Ok(naga::ShaderStage::Compute),
        _ => Err(ShaderError::UnknownExtension(path.to_path_buf())),
    }
}

fn load_glsl_and_resolve_includes(path: &Path) -> Result<String, ShaderError> {
    lazy_static! {
        static ref INCLUDE_REGEX: Regex = Regex::new(r#"^\s*#\s*include\s+[<"](?P<file>.*)[>"]"#).unwrap();
    }

    let glsl_code = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let directory = path.parent().unwrap_or_else(|| Path::new(""));

    let mut expanded_code = Vec::new();
    for (line_number, line) in glsl_code.lines().enumerate() {
        match INCLUDE_REGEX.captures(line).and_then(|captures| captures.name("file")) {
            Some(included_file) => {
                let included_code =
                    load_glsl_and_resolve_includes(&directory.join(included_file.as_str())).map_err(|source| ShaderError::Include {
                        path: path.to_path_buf(),
                        line: line_number + 1,
                        source: Box::new(source),
                    })?;
                expanded_code.push(included_code);
            }
            None => expanded_code.push(line.to_string()),
        }
    }

    Ok(expanded_code.join("\n"))
}

// Runs the glsl front end on the cpu. Gives readable error messages instead of a device validation error.
fn parse_glsl(glsl_code: &str, identifier: &str, stage: naga::ShaderStage) -> Result<naga::Module, ShaderError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    frontend
        .parse(&naga::front::glsl::Options::from(stage), glsl_code)
        .map_err(|errors| ShaderError::Compilation {
            identifier: identifier.to_string(),
            message: format_glsl_errors(&errors, glsl_code),
        })
}

fn format_glsl_errors(errors: &[naga::front::glsl::Error], glsl_code: &str) -> String {
    errors
        .iter()
        .map(|error| {
            let location = error.meta.location(glsl_code);
            format!("{}:{}: {}", location.line_number, location.line_position, error)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ShaderDirectory {
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
    detected_change: Arc<AtomicBool>,
    directory: PathBuf,
}

impl ShaderDirectory {
    pub fn new(path: &Path) -> Result<ShaderDirectory, ShaderError> {
        let detected_change = Arc::new(AtomicBool::new(false));
        let detected_change_evt_ref = detected_change.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => detected_change_evt_ref.store(true, Ordering::Relaxed),
            Ok(_) => {}
            Err(e) => error!("Error while watching shader directory: {:?}", e),
        })?;
        watcher.watch(path, notify::RecursiveMode::Recursive)?;

        Ok(ShaderDirectory {
            watcher,
            detected_change,
            directory: PathBuf::from(path),
        })
    }

    // Checks if any change was detected in the shader directory.
    // Right now notifies any changes in the directory, if too slow consider filtering & distinguishing shaders.
    pub fn detected_change(&self) -> bool {
        self.detected_change.swap(false, Ordering::Relaxed)
    }

    /// Loads a shader with all includes resolved and checks that it compiles.
    pub fn load_glsl(&self, relative_filename: &Path) -> Result<(String, naga::ShaderStage), ShaderError> {
        load_and_check_glsl(&self.directory, relative_filename)
    }

    pub fn load_shader_module(&self, device: &wgpu::Device, relative_filename: &Path) -> Result<wgpu::ShaderModule, ShaderError> {
        let (glsl_code, stage) = self.load_glsl(relative_filename)?;
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: relative_filename.to_str(),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(glsl_code),
                stage,
                defines: Default::default(),
            },
        }))
    }
}

fn load_and_check_glsl(directory: &Path, relative_filename: &Path) -> Result<(String, naga::ShaderStage), ShaderError> {
    let path = directory.join(relative_filename);
    let stage = shader_stage(&path)?;
    let glsl_code = load_glsl_and_resolve_includes(&path)?;
    parse_glsl(&glsl_code, &relative_filename.to_string_lossy(), stage)?;
    Ok((glsl_code, stage))
}
