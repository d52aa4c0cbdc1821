use std::path::{Path, PathBuf};

pub const MODULE_EXTENSION: &str = "ln";

/// Finds and reads module sources for `import`.
pub trait ModuleLoader {
    /// Turns the raw import string into a location. `importer` is the path
    /// of the importing module when it came from disk.
    fn resolve(&self, importer: Option<&Path>, raw: &str) -> Result<PathBuf, String>;
    fn load(&self, path: &Path) -> Result<String, String>;
}

/// Resolves relative to the importing module's directory, then the
/// working directory, adding the `.ln` extension when it is missing.
pub struct StdModuleLoader;

impl ModuleLoader for StdModuleLoader {
    fn resolve(&self, importer: Option<&Path>, raw: &str) -> Result<PathBuf, String> {
        let mut raw_path = PathBuf::from(raw);
        if raw_path.extension().is_none() {
            raw_path.set_extension(MODULE_EXTENSION);
        }
        if raw_path.is_absolute() {
            return raw_path
                .canonicalize()
                .map_err(|e| format!("{e} ({})", raw_path.display()));
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(base) = importer.and_then(Path::parent) {
            candidates.push(base.join(&raw_path));
        }
        candidates.push(raw_path.clone());

        let mut last_err: Option<String> = None;
        for candidate in &candidates {
            match candidate.canonicalize() {
                Ok(path) => return Ok(path),
                Err(e) => last_err = Some(e.to_string()),
            }
        }
        let tried = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let msg = last_err.unwrap_or_else(|| "file not found".into());
        Err(format!("{msg} (tried: {tried})"))
    }

    fn load(&self, path: &Path) -> Result<String, String> {
        std::fs::read_to_string(path).map_err(|e| format!("{e} ({})", path.display()))
    }
}
