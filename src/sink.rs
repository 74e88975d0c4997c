// Artifact sinks
//
// Where emitted source artifacts go. Sinks are shared between compiling
// units, so `write` takes `&self` and synchronises internally.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::config::OutputConfig;

pub trait ArtifactSink: Send + Sync {
    /// Store `contents` under `key` (a generated type name).
    fn write(&self, key: &str, contents: &str) -> Result<()>;
}

/// Keeps artifacts in memory. Used by tests and by hosts that compile the
/// generated code themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<BTreeMap<String, String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.artifacts.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.artifacts.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All artifacts, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.artifacts.lock().clone()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, key: &str, contents: &str) -> Result<()> {
        self.artifacts
            .lock()
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// Writes `<directory>/<key>.<extension>`. Files whose contents are already
/// identical are left alone so build tools do not see a change.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
    extension: String,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, &config.extension)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", key, self.extension))
    }
}

impl ArtifactSink for DirectorySink {
    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key);

        if let Ok(existing) = fs::read_to_string(&path) {
            if existing == contents {
                log::debug!("Unchanged artifact: {}", path.display());
                return Ok(());
            }
        }

        fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create output directory: {}", self.directory.display()))?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("shader-layout-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_memory_sink_overwrites() {
        let sink = MemorySink::new();
        sink.write("Light", "a").unwrap();
        sink.write("Light", "b").unwrap();
        assert_eq!(sink.get("Light").as_deref(), Some("b"));
        assert_eq!(sink.keys(), ["Light"]);
    }

    #[test]
    fn test_directory_sink_skips_identical_contents() {
        let dir = temp_dir("sink");
        let sink = DirectorySink::new(&dir, "rs");
        let path = sink.path_for("Light");

        sink.write("Light", "pub struct Light;").unwrap();
        let first = fs::metadata(&path).unwrap().modified().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        sink.write("Light", "pub struct Light;").unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), first);

        sink.write("Light", "pub struct Light(u32);").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "pub struct Light(u32);");

        let _ = fs::remove_dir_all(&dir);
    }
}
