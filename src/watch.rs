// Shader source watcher
//
// Feeds changed shader paths back to the host so it can recompile only the
// affected units.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::WatchConfig;

/// Whether `path` has one of the watched shader extensions.
pub fn is_shader_path(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(extension)))
}

pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    extensions: Vec<String>,
}

impl ShaderWatcher {
    /// Watch `root` recursively.
    pub fn new(root: impl AsRef<Path>, config: &WatchConfig) -> Result<Self> {
        let root = root.as_ref();
        let (sender, events) = channel();
        let mut watcher = notify::recommended_watcher(sender).context("Failed to create file watcher")?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        log::info!("Watching {} for shader changes", root.display());

        Ok(Self {
            _watcher: watcher,
            events,
            extensions: config.extensions.clone(),
        })
    }

    /// Shader files created or modified since the last call, without
    /// duplicates. Never blocks.
    pub fn drain_changed(&self) -> Vec<PathBuf> {
        let mut changed = BTreeSet::new();
        for event in self.events.try_iter() {
            match event {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    changed.extend(
                        event
                            .paths
                            .into_iter()
                            .filter(|path| is_shader_path(path, &self.extensions)),
                    );
                }
                Err(err) => log::warn!("File watcher error: {}", err),
            }
        }
        changed.into_iter().collect()
    }
}
