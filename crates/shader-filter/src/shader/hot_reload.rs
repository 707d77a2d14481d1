use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};

/// Watches one effect file and reports when it changes on disk.
///
/// The parent directory is watched rather than the file itself, so editors
/// that save by replacing the file are still picked up.
pub struct ShaderWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<PathBuf>,
}

impl ShaderWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let (tx, rx): (Sender<PathBuf>, Receiver<PathBuf>) = crossbeam_channel::unbounded();

        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("{} has no file name", path.display()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut debouncer = new_debouncer(
            Duration::from_millis(100),
            move |res: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                if let Ok(events) = res {
                    for event in events {
                        if event.kind == DebouncedEventKind::Any
                            && event.path.file_name() == Some(file_name.as_os_str())
                        {
                            let _ = tx.send(event.path.clone());
                        }
                    }
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&dir, notify::RecursiveMode::NonRecursive)?;
        log::info!("Watching {} for shader changes", path.display());

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
        })
    }

    /// Drain pending events. True if the file changed since the last call.
    pub fn changed(&self) -> bool {
        let mut changed = false;
        while self.receiver.try_recv().is_ok() {
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn reports_writes_to_the_watched_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("effect.shader");
        std::fs::write(&path, "uniform float a;").unwrap();

        let watcher = ShaderWatcher::new(&path).unwrap();
        assert!(!watcher.changed());

        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(&path, "uniform float b;").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while Instant::now() < deadline {
            if watcher.changed() {
                seen = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(seen);
    }
}
