//! Watches the rendered configuration file for outside modification.
//!
//! Another writer (or a manual edit) touching the file schedules a
//! debounced reload of the proxy; the file's content is never read here.

use std::path::Path;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Start watching the config file's directory and bridge change
/// notifications from notify's callback thread onto a channel the control
/// loop can select on. The returned watcher must be kept alive for the
/// subscription to stay registered.
pub fn watch_config(
    path: &Path,
) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>), notify::Error> {
    let (tx, rx) = mpsc::unbounded_channel();

    // Watch the parent directory: the atomic rename in the write path would
    // drop a watch registered on the file itself.
    let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let file_name = path.file_name().map(|name| name.to_owned());

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_owned()) == file_name);
                if ours {
                    let _ = tx.send(());
                }
            }
            Ok(_) => {}
            Err(err) => log::error!("Config file watch error: {err}"),
        },
        notify::Config::default(),
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    log::info!("Watching {} for outside modification", path.display());

    Ok((watcher, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_modification_is_reported() {
        let dir = std::env::temp_dir().join("upsync-watch-test");
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("default.conf");
        std::fs::write(&path, "initial").expect("write");

        let (_watcher, mut rx) = watch_config(&path).expect("Failed to watch");

        // Give the backend a moment to register before modifying.
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(&path, "changed").expect("write");

        let notified = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(notified.is_ok(), "expected a change notification");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_sibling_files_are_filtered() {
        let dir = std::env::temp_dir().join("upsync-watch-filter-test");
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("default.conf");
        std::fs::write(&path, "initial").expect("write");

        let (_watcher, mut rx) = watch_config(&path).expect("Failed to watch");
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(dir.join("other.conf"), "noise").expect("write");

        let notified = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(notified.is_err(), "sibling file must not notify");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
