//! Output file handling and the proxy reload command.

use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Replace the configuration file in one step. The rendered text goes to a
/// sibling temp file first and is renamed over the target, so a reload never
/// observes a partially written file.
pub async fn write_config(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Fire-and-forget reload of the proxy process. The exit status gates
/// nothing; failures are logged and the next cycle tries again.
pub async fn reload(command: &str) {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        log::error!("Reload command is empty, skipping proxy reload");
        return;
    };

    log::info!("Reloading proxy: {command}");
    match Command::new(program).args(parts).status().await {
        Ok(status) if status.success() => log::info!("Proxy reloaded"),
        Ok(status) => log::warn!("Proxy reload exited with {status}"),
        Err(err) => log::error!("Unable to run the reload command: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_config_replaces_contents() {
        let dir = std::env::temp_dir().join("upsync-write-test");
        tokio::fs::create_dir_all(&dir).await.expect("mkdir");
        let path = dir.join("default.conf");

        write_config(&path, "first").await.expect("Failed to write");
        write_config(&path, "second").await.expect("Failed to write");

        let contents = tokio::fs::read_to_string(&path).await.expect("Failed to read");
        assert_eq!(contents, "second");
        // No temp file left behind.
        assert!(!dir.join("default.conf.tmp").exists());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_reload_tolerates_missing_command() {
        // Must not panic or error out of the cycle.
        reload("definitely-not-a-real-binary --flag").await;
        reload("").await;
    }
}
