//! The single-threaded control loop.
//!
//! One `select!` delivers at most one of {stream event, regeneration
//! deadline, reload deadline, file-change notification} per iteration, and
//! regeneration runs inline in its branch. Coalescer state and the output
//! file are therefore never touched by two handlers at once.

use std::path::PathBuf;
use std::time::Duration;

use crate::coalescer::{Coalescer, Directive};
use crate::config::Config;
use crate::debounce::Debounce;
use crate::directory::DirectoryClient;
use crate::proxy;
use crate::render::Renderer;
use crate::stream::{EventStream, StreamError};
use crate::watch;

/// Wait after the fleet reaches quiescence before regenerating.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);
/// Wait after an outside file modification before reloading the proxy.
pub const RELOAD_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("unable to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}

pub async fn run(config: &Config, renderer: Renderer) -> Result<(), SyncError> {
    let directory = DirectoryClient::new(config);
    let mut stream = EventStream::connect(&config.stream_url_with_auth()).await?;

    // Bootstrap: the proxy serves the current topology before any event
    // arrives, and only then do we start watching our own output file.
    log::info!("Writing initial proxy configuration");
    regenerate(&directory, &renderer, config).await;

    let (_watcher, mut file_changes) =
        watch::watch_config(&config.conf_path).map_err(|source| SyncError::Watch {
            path: config.conf_path.clone(),
            source,
        })?;

    let mut coalescer = Coalescer::new();
    let mut regen = Debounce::new(SETTLE_DELAY);
    let mut reload = Debounce::new(RELOAD_DELAY);

    loop {
        tokio::select! {
            event = stream.next_event() => {
                let event = event?;
                apply(coalescer.observe(&event), &mut regen);
            }
            _ = regen.expired(), if regen.is_armed() => {
                log::info!("Fleet settled, regenerating proxy configuration");
                regenerate(&directory, &renderer, config).await;
            }
            _ = reload.expired(), if reload.is_armed() => {
                proxy::reload(&config.reload_cmd).await;
            }
            changed = file_changes.recv() => {
                if changed.is_some() {
                    log::info!("Configuration file changed on disk, scheduling proxy reload");
                    reload.arm();
                }
            }
        }
    }
}

/// Map a coalescer directive onto the pending regeneration deadline.
fn apply(directive: Directive, regen: &mut Debounce) {
    match directive {
        Directive::Ignore => {}
        Directive::CancelPending => regen.cancel(),
        Directive::ScheduleRegen => regen.arm(),
    }
}

/// One full regeneration cycle: fetch, render, atomic write, reload. Any
/// failure logs and skips the rest of the cycle; the control loop never
/// crashes over it and the next trigger retries naturally.
async fn regenerate(directory: &DirectoryClient, renderer: &Renderer, config: &Config) {
    let services = match directory.running_http_services().await {
        Ok(services) => services,
        Err(err) => {
            log::error!("Skipping regeneration, {err}");
            return;
        }
    };

    let rendered = match renderer.render(&services) {
        Ok(rendered) => rendered,
        Err(err) => {
            log::error!("Skipping regeneration, template failed to render: {err}");
            return;
        }
    };

    log::info!(
        "Writing proxy configuration for {} services to {}",
        services.len(),
        config.conf_path.display()
    );
    if let Err(err) = proxy::write_config(&config.conf_path, &rendered).await {
        log::error!("Unable to write {}: {err}", config.conf_path.display());
        return;
    }

    proxy::reload(&config.reload_cmd).await;
}
