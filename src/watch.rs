use std::path::Path;
use std::sync::mpsc::{Receiver, channel};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches one file and signals on every modify/create/remove event.
/// Events stop when the returned watcher is dropped.
pub fn watch_file(path: &Path) -> Result<(RecommendedWatcher, Receiver<()>), notify::Error> {
    let (tx, rx) = channel::<()>();
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        match res {
            Ok(event) => match event.kind {
                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any => {
                    let _ = tx.send(());
                }
                _ => {}
            },
            Err(e) => log::warn!("watch error: {}", e),
        }
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    log::info!("watching {}", path.display());
    Ok((watcher, rx))
}

/// Drains bursts of events so one save triggers one reload.
pub fn settle(rx: &Receiver<()>, quiet: std::time::Duration) {
    while rx.recv_timeout(quiet).is_ok() {}
}
