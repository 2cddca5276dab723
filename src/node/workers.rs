use crate::error::Result;
use crossbeam_channel::{select, tick, Receiver};
use log::info;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Run `f` every `interval` on a named thread until `stop` fires or its
/// sender is dropped
pub fn spawn_ticker<F>(
    name: &str,
    interval: Duration,
    stop: Receiver<()>,
    mut f: F,
) -> Result<JoinHandle<()>>
where
    F: FnMut() + Send + 'static,
{
    let label = name.to_string();
    let handle = thread::Builder::new()
        .name(label.clone())
        .spawn(move || {
            info!("{label} loop started");
            let ticker = tick(interval);
            loop {
                select! {
                    recv(stop) -> _ => break,
                    recv(ticker) -> _ => f(),
                }
            }
            info!("{label} loop stopped");
        })?;
    Ok(handle)
}

/// Run a long-lived loop that watches `stop` itself
pub fn spawn_worker<F>(name: &str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::Builder::new().name(name.to_string()).spawn(f)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_ticker_runs_until_stopped() {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = spawn_ticker("test", Duration::from_millis(5), stop_rx, move || {
            seen.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        while count.load(Ordering::Relaxed) < 3 {
            thread::sleep(Duration::from_millis(5));
        }
        drop(stop_tx);
        handle.join().unwrap();
        let after = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::Relaxed), after);
    }
}
