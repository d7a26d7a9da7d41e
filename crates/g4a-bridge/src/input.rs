//! Line input for interactive front ends
//!
//! Reads happen on a plain OS thread. A read blocked on a terminal cannot be
//! cancelled, and a runtime-owned blocking task would hold up runtime shutdown
//! until the next line arrives.

use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::debug;

/// Stream lines from `reader` into a channel
///
/// The channel closes after EOF or the first read error, which is delivered
/// as the last item. The thread exits on its own once the receiver is dropped
/// and the next line arrives.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let spawned = std::thread::Builder::new()
        .name("g4a-input".into())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Input reader finished");
        });
    if let Err(err) = spawned {
        // Receiver sees the error, then a closed channel
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Err(err));
        return rx;
    }
    rx
}

/// Stream lines typed on stdin
pub fn stdin_lines() -> mpsc::Receiver<std::io::Result<String>> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
}
