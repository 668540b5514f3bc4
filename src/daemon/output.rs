//! Forwarding of daemon stdout/stderr into the tracing sink.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Emit every line of `reader` as an `info` event until EOF.
///
/// Runs for the lifetime of the child's pipe. Invalid UTF-8 is replaced,
/// not dropped.
pub(crate) async fn forward_output<R>(reader: R, pid: u32, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if !line.is_empty() {
                    tracing::info!(pid, stream, "{}", line);
                }
            }
            Err(e) => {
                tracing::debug!(pid, stream, error = %e, "Daemon output read failed");
                break;
            }
        }
    }

    tracing::debug!(pid, stream, "Daemon output closed");
}
