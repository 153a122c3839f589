use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use triggerfail_core::{Sink, TriggerSet};

/// `sh -c <script>`.
pub fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd.stdin(std::process::Stdio::null());
    cmd
}

pub fn triggers(list: &[&str]) -> TriggerSet {
    TriggerSet::new(list.iter().copied()).expect("valid triggers")
}

/// In-memory sink; the handle resolves to everything relayed once the run
/// has dropped the sink.
pub fn capture() -> (Sink, JoinHandle<Vec<u8>>) {
    let (wr, mut rd) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(async move {
        let mut out = Vec::new();
        rd.read_to_end(&mut out).await.expect("read captured output");
        out
    });
    (Box::new(wr), handle)
}

pub async fn captured(handle: JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.await.expect("capture task");
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Sink whose first write fails with `BrokenPipe`.
pub fn broken_sink() -> Sink {
    let mock = tokio_test::io::Builder::new()
        .write_error(std::io::ErrorKind::BrokenPipe.into())
        .build();
    Box::new(mock)
}
