use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::error::RunnerError;

use super::abort::{KillLatch, KillRequest};
use super::found::FoundTriggers;
use super::triggers::TriggerSet;
use super::types::{Sink, StreamKind};

const READ_CHUNK: usize = 16 * 1024;

/// Everything one stream scanner needs besides its pipe and sink.
pub(crate) struct ScanConfig {
    pub stream: StreamKind,
    pub triggers: Arc<TriggerSet>,
    /// False when the stream is only relayed, never matched.
    pub evaluate: bool,
    pub abort: bool,
    pub found: FoundTriggers,
    pub latch: Arc<KillLatch>,
}

/// Spawn a task that splits `rd` into lines, relays each line to `sink` and
/// matches it against the triggers. Resolves to the number of lines handled.
///
/// A failing sink does not stop the scan: the pipe is still drained and
/// matched to EOF, and the relay error is returned at the end.
pub(crate) fn spawn_scan<R>(
    rd: R,
    sink: Option<Sink>,
    cfg: ScanConfig,
) -> JoinHandle<Result<u64, RunnerError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut scanner = LineScanner {
            sink,
            cfg,
            lines: 0,
            relay_err: None,
        };
        let res = scanner.run(rd).await;
        scanner.finish().await;
        let lines = res?;
        match scanner.relay_err.take() {
            Some(source) => Err(RunnerError::StreamIo {
                stream: scanner.cfg.stream,
                source,
            }),
            None => Ok(lines),
        }
    })
}

struct LineScanner {
    sink: Option<Sink>,
    cfg: ScanConfig,
    lines: u64,
    relay_err: Option<std::io::Error>,
}

impl LineScanner {
    async fn run<R>(&mut self, mut rd: R) -> Result<u64, RunnerError>
    where
        R: AsyncRead + Unpin,
    {
        let stream = self.cfg.stream;
        let latch = self.cfg.latch.clone();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut line_buf: Vec<u8> = Vec::with_capacity(8 * 1024);

        loop {
            let n = tokio::select! {
                res = rd.read(&mut buf) => {
                    res.map_err(|source| RunnerError::StreamIo { stream, source })?
                }
                // Aborted: a grandchild may keep this pipe open long after the kill.
                _ = latch.stopped() => return Ok(self.lines),
            };
            if n == 0 {
                break;
            }

            // Only the new bytes can hold a delimiter; anything before is a partial line.
            let mut scan_from = line_buf.len();
            line_buf.extend_from_slice(&buf[..n]);

            let mut start = 0;
            while let Some(pos) = memchr::memchr(b'\n', &line_buf[scan_from..]) {
                let end = scan_from + pos;
                if self.on_line(&line_buf[start..end]).await.is_break() {
                    return Ok(self.lines);
                }
                start = end + 1;
                scan_from = start;
            }
            line_buf.drain(..start);
        }

        // EOF flush: deliver the last partial line if it doesn't end with '\n'.
        if !line_buf.is_empty() {
            let _ = self.on_line(&line_buf).await;
        }

        Ok(self.lines)
    }

    async fn on_line(&mut self, line: &[u8]) -> ControlFlow<()> {
        let stream = self.cfg.stream;

        // The other scanner already aborted the run; stop relaying.
        if self.cfg.latch.is_tripped() {
            return ControlFlow::Break(());
        }

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = relay(sink, line).await {
                tracing::warn!(stream = %stream, error = %e, "relay failed, discarding further output");
                self.sink = None;
                self.relay_err = Some(e);
            }
        }
        self.lines += 1;

        if !self.cfg.evaluate {
            return ControlFlow::Continue(());
        }

        let mut first_hit = None;
        for trigger in self.cfg.triggers.matches(line) {
            self.cfg.found.push(trigger);
            tracing::debug!(
                stream = %stream,
                line = self.lines,
                trigger = %trigger,
                total = self.cfg.found.len(),
                "trigger found"
            );
            first_hit.get_or_insert(trigger);
        }

        match first_hit {
            Some(trigger) if self.cfg.abort => {
                let req = KillRequest {
                    trigger: trigger.to_string(),
                    stream,
                };
                if self.cfg.latch.trip(req) {
                    tracing::debug!(stream = %stream, trigger = %trigger, "abort requested");
                }
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        }
    }

    async fn finish(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = sink.flush().await {
            self.relay_err.get_or_insert(e);
        }
    }
}

async fn relay(sink: &mut Sink, line: &[u8]) -> std::io::Result<()> {
    sink.write_all(line).await?;
    sink.write_all(b"\n").await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(triggers: &[&str], abort: bool) -> (ScanConfig, FoundTriggers, Arc<KillLatch>) {
        let found = FoundTriggers::new();
        let (latch, _rx) = KillLatch::new();
        let cfg = ScanConfig {
            stream: StreamKind::Stdout,
            triggers: Arc::new(TriggerSet::new(triggers.iter().copied()).unwrap()),
            evaluate: true,
            abort,
            found: found.clone(),
            latch: latch.clone(),
        };
        (cfg, found, latch)
    }

    async fn relayed(mut rd: tokio::io::DuplexStream) -> Vec<u8> {
        let mut out = Vec::new();
        rd.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn flushes_last_line_without_newline_on_eof() {
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (sink, sink_rd) = tokio::io::duplex(1024);
        let (cfg, found, _latch) = config(&["hello"], false);

        let task = spawn_scan(rd, Some(Box::new(sink)), cfg);

        wr.write_all(b"one\nhello").await.unwrap();
        drop(wr);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        assert_eq!(relayed(sink_rd).await, b"one\nhello\n");
        assert_eq!(found.take(), vec!["hello"]);
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_reads() {
        let (mut wr, rd) = tokio::io::duplex(8);
        let (cfg, found, _latch) = config(&["needle"], false);

        let task = spawn_scan(rd, None, cfg);

        let mut line = vec![b'x'; 3 * READ_CHUNK];
        line.extend_from_slice(b"needle");
        line.extend(std::iter::repeat(b'y').take(READ_CHUNK));
        line.push(b'\n');
        wr.write_all(&line).await.unwrap();
        drop(wr);

        assert_eq!(task.await.unwrap().unwrap(), 1);
        assert_eq!(found.take(), vec!["needle"]);
    }

    #[tokio::test]
    async fn keeps_carriage_returns_and_empty_lines() {
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (sink, sink_rd) = tokio::io::duplex(1024);
        let (cfg, _found, _latch) = config(&[], false);

        let task = spawn_scan(rd, Some(Box::new(sink)), cfg);

        wr.write_all(b"a\r\n\nb\n").await.unwrap();
        drop(wr);

        assert_eq!(task.await.unwrap().unwrap(), 3);
        assert_eq!(relayed(sink_rd).await, b"a\r\n\nb\n");
    }

    #[tokio::test]
    async fn abort_stops_after_matching_line() {
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (sink, sink_rd) = tokio::io::duplex(1024);
        let (cfg, found, latch) = config(&["foo", "baz"], true);

        let task = spawn_scan(rd, Some(Box::new(sink)), cfg);

        wr.write_all(b"bar\nfoo\nbaz\n").await.unwrap();
        drop(wr);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        assert!(latch.is_tripped());
        assert_eq!(found.take(), vec!["foo"]);
        assert_eq!(relayed(sink_rd).await, b"bar\nfoo\n");
    }

    #[tokio::test]
    async fn tripped_latch_stops_other_scanner() {
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (cfg, found, latch) = config(&["foo"], true);
        latch.trip(KillRequest {
            trigger: "elsewhere".into(),
            stream: StreamKind::Stderr,
        });

        let task = spawn_scan(rd, None, cfg);

        wr.write_all(b"foo\n").await.unwrap();
        drop(wr);

        assert_eq!(task.await.unwrap().unwrap(), 0);
        assert!(found.take().is_empty());
    }

    #[tokio::test]
    async fn ignored_stream_is_relayed_but_not_matched() {
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (sink, sink_rd) = tokio::io::duplex(1024);
        let (mut cfg, found, latch) = config(&["foo"], true);
        cfg.evaluate = false;

        let task = spawn_scan(rd, Some(Box::new(sink)), cfg);

        wr.write_all(b"foo\nbar\n").await.unwrap();
        drop(wr);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        assert!(!latch.is_tripped());
        assert!(found.take().is_empty());
        assert_eq!(relayed(sink_rd).await, b"foo\nbar\n");
    }

    #[tokio::test]
    async fn read_error_surfaces_with_lines_seen_so_far() {
        let rd = tokio_test::io::Builder::new()
            .read(b"hit\npart")
            .read_error(std::io::Error::other("pipe broke"))
            .build();
        let (sink, sink_rd) = tokio::io::duplex(1024);
        let (cfg, found, _latch) = config(&["hit", "part"], false);

        let err = spawn_scan(rd, Some(Box::new(sink)), cfg)
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(
            err,
            RunnerError::StreamIo {
                stream: StreamKind::Stdout,
                ..
            }
        ));
        assert_eq!(found.take(), vec!["hit"]);
        assert_eq!(relayed(sink_rd).await, b"hit\n");
    }

    #[tokio::test]
    async fn failing_sink_keeps_draining_and_matching() {
        let sink = tokio_test::io::Builder::new()
            .write_error(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            .build();
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (cfg, found, _latch) = config(&["hit"], false);

        let task = spawn_scan(rd, Some(Box::new(sink)), cfg);

        wr.write_all(b"a\nb\nhit\n").await.unwrap();
        drop(wr);

        let err = task.await.unwrap().unwrap_err();
        match err {
            RunnerError::StreamIo { stream, source } => {
                assert_eq!(stream, StreamKind::Stdout);
                assert_eq!(source.kind(), std::io::ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(found.take(), vec!["hit"]);
    }

    #[tokio::test]
    async fn trip_releases_scanner_blocked_on_open_pipe() {
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (cfg, _found, latch) = config(&["foo"], true);

        let task = spawn_scan(rd, None, cfg);

        wr.write_all(b"one\n").await.unwrap();
        tokio::task::yield_now().await;
        latch.trip(KillRequest {
            trigger: "foo".into(),
            stream: StreamKind::Stderr,
        });

        // The writer stays open, as a grandchild holding the pipe would.
        let lines = tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("scanner still blocked after trip")
            .unwrap()
            .unwrap();
        assert!(lines <= 1);
        drop(wr);
    }
}
