//! Streams data through an external encoder/decoder program (§4.7).
//! Grounded on the teacher's `backend/filter.rs` (`BackendFilter`'s
//! `filter`/`unfilter` shell-command fields, stubbed with
//! `todo!("Run unfilter in a shell and pipe the raw backend through
//! it.")`) for the design intent, and on `concurrently.rs`'s worker-task/
//! join-point coordination shape, translated from `tokio::task::JoinSet`
//! to `std::thread::scope` to match the teacher's newer, non-async files.
//!
//! Ordering and close-discipline rules from §4.7 are load-bearing, not
//! stylistic:
//! - stdin, stdout, and stderr are all drained; none is left unread.
//! - the stdin copier owns (and therefore closes) the write end when it
//!   finishes; the stdout/stderr consumers own the read ends.
//! - a wrapper that reads the child's stdout (e.g. a gzip decoder) must be
//!   constructed only once the process has actually started, which falls
//!   out naturally here because `Command::spawn` has already returned by
//!   the time callers get a `&mut dyn Read` over stdout.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{HoardError, SubprocessError};
use crate::progress::{CountingReader, CountingWriter};

#[derive(Debug, Clone)]
pub struct PipeStats {
    pub success: bool,
    pub elapsed_ms: u128,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub exit: Option<i32>,
    pub stderr: String,
}

/// Runs `argv`, feeding `input` to its stdin and handing its stdout to
/// `consume` to read from directly. `consume` runs on the calling thread
/// while separate scoped threads drive stdin and stderr, matching §5's
/// "one source-copier, one sink-copier, one supervisor" model (the
/// supervisor role -- waiting on the child with a timeout -- is also
/// played by the calling thread, since it isn't otherwise busy once
/// `consume` returns).
pub fn run_with_stdout<T>(
    argv: &[String],
    input: &[u8],
    timeout: Duration,
    consume: impl FnOnce(&mut dyn Read) -> io::Result<T>,
) -> Result<(T, PipeStats), HoardError> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        HoardError::InvalidIndex("encode/decode command is empty".to_string())
    })?;

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            HoardError::SubprocessError(SubprocessError {
                command: argv.join(" "),
                exit: None,
                timed_out: false,
                stderr: e.to_string(),
            })
        })?;

    let mut stdin = child.stdin.take().expect("stdin was piped");
    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut stderr = child.stderr.take().expect("stderr was piped");

    let input_count = AtomicU64::new(0);
    let output_count = AtomicU64::new(0);

    let (consume_result, stderr_text, timed_out, exit) = thread::scope(|scope| {
        let stdin_handle = scope.spawn(|| -> io::Result<()> {
            // Owns `stdin`; it closes (the write end) when this closure
            // returns, whether or not the write succeeded.
            let mut counting = CountingWriter::new(&mut stdin, &input_count);
            let result = counting.write_all(input).and_then(|_| counting.flush());
            drop(stdin);
            result
        });

        let stderr_handle = scope.spawn(|| {
            let mut s = String::new();
            let _ = stderr.read_to_string(&mut s);
            s
        });

        let mut counting_stdout = CountingReader::new(&mut stdout, &output_count);
        let consume_result = consume(&mut counting_stdout);

        let deadline = start + timeout;
        let mut timed_out = false;
        let mut exit_code = None;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    exit_code = status.code();
                    break;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        timed_out = true;
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                Err(_) => break,
            }
        }

        // The copiers should unblock once the pipes are closed (by us
        // dropping our ends, or by a kill on timeout); join them so we
        // never leave a dangling thread.
        let _ = stdin_handle.join();
        let stderr_text = stderr_handle.join().unwrap_or_default();

        (consume_result, stderr_text, timed_out, exit_code)
    });

    let output = consume_result.map_err(|_e| {
        HoardError::SubprocessError(SubprocessError {
            command: argv.join(" "),
            exit,
            timed_out,
            stderr: stderr_text.clone(),
        })
    })?;

    let success = !timed_out && exit == Some(0);
    let stats = PipeStats {
        success,
        elapsed_ms: start.elapsed().as_millis(),
        input_bytes: input_count.load(Ordering::Relaxed),
        output_bytes: output_count.load(Ordering::Relaxed),
        exit,
        stderr: stderr_text,
    };

    if !success {
        return Err(HoardError::SubprocessError(SubprocessError {
            command: argv.join(" "),
            exit,
            timed_out,
            stderr: stats.stderr,
        }));
    }

    Ok((output, stats))
}

/// Runs `argv`, feeding `input` to its stdin and returning its stdout as a
/// buffer. A thin convenience over [`run_with_stdout`] for callers that
/// don't need to wrap the stdout pipe in anything before reading it.
pub fn run(argv: &[String], input: &[u8], timeout: Duration) -> Result<(Vec<u8>, PipeStats), HoardError> {
    run_with_stdout(argv, input, timeout, |r| {
        let mut buf = Vec::new();
        r.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cat_echoes_input() {
        let argv = vec!["cat".to_string()];
        let (out, stats) = run(&argv, b"hello\n", Duration::from_secs(5)).unwrap();
        assert_eq!(out, b"hello\n");
        assert!(stats.success);
        assert_eq!(stats.input_bytes, 6);
        assert_eq!(stats.output_bytes, 6);
        assert_eq!(stats.exit, Some(0));
    }

    #[test]
    fn nonzero_exit_is_subprocess_error() {
        let argv = vec!["false".to_string()];
        let res = run(&argv, b"", Duration::from_secs(5));
        match res {
            Err(HoardError::SubprocessError(e)) => assert_eq!(e.exit, Some(1)),
            other => panic!("expected SubprocessError, got {other:?}"),
        }
    }

    #[test]
    fn timeout_kills_the_process() {
        let argv = vec!["sleep".to_string(), "5".to_string()];
        let res = run(&argv, b"", Duration::from_millis(100));
        match res {
            Err(HoardError::SubprocessError(e)) => assert!(e.timed_out),
            other => panic!("expected a timeout SubprocessError, got {other:?}"),
        }
    }
}
