use std::io::{self, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use os_pipe::{PipeReader, PipeWriter};

pub const NOT_FOUND_MESSAGE: &str = "ERROR: Commandline executable not found.";
pub const LAUNCH_FAILURE_CODE: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// One line of merged stdout/stderr, without its terminator.
    Output(String),
    /// Always the last event of a run.
    Finished(i32),
}

/// Starts `args[0]` with the remaining tokens on a worker thread. No shell is
/// involved, so tokens reach the renderer exactly as built.
pub fn spawn(args: Vec<String>) -> Receiver<RunEvent> {
    let (event_tx, event_rx) = mpsc::channel::<RunEvent>();

    thread::spawn(move || {
        let code = run_to_completion(&args, &event_tx);
        tracing::info!(code, "render process finished");
        let _ = event_tx.send(RunEvent::Finished(code));
    });

    event_rx
}

/// Callback flavour of [`spawn`]. `on_done` runs exactly once, after every
/// `on_output` call, on a thread other than the caller's.
pub fn run_with_callbacks<F, G>(args: Vec<String>, mut on_output: F, on_done: G) -> thread::JoinHandle<()>
where
    F: FnMut(String) + Send + 'static,
    G: FnOnce(i32) + Send + 'static,
{
    let events = spawn(args);
    thread::spawn(move || {
        for event in events {
            match event {
                RunEvent::Output(line) => on_output(line),
                RunEvent::Finished(code) => {
                    on_done(code);
                    return;
                }
            }
        }
        on_done(LAUNCH_FAILURE_CODE);
    })
}

fn run_to_completion(args: &[String], event_tx: &Sender<RunEvent>) -> i32 {
    let Some((program, rest)) = args.split_first() else {
        tracing::warn!("no executable in render command");
        let _ = event_tx.send(RunEvent::Output(NOT_FOUND_MESSAGE.to_string()));
        return LAUNCH_FAILURE_CODE;
    };

    let (reader, out_writer, err_writer) = match merged_output_pipe() {
        Ok(ends) => ends,
        Err(err) => {
            tracing::warn!(error = %err, "failed to create output pipe");
            let _ = event_tx.send(RunEvent::Output(format!("ERROR: {err}")));
            return LAUNCH_FAILURE_CODE;
        }
    };

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(out_writer)
        .stderr(err_writer);

    let spawned = cmd.spawn();
    // Our copies of the write end must close, or the reader never sees EOF.
    drop(cmd);

    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            let message = if err.kind() == io::ErrorKind::NotFound {
                NOT_FOUND_MESSAGE.to_string()
            } else {
                format!("ERROR: {err}")
            };
            tracing::warn!(%program, error = %err, "failed to launch renderer");
            let _ = event_tx.send(RunEvent::Output(message));
            return LAUNCH_FAILURE_CODE;
        }
    };
    tracing::info!(%program, pid = child.id(), "render process started");

    forward_lines(reader, |line| {
        tracing::trace!(%line, "renderer output");
        let _ = event_tx.send(RunEvent::Output(line));
    });

    match child.wait() {
        Ok(status) => exit_code(status),
        Err(err) => {
            let _ = event_tx.send(RunEvent::Output(format!("ERROR: {err}")));
            LAUNCH_FAILURE_CODE
        }
    }
}

/// One pipe with two write ends, so stdout and stderr lines keep the order
/// the child wrote them in.
fn merged_output_pipe() -> io::Result<(PipeReader, PipeWriter, PipeWriter)> {
    let (reader, writer) = os_pipe::pipe()?;
    let err_writer = writer.try_clone()?;
    Ok((reader, writer, err_writer))
}

/// Real exit code, or `128 + signal` when the process was killed on Unix.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    LAUNCH_FAILURE_CODE
}

/// Splits `reader` into lines on `\n`, `\r\n` or a bare `\r` until EOF.
fn forward_lines<R: Read>(reader: R, mut emit: impl FnMut(String)) {
    let mut reader = BufReader::new(reader);
    let mut line_buf: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];
    let mut after_cr = false;

    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }

        match byte[0] {
            b'\n' => {
                // `\r\n` was already flushed at the `\r`.
                if !(after_cr && line_buf.is_empty()) {
                    emit(take_line(&mut line_buf));
                }
                after_cr = false;
            }
            b'\r' => {
                emit(take_line(&mut line_buf));
                after_cr = true;
            }
            other => {
                line_buf.push(other);
                after_cr = false;
            }
        }
    }

    if !line_buf.is_empty() {
        emit(take_line(&mut line_buf));
    }
}

fn take_line(line_buf: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(line_buf).into_owned();
    line_buf.clear();
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collect(args: &[&str]) -> Vec<RunEvent> {
        spawn(args.iter().map(|s| s.to_string()).collect())
            .into_iter()
            .collect()
    }

    fn output(line: &str) -> RunEvent {
        RunEvent::Output(line.to_string())
    }

    #[test]
    fn missing_executable_reports_not_found() {
        let events = collect(&["-render", "/s.c4d", "-oimage", "/out/frame_"]);
        assert_eq!(events, [output(NOT_FOUND_MESSAGE), RunEvent::Finished(1)]);
    }

    #[test]
    fn empty_command_reports_not_found() {
        let events = collect(&[]);
        assert_eq!(events, [output(NOT_FOUND_MESSAGE), RunEvent::Finished(1)]);
    }

    #[cfg(unix)]
    #[test]
    fn other_launch_failures_report_message() {
        let dir = tempfile::tempdir().unwrap();
        let events = collect(&[dir.path().to_str().unwrap()]);
        assert_eq!(events.len(), 2);
        match &events[0] {
            RunEvent::Output(line) => {
                assert!(line.starts_with("ERROR: "));
                assert_ne!(line, NOT_FOUND_MESSAGE);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events[1], RunEvent::Finished(1));
    }

    #[cfg(unix)]
    #[test]
    fn forwards_lines_in_order_then_exit_code() {
        let events = collect(&["sh", "-c", "echo one; echo; echo three; exit 3"]);
        assert_eq!(
            events,
            [output("one"), output(""), output("three"), RunEvent::Finished(3)]
        );
    }

    #[cfg(unix)]
    #[test]
    fn merges_stderr_into_output_in_write_order() {
        for _ in 0..20 {
            let events = collect(&[
                "sh",
                "-c",
                "echo 1; echo 2 1>&2; echo 3; echo 4 1>&2; echo 5",
            ]);
            assert_eq!(
                events,
                [
                    output("1"),
                    output("2"),
                    output("3"),
                    output("4"),
                    output("5"),
                    RunEvent::Finished(0)
                ]
            );
        }
    }

    #[test]
    fn line_splitting_handles_every_terminator() {
        let mut lines = Vec::new();
        forward_lines(&b"a\r\n\nb\rc"[..], |line| lines.push(line));
        assert_eq!(lines, ["a", "", "b", "c"]);
    }

    #[cfg(unix)]
    #[test]
    fn carriage_returns_split_lines() {
        let events = collect(&["sh", "-c", r"printf 'a\rb\r\nc\nd'"]);
        assert_eq!(
            events,
            [output("a"), output("b"), output("c"), output("d"), RunEvent::Finished(0)]
        );
    }

    #[cfg(unix)]
    #[test]
    fn signal_exit_is_not_success() {
        let events = collect(&["sh", "-c", "kill -9 $$"]);
        assert_eq!(events.last(), Some(&RunEvent::Finished(137)));
    }

    #[cfg(unix)]
    #[test]
    fn callbacks_complete_after_output() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let out_log = Arc::clone(&log);
        let done_log = Arc::clone(&log);

        run_with_callbacks(
            vec!["sh".into(), "-c".into(), "echo hi; exit 2".into()],
            move |line| out_log.lock().unwrap().push(line),
            move |code| done_log.lock().unwrap().push(format!("done {code}")),
        )
        .join()
        .unwrap();

        assert_eq!(*log.lock().unwrap(), ["hi", "done 2"]);
    }
}
