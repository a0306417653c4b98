//! Interactive emulator session.
//!
//! A session is four threads: the caller, a worker that owns the child's
//! stdin/stdout, a watcher that waits for the child to exit, and a drain that
//! collects stderr. The caller only enqueues commands; everything the worker
//! learns comes back as [`SessionEvent`]s.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::controller::{scrape_startup_error, WorkerController};
use crate::emu_error::EmuError;
use crate::error::{WorkerError, WorkerResult};
use crate::protocol::{build_command, ChatterType, Response};
use crate::status::StatusUpdate;

/// Queue entry consumed by the worker thread.
#[derive(Debug, Clone, PartialEq)]
enum Message {
    Command(String),
    Terminated(EmuError),
}

/// Something the worker thread reports back.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StatusUpdate(StatusUpdate),
    Chatter { kind: ChatterType, text: String },
    /// A command got its terminal response.
    Responded { command: String, response: Response },
    /// A command never got a response because the emulator went away.
    CommandDropped { command: String },
    /// The session is over. Always the last event.
    Completed {
        success: bool,
        error_message: Option<String>,
    },
}

/// How long to wait for stderr to close before taking what has arrived.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// How often the watcher polls the child for exit.
const WATCH_INTERVAL: Duration = Duration::from_millis(50);

type KillFn = Box<dyn FnOnce() + Send>;

/// Collects the child's stderr on its own thread.
struct StderrBuffer {
    text: Arc<Mutex<String>>,
    drain: Option<(JoinHandle<()>, Receiver<()>)>,
}

impl StderrBuffer {
    fn spawn(stderr: Option<Box<dyn Read + Send>>) -> Self {
        let text = Arc::new(Mutex::new(String::new()));
        let drain = stderr.map(|stderr| {
            let text = text.clone();
            let (closed_tx, closed_rx) = crossbeam_channel::bounded::<()>(0);
            let handle = std::thread::spawn(move || {
                let _closed = closed_tx;
                let mut reader = BufReader::new(stderr);
                let mut line = Vec::new();
                loop {
                    line.clear();
                    match reader.read_until(b'\n', &mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => text.lock().push_str(&String::from_utf8_lossy(&line)),
                    }
                }
            });
            (handle, closed_rx)
        });
        Self { text, drain }
    }

    /// Wait up to `grace` for stderr to close, then return what it carried.
    ///
    /// A stream that stays open past the deadline is left to its drain thread.
    fn finish(&mut self, grace: Duration) -> String {
        if let Some((handle, closed)) = self.drain.take() {
            match closed.recv_timeout(grace) {
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!("stderr still open, using partial output");
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    handle.join().ok();
                }
            }
        }
        self.text.lock().clone()
    }
}

struct Worker<R, W> {
    controller: WorkerController<R, W>,
    queue: Receiver<Message>,
    open: Arc<Mutex<bool>>,
    events: Sender<SessionEvent>,
    stderr: StderrBuffer,
    last_error: Option<String>,
    kill: Option<KillFn>,
}

impl<R: BufRead, W: Write> Worker<R, W> {
    fn run(mut self) {
        let (success, error_message) = self.session();

        // Nothing can enqueue once the gate is shut, so the drain is complete.
        *self.open.lock() = false;
        for message in self.queue.try_iter() {
            if let Message::Command(command) = message {
                self.events.send(SessionEvent::CommandDropped { command }).ok();
            }
        }

        tracing::info!(success, error = ?error_message, "session completed");
        self.events
            .send(SessionEvent::Completed { success, error_message })
            .ok();
    }

    fn session(&mut self) -> (bool, Option<String>) {
        match self.receive() {
            Ok(response) if response.is_ok() => {}
            Ok(response) => {
                self.kill_child();
                if !response.text.is_empty() {
                    return (false, Some(response.text));
                }
                return (false, Some(scrape_startup_error(&self.stderr.finish(STDERR_GRACE))));
            }
            Err(err) => {
                tracing::warn!(%err, "emulator failed to start");
                self.kill_child();
                return (false, Some(scrape_startup_error(&self.stderr.finish(STDERR_GRACE))));
            }
        }

        let status = loop {
            match self.queue.recv() {
                Ok(Message::Command(command)) => self.execute(command),
                Ok(Message::Terminated(status)) => break status,
                // every sender is gone, including the watcher
                Err(_) => break EmuError::Killed,
            }
        };

        if status.is_success() {
            return (true, None);
        }

        let message = self
            .last_error
            .take()
            .or_else(|| {
                let stderr = self.stderr.finish(STDERR_GRACE);
                let stderr = stderr.trim();
                (!stderr.is_empty()).then(|| stderr.to_owned())
            })
            .unwrap_or_else(|| format!("Error {} running emulator", status.code()));
        (false, Some(message))
    }

    fn kill_child(&mut self) {
        if let Some(kill) = self.kill.take() {
            kill();
        }
    }

    fn receive(&mut self) -> WorkerResult<Response> {
        let events = &self.events;
        let response = self.controller.receive_response(|update| {
            events.send(SessionEvent::StatusUpdate(update)).ok();
        })?;

        if let Some(update) = response.update.clone() {
            self.events.send(SessionEvent::StatusUpdate(update)).ok();
        }
        if !response.is_ok() {
            self.last_error = Some(response.text.clone());
        }
        Ok(response)
    }

    fn execute(&mut self, command: String) {
        let result = self
            .controller
            .issue_command(&command)
            .and_then(|()| self.receive());

        match result {
            Ok(response) => {
                self.events
                    .send(SessionEvent::Responded { command, response })
                    .ok();
            }
            Err(err) => {
                tracing::warn!(%err, command = command.trim_end(), "command dropped");
                self.events.send(SessionEvent::CommandDropped { command }).ok();
            }
        }
    }
}

/// Poll the child until it exits. The lock is released between polls so a
/// failed startup can kill it.
fn watch(child: &Mutex<Child>) -> EmuError {
    loop {
        match child.lock().try_wait() {
            Ok(Some(status)) => return EmuError::from_status(status),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "failed waiting for emulator");
                return EmuError::Invalid;
            }
        }
        std::thread::sleep(WATCH_INTERVAL);
    }
}

/// Handle held by the controlling thread.
pub struct Session {
    queue: Sender<Message>,
    open: Arc<Mutex<bool>>,
    chatter: Arc<AtomicBool>,
    done: Receiver<()>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Start the emulator and the threads that serve it.
    pub fn launch<S: AsRef<OsStr>>(
        program: impl AsRef<OsStr>,
        args: &[S],
        events: Sender<SessionEvent>,
    ) -> WorkerResult<Self> {
        let program = program.as_ref();
        tracing::info!(program = %program.to_string_lossy(), "launching emulator");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;

        let not_captured = || WorkerError::SpawnFailed(std::io::Error::other("stdio not captured"));
        let stdin = child.stdin.take().ok_or_else(not_captured)?;
        let stdout = child.stdout.take().ok_or_else(not_captured)?;
        let stderr = child.stderr.take().ok_or_else(not_captured)?;

        let child = Arc::new(Mutex::new(child));
        let kill: KillFn = {
            let child = child.clone();
            Box::new(move || {
                if let Err(err) = child.lock().kill() {
                    tracing::debug!(%err, "kill after failed startup");
                }
            })
        };

        let session = Self::spawn_worker(
            BufReader::new(stdout),
            stdin,
            Some(Box::new(stderr)),
            Some(kill),
            events,
        );

        let queue = session.queue.clone();
        std::thread::spawn(move || {
            let status = watch(&child);
            tracing::debug!(%status, code = status.code(), "emulator exited");
            queue.send(Message::Terminated(status)).ok();
        });

        Ok(session)
    }

    /// Serve an already-connected emulator. The caller is responsible for
    /// eventually delivering termination.
    fn spawn_worker<R, W>(
        reader: R,
        writer: W,
        stderr: Option<Box<dyn Read + Send>>,
        kill: Option<KillFn>,
        events: Sender<SessionEvent>,
    ) -> Self
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let open = Arc::new(Mutex::new(true));
        let chatter = Arc::new(AtomicBool::new(false));

        let mut controller = WorkerController::new(reader, writer);
        {
            let enabled = chatter.clone();
            let events = events.clone();
            controller.set_chatter(Some(Box::new(move |kind, text| {
                if enabled.load(Ordering::Relaxed) {
                    events
                        .send(SessionEvent::Chatter { kind, text: text.to_owned() })
                        .ok();
                }
            })));
        }

        let worker = Worker {
            controller,
            queue: queue_rx,
            open: open.clone(),
            events,
            stderr: StderrBuffer::spawn(stderr),
            last_error: None,
            kill,
        };
        let handle = std::thread::spawn(move || {
            worker.run();
            drop(done_tx);
        });

        Self {
            queue: queue_tx,
            open,
            chatter,
            done: done_rx,
            worker: Some(handle),
        }
    }

    fn post(&self, command: String) -> WorkerResult<()> {
        let open = self.open.lock();
        if !*open {
            return Err(WorkerError::SessionClosed);
        }
        tracing::trace!(command = command.trim_end(), "posting command");
        self.queue
            .send(Message::Command(command))
            .map_err(|_| WorkerError::SessionClosed)
    }

    /// Queue a command built from arguments.
    pub fn issue<S: AsRef<str>>(&self, args: &[S]) -> WorkerResult<()> {
        self.post(build_command(args))
    }

    /// Queue a raw command line.
    pub fn issue_full_command_line(&self, line: &str) -> WorkerResult<()> {
        self.post(format!("{line}\r\n"))
    }

    /// Ask the emulator to exit.
    pub fn abort(&self) -> WorkerResult<()> {
        self.issue(&["exit"])
    }

    pub fn set_chatter_enabled(&self, enabled: bool) {
        self.chatter.store(enabled, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        !*self.open.lock()
    }

    /// Wait for the worker thread to report completion.
    pub fn wait_timeout(&mut self, timeout: Duration) -> WorkerResult<()> {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(worker) = self.worker.take() {
                    worker.join().ok();
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(WorkerError::Timeout(timeout)),
        }
    }

    /// Ask the emulator to exit and wait for the session to finish.
    pub fn abort_and_wait(&mut self, timeout: Duration) -> WorkerResult<()> {
        match self.abort() {
            Ok(()) | Err(WorkerError::SessionClosed) => {}
            Err(err) => return Err(err),
        }
        self.wait_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const WAIT: Duration = Duration::from_secs(10);

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn start(script: &str, stderr: Option<&str>) -> (Session, Receiver<SessionEvent>, SharedBuf) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let written = SharedBuf::default();
        let stderr = stderr.map(|s| Box::new(Cursor::new(s.as_bytes().to_vec())) as Box<dyn Read + Send>);
        let session = Session::spawn_worker(
            Cursor::new(script.as_bytes().to_vec()),
            written.clone(),
            stderr,
            None,
            tx,
        );
        (session, rx, written)
    }

    fn completed(events: &[SessionEvent]) -> (bool, Option<String>) {
        match events.last() {
            Some(SessionEvent::Completed { success, error_message }) => (*success, error_message.clone()),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_session_runs_commands() {
        let script = "@OK\r\n@STATUS <status paused=\"1\"/>\r\n@OK\r\n@ERROR no such tag\r\n";
        let (mut session, rx, written) = start(script, None);

        session.issue(&["pause"]).unwrap();
        session.issue(&["load", "cart", "My Game.bin"]).unwrap();
        session.queue.send(Message::Terminated(EmuError::None)).unwrap();
        session.wait_timeout(WAIT).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(&events[0], SessionEvent::StatusUpdate(u) if u.paused == Some(true)));
        assert!(matches!(&events[1], SessionEvent::Responded { command, response } if command == "pause\r\n" && response.is_ok()));
        assert!(matches!(&events[2], SessionEvent::Responded { response, .. } if response.text == "no such tag"));
        assert_eq!(completed(&events), (true, None));
        assert_eq!(
            String::from_utf8(written.0.lock().clone()).unwrap(),
            "pause\r\nload cart \"My Game.bin\"\r\n"
        );
        assert!(matches!(session.abort(), Err(WorkerError::SessionClosed)));
    }

    #[test]
    fn test_startup_error_text() {
        let (mut session, rx, _) = start("@ERROR required files are missing\r\n", Some("ignored\n"));
        session.wait_timeout(WAIT).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(completed(&events), (false, Some("required files are missing".to_owned())));
        assert!(session.is_closed());
    }

    /// Stderr that yields one line and then stays open until released.
    struct StalledStderr {
        first: Option<&'static [u8]>,
        release: Receiver<()>,
    }

    impl Read for StalledStderr {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if let Some(first) = self.first.take() {
                buf[..first.len()].copy_from_slice(first);
                return Ok(first.len());
            }
            self.release.recv().ok();
            Ok(0)
        }
    }

    #[test]
    fn test_startup_failure_with_open_stderr() {
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();
        let stderr = StalledStderr { first: Some(&b"missing bios\n"[..]), release: release_rx };
        let killed = Arc::new(AtomicBool::new(false));
        let kill: KillFn = {
            let killed = killed.clone();
            Box::new(move || killed.store(true, Ordering::SeqCst))
        };

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut session = Session::spawn_worker(
            Cursor::new(b"@ERROR\r\n".to_vec()),
            SharedBuf::default(),
            Some(Box::new(stderr)),
            Some(kill),
            tx,
        );
        session.wait_timeout(WAIT).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(completed(&events), (false, Some("missing bios".to_owned())));
        assert!(killed.load(Ordering::SeqCst));
        assert!(session.is_closed());
        drop(release_tx);
    }

    #[test]
    fn test_startup_eof_scrapes_stderr() {
        let (mut session, rx, _) = start("", Some("zork.rom NOT FOUND\r\n"));
        session.wait_timeout(WAIT).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(completed(&events), (false, Some("zork.rom NOT FOUND".to_owned())));
    }

    #[test]
    fn test_runtime_error_message() {
        let (mut session, rx, _) = start("@OK\r\n@ERROR bad tag\r\n", Some("fatal: bus error\n"));
        session.issue(&["load", "x", "y"]).unwrap();
        session.queue.send(Message::Terminated(EmuError::FatalError)).unwrap();
        session.wait_timeout(WAIT).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(completed(&events), (false, Some("bad tag".to_owned())));

        let (mut session, rx, _) = start("@OK\r\n", Some("fatal: bus error\n"));
        session.queue.send(Message::Terminated(EmuError::FatalError)).unwrap();
        session.wait_timeout(WAIT).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(completed(&events), (false, Some("fatal: bus error".to_owned())));

        let (mut session, rx, _) = start("@OK\r\n", None);
        session.queue.send(Message::Terminated(EmuError::MissingFiles)).unwrap();
        session.wait_timeout(WAIT).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(completed(&events), (false, Some("Error 2 running emulator".to_owned())));
    }

    #[test]
    fn test_commands_after_exit_are_reported() {
        let (mut session, rx, _) = start("@OK\r\n@OK\r\n", None);
        for i in 0..5 {
            session.issue(&["frame", &i.to_string()]).unwrap();
        }
        session.queue.send(Message::Terminated(EmuError::None)).unwrap();

        let mut rejected = 0;
        for _ in 0..5 {
            match session.issue(&["late"]) {
                Ok(()) => {}
                Err(WorkerError::SessionClosed) => rejected += 1,
                Err(err) => panic!("unexpected {err}"),
            }
        }
        session.wait_timeout(WAIT).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        let responded = events.iter().filter(|e| matches!(e, SessionEvent::Responded { .. })).count();
        let dropped = events.iter().filter(|e| matches!(e, SessionEvent::CommandDropped { .. })).count();
        assert_eq!(responded, 1);
        assert_eq!(responded + dropped + rejected, 10);
        assert_eq!(completed(&events), (true, None));
    }

    #[test]
    fn test_chatter_toggle() {
        let (mut session, rx, _) = start("@OK\r\n@OK\r\n@OK\r\n", None);
        session.issue(&["quiet"]).unwrap();
        session.set_chatter_enabled(true);
        session.issue_full_command_line("loud 1").unwrap();
        session.queue.send(Message::Terminated(EmuError::None)).unwrap();
        session.wait_timeout(WAIT).unwrap();

        let chatter: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                SessionEvent::Chatter { kind, text } => Some((kind, text)),
                _ => None,
            })
            .collect();
        // the flag is read by the worker, so the first command may or may not be seen
        assert!(chatter.contains(&(ChatterType::Command, "loud 1".to_owned())));
        assert!(!chatter.iter().any(|(_, text)| text.ends_with('\n')));
    }
}
