//! Synchronous request/response engine over the emulator's text streams.

use std::io::{BufRead, Write};

use crate::error::{WorkerError, WorkerResult};
use crate::protocol::{classify, ChatterType, Line, Response, ResponseKind};
use crate::status::StatusUpdate;

/// Callback receiving every command and terminal response.
pub type ChatterFn = Box<dyn FnMut(ChatterType, &str) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AwaitingResponse,
}

/// Drives one command at a time over a reader/writer pair.
///
/// The emulator sends a response as soon as it has started, so a fresh
/// controller is already awaiting one.
pub struct WorkerController<R, W> {
    reader: R,
    writer: W,
    state: State,
    chatter: Option<ChatterFn>,
    line: String,
}

impl<R: BufRead, W: Write> WorkerController<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            state: State::AwaitingResponse,
            chatter: None,
            line: String::new(),
        }
    }

    /// Install or clear the chatter callback.
    pub fn set_chatter(&mut self, chatter: Option<ChatterFn>) {
        self.chatter = chatter;
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state == State::AwaitingResponse
    }

    fn chatter(&mut self, kind: ChatterType, text: &str) {
        if let Some(chatter) = self.chatter.as_mut() {
            chatter(kind, text.trim_end_matches(['\r', '\n']));
        }
    }

    /// Write a command line. A missing `\r\n` terminator is added.
    pub fn issue_command(&mut self, command: &str) -> WorkerResult<()> {
        if self.state == State::AwaitingResponse {
            return Err(WorkerError::CommandInFlight);
        }

        self.chatter(ChatterType::Command, command);
        tracing::debug!(command = command.trim_end(), "issuing command");

        let result = (|| {
            self.writer.write_all(command.as_bytes())?;
            if !command.ends_with("\r\n") {
                self.writer.write_all(b"\r\n")?;
            }
            self.writer.flush()
        })();
        result.map_err(WorkerError::WriteFailed)?;

        self.state = State::AwaitingResponse;
        Ok(())
    }

    /// Block until a terminal response arrives, passing status pushes to
    /// `on_push` in the order they were received.
    pub fn receive_response(
        &mut self,
        mut on_push: impl FnMut(StatusUpdate),
    ) -> WorkerResult<Response> {
        let result = self.read_until_response(&mut on_push);
        self.state = State::Idle;
        let response = result?;

        let kind = match response.kind {
            ResponseKind::Ok => ChatterType::GoodResponse,
            ResponseKind::Error => ChatterType::ErrorResponse,
        };
        let text = response.text.clone();
        self.chatter(kind, &text);
        Ok(response)
    }

    fn read_until_response(
        &mut self,
        on_push: &mut impl FnMut(StatusUpdate),
    ) -> WorkerResult<Response> {
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .map_err(WorkerError::ReadFailed)?;
            if n == 0 {
                return Err(WorkerError::ProcessExited);
            }

            let line = self.line.trim_end_matches(['\r', '\n']);
            match classify(line) {
                Line::Response(response) => return Ok(response),
                Line::Push(update) => on_push(update),
                Line::Unrecognized(text) => {
                    tracing::warn!(line = %text, "skipping unrecognized worker line");
                }
                Line::Noise => tracing::trace!(line, "emulator output"),
            }
        }
    }

    /// Issue a command and wait for its response.
    pub fn execute(
        &mut self,
        command: &str,
        on_push: impl FnMut(StatusUpdate),
    ) -> WorkerResult<Response> {
        self.issue_command(command)?;
        self.receive_response(on_push)
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// Best-effort message from the stderr of an emulator that failed to start.
pub fn scrape_startup_error(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        "Error starting emulator".to_owned()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use super::*;

    fn controller(script: &str) -> WorkerController<Cursor<Vec<u8>>, Vec<u8>> {
        WorkerController::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_inaugural_response() {
        let mut c = controller("Loading...\r\n@OK STATUS <status paused=\"0\"/>\r\n");
        assert!(c.is_awaiting_response());
        assert!(matches!(c.issue_command("pause"), Err(WorkerError::CommandInFlight)));

        let response = c.receive_response(|_| panic!("no pushes expected")).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.update.unwrap().paused, Some(false));
        assert!(!c.is_awaiting_response());
    }

    #[test]
    fn test_pushes_arrive_before_response() {
        let script = concat!(
            "@OK\r\n",
            "@STATUS <status speed_text=\"10%\"/>\r\n",
            "noise\r\n",
            "@BOGUS\r\n",
            "@STATUS <status speed_text=\"20%\"/>\r\n",
            "@OK STATUS <status paused=\"1\"/>\r\n",
        );
        let mut c = controller(script);
        c.receive_response(|_| {}).unwrap();

        let mut pushes = Vec::new();
        let response = c
            .execute("pause", |u| pushes.push(u.speed_text.unwrap_or_default()))
            .unwrap();
        assert_eq!(pushes, ["10%", "20%"]);
        assert_eq!(response.update.unwrap().paused, Some(true));

        let (_, written) = c.into_inner();
        assert_eq!(written, b"pause\r\n");
    }

    #[test]
    fn test_error_response_and_eof() {
        let mut c = controller("@OK\n@ERROR bad tag\n");
        c.receive_response(|_| {}).unwrap();

        let response = c.execute("load nope x\r\n", |_| {}).unwrap();
        assert_eq!(response.kind, ResponseKind::Error);
        assert_eq!(response.text, "bad tag");

        let err = c.execute("pause", |_| {}).unwrap_err();
        assert!(err.is_process_exited());
        assert!(!c.is_awaiting_response());
    }

    #[test]
    fn test_chatter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();

        let mut c = controller("@OK\r\n@ERROR nope\r\n");
        c.set_chatter(Some(Box::new(move |kind, text| {
            sink.lock().unwrap().push((kind, text.to_owned()));
        })));
        c.receive_response(|_| {}).unwrap();
        c.execute("throttled 0\r\n", |_| {}).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            [
                (ChatterType::GoodResponse, String::new()),
                (ChatterType::Command, "throttled 0".to_owned()),
                (ChatterType::ErrorResponse, "nope".to_owned()),
            ]
        );
    }

    #[test]
    fn test_scrape_startup_error() {
        assert_eq!(
            scrape_startup_error("\nrequired files are missing\r\n  \nzork.rom NOT FOUND\n"),
            "required files are missing\nzork.rom NOT FOUND"
        );
        assert_eq!(scrape_startup_error("  \n"), "Error starting emulator");
    }
}
