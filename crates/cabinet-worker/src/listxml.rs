//! Building the info database from `-listxml`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use cabinet_infodb::{InfoDbBuilder, Progress};

use crate::error::{WorkerError, WorkerResult};

/// How a `-listxml` run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ListXmlStatus {
    Success,
    Aborted,
    Error(String),
}

/// Events posted while the database is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListXmlEvent {
    Progress {
        machine_count: usize,
        name: String,
        description: String,
    },
    /// Always the last event.
    Result { status: ListXmlStatus },
}

/// Runs `emulator -listxml` and writes the resulting database.
#[derive(Debug)]
pub struct ListXmlTask {
    output_path: PathBuf,
    abort: Arc<AtomicBool>,
}

impl ListXmlTask {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn arguments() -> &'static [&'static str] {
        &["-listxml"]
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Flag that stops the build when set, usable from any thread.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn has_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Build from `input`, posting progress and then the result.
    pub fn process<R: BufRead>(&self, input: R, events: &Sender<ListXmlEvent>) -> ListXmlStatus {
        let status = match self.build(input, events) {
            Ok(()) => ListXmlStatus::Success,
            Err(status) => status,
        };
        tracing::info!(?status, path = %self.output_path.display(), "listxml finished");
        events
            .send(ListXmlEvent::Result { status: status.clone() })
            .ok();
        status
    }

    fn build<R: BufRead>(&self, input: R, events: &Sender<ListXmlEvent>) -> Result<(), ListXmlStatus> {
        let mut builder = InfoDbBuilder::new();
        let mut progress = |p: &Progress<'_>| {
            events
                .send(ListXmlEvent::Progress {
                    machine_count: p.machine_count,
                    name: p.name.to_owned(),
                    description: p.description.to_owned(),
                })
                .ok();
        };
        let result = builder.process_xml(input, Some(&mut progress), Some(self.abort.as_ref()));

        // A parse error is expected after an abort, so check the flag first.
        if self.has_aborted() {
            return Err(ListXmlStatus::Aborted);
        }
        if let Err(err) = result {
            return Err(ListXmlStatus::Error(format!(
                "Error parsing XML from emulator -listxml: {err}"
            )));
        }
        if builder.counts().machines == 0 {
            return Err(ListXmlStatus::Error(
                "Error parsing XML from emulator -listxml: no machines".to_owned(),
            ));
        }

        self.write(&builder).map_err(|err| {
            ListXmlStatus::Error(format!(
                "Could not write file: {}: {err}",
                self.output_path.display()
            ))
        })
    }

    /// Sibling path the database is written to before it replaces the target.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.output_path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Emit to the staging path and rename it over the target, so a failed
    /// write never leaves a partial database behind.
    fn write(&self, builder: &InfoDbBuilder) -> WorkerResult<()> {
        if let Some(dir) = self.output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let staging = self.staging_path();
        let result = write_staged(builder, &staging)
            .and_then(|()| std::fs::rename(&staging, &self.output_path).map_err(WorkerError::from));
        if result.is_err() {
            std::fs::remove_file(&staging).ok();
        }
        result
    }

    /// Run the emulator on a background thread.
    pub fn spawn(
        self,
        program: impl AsRef<std::ffi::OsStr>,
        events: Sender<ListXmlEvent>,
    ) -> WorkerResult<JoinHandle<ListXmlStatus>> {
        let mut child = Command::new(program)
            .args(Self::arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::SpawnFailed(std::io::Error::other("stdout not captured")))?;

        Ok(std::thread::spawn(move || {
            let status = self.process(BufReader::with_capacity(1 << 16, stdout), &events);
            if status == ListXmlStatus::Aborted {
                child.kill().ok();
            }
            match child.wait() {
                Ok(exit) if !exit.success() => tracing::debug!(%exit, "emulator exited with failure"),
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "failed waiting for emulator"),
            }
            status
        }))
    }
}

fn write_staged(builder: &InfoDbBuilder, path: &Path) -> WorkerResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    builder.emit_info(&mut writer)?;
    writer.flush()?;
    Ok(())
}
