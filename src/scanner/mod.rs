use crate::model::ScanConfig;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Tags one acquire/release cycle of the device so late events from an earlier
/// cycle can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceSession(pub u64);

impl fmt::Display for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Acquired {
        session: DeviceSession,
    },
    AcquireFailed {
        session: DeviceSession,
        reason: String,
    },
    Decoded {
        session: DeviceSession,
        text: String,
    },
    /// The device went away on its own after a successful acquisition.
    Lost {
        session: DeviceSession,
        reason: String,
    },
    Released {
        session: DeviceSession,
        result: Result<(), String>,
    },
}

impl DeviceEvent {
    pub fn session(&self) -> DeviceSession {
        match self {
            Self::Acquired { session }
            | Self::AcquireFailed { session, .. }
            | Self::Decoded { session, .. }
            | Self::Lost { session, .. }
            | Self::Released { session, .. } => *session,
        }
    }
}

/// Camera-backed QR decoder. Both operations only issue a request; completion is
/// reported later as a [`DeviceEvent`] on the channel the device was built with.
///
/// `acquire` returns `Err` only when the request cannot even be issued. `release`
/// must accept sessions that were never fully acquired and must always be
/// followed by a `Released` event for that session.
pub trait ScannerDevice {
    fn acquire(&mut self, session: DeviceSession, target: &str, config: &ScanConfig)
    -> Result<()>;
    fn release(&mut self, session: DeviceSession);
    fn name(&self) -> &str;
}

/// Stand-in used when no decoder is configured. Every acquisition fails.
pub struct NullScanner {
    events: Sender<DeviceEvent>,
}

impl NullScanner {
    pub fn new(events: Sender<DeviceEvent>) -> Self {
        Self { events }
    }
}

impl ScannerDevice for NullScanner {
    fn acquire(
        &mut self,
        session: DeviceSession,
        _target: &str,
        _config: &ScanConfig,
    ) -> Result<()> {
        let _ = self.events.send(DeviceEvent::AcquireFailed {
            session,
            reason: String::from("no scanner command configured"),
        });
        Ok(())
    }

    fn release(&mut self, session: DeviceSession) {
        let _ = self.events.send(DeviceEvent::Released {
            session,
            result: Ok(()),
        });
    }

    fn name(&self) -> &str {
        "none"
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    child: Arc<Mutex<Option<Child>>>,
    thread: JoinHandle<()>,
}

/// Runs an external decoder process (zbarcam-style: one decoded payload per
/// stdout line) per device session.
///
/// Arguments may carry `{fps}`, `{width}`, `{height}` and `{target}` placeholders,
/// filled in from the [`ScanConfig`] at acquisition time.
pub struct CommandScanner {
    program: String,
    args: Vec<String>,
    events: Sender<DeviceEvent>,
    workers: HashMap<DeviceSession, Worker>,
}

impl CommandScanner {
    pub fn new(command: &[String], events: Sender<DeviceEvent>) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("scanner command is empty");
        };
        if program.trim().is_empty() {
            bail!("scanner program name is empty");
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            events,
            workers: HashMap::new(),
        })
    }

    fn expand_args(&self, target: &str, config: &ScanConfig) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{fps}", &config.fps.to_string())
                    .replace("{width}", &config.scan_box.width.to_string())
                    .replace("{height}", &config.scan_box.height.to_string())
                    .replace("{target}", target)
            })
            .collect()
    }

    /// Drops workers whose thread already ended, e.g. after a failed spawn or a
    /// decoder exit that was never released.
    fn reap_finished_workers(&mut self) {
        let finished: Vec<DeviceSession> = self
            .workers
            .iter()
            .filter(|(_, worker)| worker.thread.is_finished())
            .map(|(session, _)| *session)
            .collect();
        for session in finished {
            let Some(worker) = self.workers.remove(&session) else {
                continue;
            };
            if let Err(err) = stop_worker(&worker) {
                let error = format!("{err:#}");
                debug!(%session, %error, "reaping scanner worker failed");
            }
        }
    }
}

impl ScannerDevice for CommandScanner {
    fn acquire(
        &mut self,
        session: DeviceSession,
        target: &str,
        config: &ScanConfig,
    ) -> Result<()> {
        self.reap_finished_workers();
        let args = self.expand_args(target, config);
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let stop = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(Mutex::new(None));
        let events = self.events.clone();
        let worker_stop = Arc::clone(&stop);
        let worker_slot = Arc::clone(&slot);
        let program = self.program.clone();

        let thread = thread::Builder::new()
            .name(format!("scanner-{}", session.0))
            .spawn(move || run_decoder(session, command, program, worker_stop, worker_slot, events))
            .context("failed to spawn scanner worker thread")?;

        self.workers.insert(
            session,
            Worker {
                stop,
                child: slot,
                thread,
            },
        );
        Ok(())
    }

    fn release(&mut self, session: DeviceSession) {
        let result = match self.workers.remove(&session) {
            Some(worker) => stop_worker(&worker).map_err(|err| format!("{err:#}")),
            None => Ok(()),
        };
        let _ = self.events.send(DeviceEvent::Released { session, result });
    }

    fn name(&self) -> &str {
        &self.program
    }
}

impl Drop for CommandScanner {
    fn drop(&mut self) {
        for (_, worker) in self.workers.drain() {
            let _ = stop_worker(&worker);
        }
    }
}

fn stop_worker(worker: &Worker) -> Result<()> {
    worker.stop.store(true, Ordering::SeqCst);
    let mut guard = worker
        .child
        .lock()
        .map_err(|_| anyhow::anyhow!("scanner process slot poisoned"))?;
    let Some(mut child) = guard.take() else {
        // Not spawned yet; the worker sees the stop flag and kills it itself.
        return Ok(());
    };
    child.kill().context("failed to stop scanner process")?;
    child.wait().context("failed to reap scanner process")?;
    Ok(())
}

fn run_decoder(
    session: DeviceSession,
    mut command: Command,
    program: String,
    stop: Arc<AtomicBool>,
    slot: Arc<Mutex<Option<Child>>>,
    events: Sender<DeviceEvent>,
) {
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            let _ = events.send(DeviceEvent::AcquireFailed {
                session,
                reason: format!("failed to start {program}: {err}"),
            });
            return;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        let _ = events.send(DeviceEvent::AcquireFailed {
            session,
            reason: format!("{program} has no output stream"),
        });
        return;
    };

    {
        let Ok(mut guard) = slot.lock() else {
            let _ = child.kill();
            let _ = child.wait();
            return;
        };
        if stop.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            return;
        }
        *guard = Some(child);
    }

    let _ = events.send(DeviceEvent::Acquired { session });

    // Payloads are arbitrary bytes; a line that is not UTF-8 is still a decode and
    // must not end the session.
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let text = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        if text.is_empty() {
            continue;
        }
        if events.send(DeviceEvent::Decoded { session, text }).is_err() {
            return;
        }
    }

    if !stop.load(Ordering::SeqCst) {
        let _ = events.send(DeviceEvent::Lost {
            session,
            reason: format!("{program} exited"),
        });
    }
}
