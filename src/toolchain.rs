//! External collaborators: the compiler, the process launcher and the
//! filesystem presence check.
//!
//! The sweep logic only talks to the traits below. The `Command*` types
//! implement them by spawning real processes from a [`CommandTemplate`];
//! tests substitute in-memory fakes.

use crate::config::{CommandTemplate, Placeholders, RenderedCommand};
use crate::error::{Result, SweepError};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of one compile invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    Built,
    Failed { code: Option<i32>, diagnostic: String },
}

/// How a launched program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Exited(i32),
    /// Terminated by a signal, no exit code available.
    Signaled,
    /// Killed after exceeding the configured timeout.
    TimedOut,
}

impl ExitState {
    pub fn success(&self) -> bool {
        matches!(self, ExitState::Exited(0))
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitState::Exited(code),
            None => ExitState::Signaled,
        }
    }
}

/// Captured result of one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub exit: ExitState,
    pub stdout: String,
    pub stderr: String,
}

pub trait Compiler {
    /// Compiles `source` into an executable at `artifact`. Must be safe to
    /// call again on an unchanged source.
    fn compile(&self, source: &Path, name: &str, artifact: &Path) -> Result<BuildStatus>;
}

pub trait Launcher {
    /// Runs `artifact` with `problem_size` as its only program argument and
    /// `processes` as the launch parallelism. Blocks until the run ends.
    fn run(&self, artifact: &Path, problem_size: u64, processes: u32) -> Result<RunOutput>;
}

pub trait Presence {
    fn exists(&self, path: &Path) -> bool;
}

/// Presence check against the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Presence for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

fn command_for(rendered: &RenderedCommand) -> Command {
    let mut cmd = Command::new(&rendered.program);
    cmd.args(&rendered.args);
    for (key, value) in &rendered.env {
        cmd.env(key, value);
    }
    cmd
}

/// Compiler driven by a command template such as `mpicc {source} -o {artifact}`.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    template: CommandTemplate,
}

impl CommandCompiler {
    pub fn new(template: CommandTemplate) -> Self {
        CommandCompiler { template }
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, source: &Path, name: &str, artifact: &Path) -> Result<BuildStatus> {
        let rendered = self.template.render(&Placeholders {
            source: Some(source),
            name: Some(name),
            artifact: Some(artifact),
            ..Default::default()
        });
        tracing::debug!(program = %rendered.program, args = ?rendered.args, "compiling");

        let output = command_for(&rendered)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SweepError::spawn(&rendered.program, e))?;

        if output.status.success() {
            return Ok(BuildStatus::Built);
        }

        let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if diagnostic.is_empty() {
            diagnostic = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        Ok(BuildStatus::Failed {
            code: output.status.code(),
            diagnostic,
        })
    }
}

/// Launcher driven by a command template such as
/// `mpirun -np {procs} {artifact} {size}`.
///
/// Without a timeout a hung program blocks the sweep forever.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    template: CommandTemplate,
    timeout: Option<Duration>,
}

impl CommandLauncher {
    pub fn new(template: CommandTemplate) -> Self {
        CommandLauncher {
            template,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Kills the launcher and every worker it started. The launcher leads its
/// own process group, so the group id is the child's pid.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    unsafe {
        libc::killpg(child.id() as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<ExitState> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(ExitState::from_status(status)),
            None if Instant::now() >= deadline => {
                kill_group(child);
                let _ = child.wait();
                return Ok(ExitState::TimedOut);
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

impl Launcher for CommandLauncher {
    fn run(&self, artifact: &Path, problem_size: u64, processes: u32) -> Result<RunOutput> {
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rendered = self.template.render(&Placeholders {
            name: Some(&name),
            artifact: Some(artifact),
            size: Some(problem_size),
            procs: Some(processes),
            ..Default::default()
        });
        tracing::debug!(program = %rendered.program, args = ?rendered.args, "launching");

        let mut cmd = command_for(&rendered);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SweepError::spawn(&rendered.program, e))?;

        // Readers run concurrently with the wait so a chatty program cannot
        // fill a pipe and stall.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let exit = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit),
            None => child.wait().map(ExitState::from_status),
        }
        .map_err(|e| SweepError::spawn(&rendered.program, e))?;

        // Workers left behind by the launcher would hold the pipes open and
        // compete with the next run for cores.
        if exit != ExitState::TimedOut {
            kill_group(&mut child);
        }

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        Ok(RunOutput {
            exit,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> CommandTemplate {
        CommandTemplate::new("sh", &["-c", script, "sh", "{size}", "{procs}"])
    }

    #[test]
    fn test_launcher_captures_streams() {
        let launcher = CommandLauncher::new(sh("echo \"n=$1 p=$2 took 0.5000 s\"; echo warn >&2"));
        let out = launcher.run(&PathBuf::from("prog"), 64, 4).unwrap();
        assert_eq!(out.exit, ExitState::Exited(0));
        assert_eq!(out.stdout.trim(), "n=64 p=4 took 0.5000 s");
        assert_eq!(out.stderr.trim(), "warn");
    }

    #[test]
    fn test_launcher_reports_exit_code() {
        let launcher = CommandLauncher::new(sh("exit 3"));
        let out = launcher.run(&PathBuf::from("prog"), 1, 1).unwrap();
        assert_eq!(out.exit, ExitState::Exited(3));
        assert!(!out.exit.success());
    }

    #[test]
    fn test_launcher_timeout_kills_child() {
        let launcher = CommandLauncher::new(CommandTemplate::new("sleep", &["5"]))
            .with_timeout(Some(Duration::from_millis(100)));
        let start = Instant::now();
        let out = launcher.run(&PathBuf::from("prog"), 1, 1).unwrap();
        assert_eq!(out.exit, ExitState::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_launcher_timeout_kills_forked_workers() {
        let launcher = CommandLauncher::new(sh("sleep 5; echo 1.0"))
            .with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();
        let out = launcher.run(&PathBuf::from("prog"), 1, 1).unwrap();
        assert_eq!(out.exit, ExitState::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn test_launcher_reaps_background_workers() {
        let launcher = CommandLauncher::new(sh("sleep 5 & echo \"took 0.25 s\""));
        let start = Instant::now();
        let out = launcher.run(&PathBuf::from("prog"), 1, 1).unwrap();
        assert!(out.exit.success());
        assert_eq!(out.stdout.trim(), "took 0.25 s");
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_launcher_spawn_failure_is_error() {
        let launcher = CommandLauncher::new(CommandTemplate::new("/nonexistent/launcher", &[]));
        let err = launcher.run(&PathBuf::from("prog"), 1, 1).unwrap_err();
        assert!(matches!(err, SweepError::Spawn { .. }));
    }

    #[test]
    fn test_compiler_failure_carries_diagnostic() {
        let compiler = CommandCompiler::new(CommandTemplate::new(
            "sh",
            &["-c", "echo \"error: $1 broken\" >&2; exit 2", "sh", "{source}"],
        ));
        let status = compiler
            .compile(&PathBuf::from("a.c"), "a", &PathBuf::from("a"))
            .unwrap();
        assert_eq!(
            status,
            BuildStatus::Failed {
                code: Some(2),
                diagnostic: "error: a.c broken".to_string()
            }
        );
    }

    #[test]
    fn test_compiler_success() {
        let compiler = CommandCompiler::new(CommandTemplate::new("true", &[]));
        let status = compiler
            .compile(&PathBuf::from("a.c"), "a", &PathBuf::from("a"))
            .unwrap();
        assert_eq!(status, BuildStatus::Built);
    }
}
