use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use wait_timeout::ChildExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a shell command on a remote host.
pub trait RemoteExecutor {
    fn execute(&self, host: &str, user: Option<&str>, command: &str, timeout: Duration) -> Result<CommandOutput>;
}

/// `ssh [user@]host command`, non-interactive.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    pub connect_timeout_secs: u64,
}

impl SshExecutor {
    pub fn new(connect_timeout_secs: u64) -> Self {
        Self { connect_timeout_secs }
    }
}

fn target(host: &str, user: Option<&str>) -> String {
    match user {
        Some(user) if !user.is_empty() => format!("{}@{}", user, host),
        _ => host.to_string(),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl RemoteExecutor for SshExecutor {
    fn execute(&self, host: &str, user: Option<&str>, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let target = target(host, user);
        debug!("SSH [{}] Executing: {}", target, command);

        let mut child = Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(&target)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute ssh command on {}", target))?;

        // read both pipes while waiting so a chatty command cannot block on a full pipe
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child
            .wait_timeout(timeout)
            .with_context(|| format!("Failed to wait for ssh on {}", target))?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                bail!("Command timed out after {}s on {}: {}", timeout.as_secs(), target, command);
            }
        };

        let output = CommandOutput {
            success: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };
        if !output.success {
            debug!("Stdout: {}", output.stdout);
            debug!("Stderr: {}", output.stderr);
        }
        Ok(output)
    }
}

/// Executes `command` and returns its stdout, failing on a non-zero exit.
pub fn run(
    executor: &dyn RemoteExecutor,
    host: &str,
    user: Option<&str>,
    command: &str,
    timeout: Duration,
) -> Result<String> {
    let output = executor.execute(host, user, command, timeout)?;
    if !output.success {
        return Err(anyhow!(
            "Command failed on {}: {}. Error: {}",
            host,
            command,
            output.stderr.trim()
        ));
    }
    Ok(output.stdout)
}
