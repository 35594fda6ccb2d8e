use crate::error::ProcessError;
use std::process::Stdio;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::Command,
};
use tracing::info;

/// Receives the child's output one line at a time, as it is produced.
pub trait LineSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Production sink: forwards each line to the tracing subscriber.
pub struct TracingSink;

impl LineSink for TracingSink {
    fn line(&self, line: &str) {
        info!("{line}");
    }
}

/// Spawn `argv` with the current environment overlaid by `env_overlay`
/// (credential injection stays off the command line), drain stdout and
/// stderr line by line into `sink` while the child runs, then map the exit
/// status to a result. Draining concurrently with the child is what keeps
/// a chatty utility from blocking on a full pipe.
pub async fn run_action(
    action: &str,
    env_overlay: &[(String, String)],
    argv: &[String],
    sink: &dyn LineSink,
) -> Result<(), ProcessError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(ProcessError::EmptyCommand {
            action: action.to_string(),
        });
    };

    let mut child = Command::new(program)
        .args(args)
        .envs(env_overlay.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (out, err) = tokio::join!(
        drain(stdout.map(BufReader::new), sink),
        drain(stderr.map(BufReader::new), sink),
    );
    out?;
    err?;

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(ProcessError::Failed {
            action: action.to_string(),
        })
    }
}

async fn drain<R>(reader: Option<R>, sink: &dyn LineSink) -> Result<(), ProcessError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        sink.line(&line);
    }
    Ok(())
}
