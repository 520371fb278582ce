//! ffmpeg subprocess lifecycle: spawn, stream stderr through the parser,
//! enforce a wall-clock timeout, and kill on expiry.

use crate::error::{ProberError, Result};
use crate::parse::{ParsedStats, StderrParser};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

pub struct ProcessOutcome {
    pub stats: ParsedStats,
    pub timed_out: bool,
}

/// Run `ffmpeg` with the given arguments, feeding its stderr line-by-line
/// into a [`StderrParser`], killing the process if it outlives
/// `wall_timeout`.
pub async fn run_ffmpeg(args: &[String], wall_timeout: Duration, duration_s: f64) -> Result<ProcessOutcome> {
    let mut child = Command::new("ffmpeg")
        .args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stderr = child
        .stderr
        .take()
        .expect("stderr was configured as piped");
    let mut lines = BufReader::new(stderr).lines();
    let mut parser = StderrParser::new(duration_s);

    let drain_and_wait = async {
        while let Ok(Some(line)) = lines.next_line().await {
            parser.feed_line(&line);
        }
        child.wait().await
    };

    match tokio::time::timeout(wall_timeout, drain_and_wait).await {
        Ok(Ok(_status)) => Ok(ProcessOutcome {
            stats: parser.finish(),
            timed_out: false,
        }),
        Ok(Err(io_err)) => Err(ProberError::Spawn(io_err)),
        Err(_elapsed) => Ok(ProcessOutcome {
            stats: parser.finish(),
            timed_out: true,
        }),
    }
}
