use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::renderer::{RenderJob, Renderer, RendererProbe};
use crate::tracker::ProgressReporter;

/// Directory manim creates for intermediate segments; never the final video.
const PARTIAL_DIR: &str = "partial_movie_files";

/// Upper bound on stderr bytes kept in a failure message.
const STDERR_TAIL: usize = 4096;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Renders scenes by invoking the Manim command line.
///
/// Every job gets its own script file and media directory inside
/// `work_dir`, both removed once the render finishes. The final video is
/// moved to `<work_dir>/<job_id>.<ext>`.
#[derive(Debug, Clone)]
pub struct ManimRenderer {
    program: String,
    base_args: Vec<String>,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ManimRenderer {
    /// `command` is split on whitespace, e.g. `"manim"` or `"python3 -m manim"`.
    pub fn new(
        command: &str,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, RenderError> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts
            .next()
            .ok_or_else(|| RenderError::Rejected("renderer command must not be empty".into()))?;
        Ok(Self {
            program,
            base_args: parts.collect(),
            work_dir: work_dir.into(),
            timeout,
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(
        &self,
        job: &RenderJob,
        script: &Path,
        media_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, RenderError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        tokio::fs::write(script, &job.source).await?;
        progress.report(30).await;

        let ext = job.format.extension();
        let mut cmd = self.command();
        cmd.arg(job.quality.flag())
            .arg("--disable_caching")
            .args(["--format", ext])
            .arg("--media_dir")
            .arg(media_dir)
            .arg(script)
            .arg(&job.scene)
            .current_dir(&self.work_dir);
        debug!(job_id = %job.job_id, command = ?cmd.as_std(), "launching renderer");

        let child = cmd.spawn().map_err(|e| RenderError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;
        progress.report(40).await;

        // Dropping the child on timeout kills the process.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(RenderError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };
        progress.report(80).await;

        if !output.status.success() {
            return Err(RenderError::Exit {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let produced = find_video(media_dir, &job.scene, ext)
            .await?
            .ok_or(RenderError::NoOutput)?;
        let final_path = self.work_dir.join(format!("{}.{ext}", job.job_id));
        move_file(&produced, &final_path).await?;

        info!(job_id = %job.job_id, path = %final_path.display(), "video rendered");
        Ok(final_path)
    }
}

#[async_trait]
impl Renderer for ManimRenderer {
    async fn render(
        &self,
        job: &RenderJob,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, RenderError> {
        let script = self.work_dir.join(format!("{}.py", job.job_id));
        let media_dir = self.work_dir.join(format!("media-{}", job.job_id));

        let result = self.run(job, &script, &media_dir, progress).await;

        if let Err(e) = tokio::fs::remove_file(&script).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %script.display(), error = %e, "failed to remove scene script");
        }
        if let Err(e) = tokio::fs::remove_dir_all(&media_dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %media_dir.display(), error = %e, "failed to remove media directory");
        }

        result
    }

    async fn probe(&self) -> RendererProbe {
        let mut cmd = self.command();
        cmd.arg("--version");
        let output = match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(program = %self.program, error = %e, "renderer probe failed");
                return RendererProbe::default();
            }
            Err(_) => {
                warn!(program = %self.program, "renderer probe timed out");
                return RendererProbe::default();
            }
        };
        if !output.status.success() {
            return RendererProbe::default();
        }
        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_owned);
        RendererProbe {
            installed: true,
            version,
        }
    }
}

/// Locate the rendered video below `media_dir`.
///
/// Prefers `<scene>.<ext>`; otherwise the first file with the right
/// extension outside manim's partial-segment directories.
async fn find_video(media_dir: &Path, scene: &str, ext: &str) -> std::io::Result<Option<PathBuf>> {
    let mut pending = vec![media_dir.to_path_buf()];
    let mut fallback = None;

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if entry.file_name() != PARTIAL_DIR {
                    pending.push(path);
                }
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if path.file_stem().and_then(|s| s.to_str()) == Some(scene) {
                return Ok(Some(path));
            }
            fallback.get_or_insert(path);
        }
    }

    Ok(fallback)
}

/// Rename, falling back to copy + delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_owned();
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
