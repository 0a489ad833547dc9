//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for animo-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind, built from `ANIMO_HOST` and `PORT`
    /// (default: `"0.0.0.0:8001"`).
    pub bind_address: String,

    /// Directory for scene scripts, per-job media folders and finished videos
    /// (default: `$TMPDIR/manim_videos`).
    pub work_dir: PathBuf,

    /// Command used to invoke Manim, split on whitespace
    /// (default: `"manim"`).
    pub manim_command: String,

    /// Maximum wall-clock time of one render.
    pub render_timeout: Duration,

    /// Number of jobs that may wait for a render worker.
    pub queue_capacity: usize,

    /// Number of renderer processes allowed to run at once.
    pub max_concurrent_renders: usize,

    /// Finished jobs older than this are removed; `None` keeps them for the
    /// lifetime of the process.
    pub job_ttl: Option<Duration>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs go to a daily rolling file in this directory instead
    /// of stdout.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated CORS origin allow-list; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = env_or("ANIMO_HOST", "0.0.0.0");
        let port: u16 = parse(lookup("PORT"), 8001);
        let ttl_secs: u64 = parse(lookup("ANIMO_JOB_TTL_SECS"), 0);

        Self {
            bind_address: format!("{host}:{port}"),
            work_dir: non_empty("ANIMO_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("manim_videos")),
            manim_command: env_or("ANIMO_MANIM_CMD", "manim"),
            render_timeout: Duration::from_secs(parse(lookup("ANIMO_RENDER_TIMEOUT_SECS"), 300)),
            queue_capacity: parse(lookup("ANIMO_QUEUE_CAPACITY"), 64),
            max_concurrent_renders: parse(lookup("ANIMO_MAX_CONCURRENT_RENDERS"), 2),
            job_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            log_level: env_or("ANIMO_LOG", "info"),
            log_json: flag("ANIMO_LOG_JSON", false),
            log_dir: non_empty("ANIMO_LOG_DIR").map(PathBuf::from),
            cors_allowed_origins: non_empty("ANIMO_CORS_ORIGINS"),
            enable_swagger: flag("ANIMO_ENABLE_SWAGGER", true),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
