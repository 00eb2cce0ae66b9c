// Logging for the pmsort worker pool
//
// Workers log through `tracing`. The subscriber is never reached through a
// hidden global from inside the pool: `PoolConfig::dispatch` carries it, and
// each worker thread installs it as its default for its whole life. When no
// dispatch is configured the pool captures whatever is current on the thread
// that builds it, see `current_subscriber`.
//
// # Usage Examples
//
// ```rust
// use pmsort_pool::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or pick the level from a coarse verbosity switch
// let config = logging::LogConfig::from(logging::Verbosity::Debug);
// logging::init(config);
// ```
//
// ## Per-pool subscriber
//
// ```rust
// use pmsort_pool::{PoolConfig, WorkerPool};
//
// let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
// let config = PoolConfig::new(2, 8).with_dispatch(tracing::Dispatch::new(subscriber));
// let pool = WorkerPool::new(config).unwrap();
// ```

use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Coarse verbosity switch for binaries and demos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Everything down to per-unit trace events
    Debug,
    /// Pool lifecycle and warnings
    #[default]
    Normal,
    /// Nothing at all
    Silent,
}

impl From<Verbosity> for LevelFilter {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Debug => LevelFilter::TRACE,
            Verbosity::Normal => LevelFilter::INFO,
            Verbosity::Silent => LevelFilter::OFF,
        }
    }
}

/// Configuration for the process-wide subscriber
///
/// # Examples
///
/// ```rust
/// use pmsort_pool::logging::LogConfig;
/// use tracing_subscriber::filter::LevelFilter;
///
/// let config = LogConfig {
///     level: LevelFilter::DEBUG,
///     target_filters: Some("pmsort_pool::queue=trace".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LevelFilter,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id; worker names carry their index
    pub show_thread_info: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            show_file_line: true,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

impl LogConfig {
    /// Preset used by [`init_development`].
    pub fn development() -> Self {
        Self {
            level: LevelFilter::DEBUG,
            target_filters: Some("pmsort_pool::queue=trace,pmsort_pool::pool=trace".to_string()),
            ..Default::default()
        }
    }
}

impl From<Verbosity> for LogConfig {
    fn from(verbosity: Verbosity) -> Self {
        Self {
            level: verbosity.into(),
            ..Default::default()
        }
    }
}

static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

/// Initialize the global subscriber. Only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::registry().with(env_filter(&config)).with(
            fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stdout))
                .with_file(config.show_file_line)
                .with_line_number(config.show_file_line)
                .with_thread_names(config.show_thread_info)
                .with_thread_ids(config.show_thread_info),
        );

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG everywhere, TRACE for the queue and the workers.
pub fn init_development() {
    init(LogConfig::development());
}

/// Warnings and errors only, to keep test output readable.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN.into(),
        show_thread_info: false,
        ..Default::default()
    });
}

/// Span covering work done on behalf of one pool.
///
/// # Examples
///
/// ```rust
/// use pmsort_pool::pool_span;
///
/// let span = pool_span!("sort", len = 1024);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! pool_span {
    ($operation:expr) => {
        tracing::debug_span!("pool", operation = $operation)
    };
    ($operation:expr, $($fields:tt)*) => {
        tracing::debug_span!("pool", operation = $operation, $($fields)*)
    };
}

/// Log a pool lifecycle event
///
/// # Examples
///
/// ```rust
/// use pmsort_pool::log_pool;
///
/// log_pool!("sort", "completed");
/// log_pool!("sort", "completed", len = 1024, depth = 2);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($operation:expr, $status:expr) => {
        tracing::debug!(operation = $operation, status = $status);
    };
    ($operation:expr, $status:expr, $($fields:tt)*) => {
        tracing::debug!(operation = $operation, status = $status, $($fields)*);
    };
}

/// The dispatcher that is current on this thread.
///
/// Pools built without an explicit [`PoolConfig::dispatch`](crate::PoolConfig)
/// hand this to their workers, so a scoped `tracing::subscriber::with_default`
/// around pool construction also covers the workers.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

pub use tracing::{debug, error, info, trace, warn};
