use lazypath::AbsoluteSystemPathBuf;

/// Resolved options for one `run` invocation.
#[derive(Debug, Clone)]
pub struct Opts {
    pub cwd: AbsoluteSystemPathBuf,
    pub task_name: String,
    /// Raw filter paths as given on the command line, resolved against the
    /// repo root during graph construction.
    pub filter: Vec<String>,
    pub force: bool,
    pub pass_through_args: Vec<String>,
    pub concurrency: usize,
}

impl Opts {
    pub fn default_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1)
    }
}
