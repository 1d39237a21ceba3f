use crate::{commands::CommandBase, opts::Opts, run::Run, Error};

pub async fn run(
    base: CommandBase,
    task: String,
    filter: Vec<String>,
    force: bool,
    pass_through_args: Vec<String>,
) -> Result<i32, Error> {
    let opts = Opts {
        cwd: base.cwd,
        task_name: task,
        filter,
        force,
        pass_through_args,
        concurrency: Opts::default_concurrency(),
    };

    Run::new(opts).run().await
}
