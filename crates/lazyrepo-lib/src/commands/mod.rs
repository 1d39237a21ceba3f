mod run;

use lazypath::AbsoluteSystemPathBuf;

use crate::{cli::Args, cli::Command, Error};

/// Shared context every command starts from: where we are and what was
/// asked.
pub struct CommandBase {
    pub cwd: AbsoluteSystemPathBuf,
    pub args: Args,
}

impl CommandBase {
    pub fn new(args: Args) -> Result<Self, Error> {
        let cwd = match &args.cwd {
            Some(cwd) => {
                let base = AbsoluteSystemPathBuf::cwd()?;
                AbsoluteSystemPathBuf::from_unknown(&base, cwd.clone())
            }
            None => AbsoluteSystemPathBuf::cwd()?,
        };
        Ok(Self { cwd, args })
    }
}

pub async fn dispatch(args: Args) -> Result<i32, Error> {
    let base = CommandBase::new(args)?;
    match base.args.command.clone() {
        Command::Run {
            task,
            filter,
            force,
            pass_through_args,
        } => run::run(base, task, filter, force, pass_through_args).await,
    }
}
