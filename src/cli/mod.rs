mod args;
mod ask;

pub use args::{CliArgs, Command};
pub(crate) use ask::{print_response, write_chart};
