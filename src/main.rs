mod args;
mod dashboard;

use clap::Parser;
use log::{debug, warn, LevelFilter};
use snafu::ErrorCompat;

use crate::args::Args;
use crate::dashboard::RunOptions;

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
    debug!("args: {:?}", args);

    let opts = RunOptions {
        input: args.input.clone(),
        config: args.config.clone(),
        filters: args.filter.clone(),
        out: args.out.clone(),
        reference: args.reference.clone(),
        insights: args.insights,
    };

    if let Err(e) = dashboard::run_dashboard(&opts) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
