use clap::Parser;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use synodic::cli::{self, Args};
use tracing::Level;

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .init();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let result = if args.list_integrators {
        cli::handle_list_integrators(&mut out)
    } else {
        cli::run(&args, &mut out)
    };

    match result.and_then(|()| out.flush().map_err(Into::into)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
