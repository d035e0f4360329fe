mod commands;
mod opts;

use clap::error::ErrorKind;
use clap::Parser;

use opts::Opts;

/// Wrapper function for `main` to ensure that `Drop` is called for local
/// variables, since `std::process::exit` will skip them.
fn do_main_and_drop_locals() -> eyre::Result<i32> {
    color_eyre::install()?;
    let _tracing_guard = install_tracing();

    let argv: Vec<String> = std::env::args().collect();
    if argv.len() <= 1 {
        println!("Please enter a command.");
        return Ok(0);
    }

    let opts = match Opts::try_parse_from(&argv) {
        Ok(opts) => opts,
        Err(err) => return Ok(report_parse_error(err)),
    };

    let cwd = std::env::current_dir()?;
    commands::run(opts.command, &cwd)?;
    Ok(0)
}

/// Translates a `clap` parse failure into the exact argv-validation strings
/// of §6, since this CLI communicates failure by text rather than by a
/// nonzero exit code (§7, §9's exit-code policy).
fn report_parse_error(err: clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{err}");
            0
        }
        ErrorKind::InvalidSubcommand | ErrorKind::MissingSubcommand => {
            println!("No command with that name exists.");
            0
        }
        _ => {
            println!("Incorrect operands.");
            0
        }
    }
}

fn main() -> eyre::Result<()> {
    let exit_code = do_main_and_drop_locals()?;
    std::process::exit(exit_code)
}

#[must_use = "This function returns a guard object to flush traces. Dropping it immediately is probably incorrect. Make sure that the returned value lives until tracing has finished."]
fn install_tracing() -> Box<dyn Drop> {
    // From https://github.com/yaahc/color-eyre/blob/07b9f0351544e2b07fcd173dc1fc602a7fc8bb6b/examples/usage.rs
    // Licensed under MIT.
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let (filter_layer, fmt_layer) = match EnvFilter::try_from_default_env() {
        Ok(filter_layer) => {
            let fmt_layer = fmt::layer()
                .with_span_events(fmt::format::FmtSpan::CLOSE)
                .with_target(false);
            (Some(filter_layer), Some(fmt_layer))
        }
        Err(_) => {
            // We would like the filter layer to apply *only* to the formatting
            // layer. That way, the logging output is suppressed, but we still
            // get spantraces for use with `color-eyre`. However, it's currently
            // not possible (?), at least not without writing some a custom
            // subscriber. See https://github.com/tokio-rs/tracing/pull/1523
            //
            // The workaround is to only display logging messages if `RUST_LOG`
            // is set (which is unfortunate, because we'll miss out on
            // `WARN`-level messages by default).
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    struct TrivialDrop;
    impl Drop for TrivialDrop {
        fn drop(&mut self) {
            // Do nothing.
        }
    }
    Box::new(TrivialDrop)
}
