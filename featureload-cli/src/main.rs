//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = featureload_cli::run() {
        eprintln!("featureload: {err}");
        std::process::exit(1);
    }
}
