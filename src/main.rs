use colored::Colorize;
use std::process;

fn main() {
    if let Err(e) = stepwise::cli::App::new().run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
