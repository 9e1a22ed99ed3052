//! Command-line front end.
//!
//! - No args → interactive REPL on stdin/stdout.
//! - `-h`/`--help` → usage text, exit 0.
//! - `-v`/`--version` → package name and version, exit 0.
//! - A single path argument → load and run that file's commands silently,
//!   exiting 1 with the final complaint (if any) printed to stderr.
//!
//! This mirrors the lineage's mode-selection-by-argv shape without adopting
//! its dual bytecode-file/embedded-interpreter split, since this language
//! has no separate persisted bytecode format.

use std::env;
use std::fs::File;
use std::io;
use std::process::ExitCode;

use pebble::Interpreter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage() -> String {
    format!(
        r#"pebble v{VERSION}

Usage:
    pebble [script]

Arguments:
    [script]
        Path to a source file to load and run. Without one, starts an
        interactive session on stdin/stdout.

Options:
    -h, --help
        Show this help message and exit.
    -v, --version
        Show the interpreter version."#
    )
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() == 1 {
        let mut interp = Interpreter::new();
        let stdin = io::stdin();
        let stdout = io::stdout();
        interp.read_eval_print_loop(stdin.lock(), stdout.lock());
        return ExitCode::SUCCESS;
    }

    if args[1] == "-h" || args[1] == "--help" {
        println!("{}", usage());
        return ExitCode::SUCCESS;
    }

    if args[1] == "-v" || args[1] == "--version" {
        println!("pebble v{VERSION}");
        return ExitCode::SUCCESS;
    }

    let path = &args[1];
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("pebble: cannot open '{path}': {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut interp = Interpreter::new();
    match interp.load_file(file) {
        Some(complaint) => {
            eprintln!("{}", complaint.message);
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
