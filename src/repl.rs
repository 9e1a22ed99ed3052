//! # Command driver
//!
//! Both embedder entry points share the same compile-run-report loop; they
//! differ only in how commands are sourced and where results go.
//! `load_file` has no interactive device (`GETC` sees immediate EOF, `PUTC`
//! output is discarded) and reports only the last complaint, matching a
//! silent definitions load. `read_eval_print_loop` prints a prompt before
//! each command and the command's result or complaint after it, and wires
//! `GETC`/`PUTC` to the same reader/writer driving the session — unlike the
//! original's subprocess-per-command bootstrap, commands compile and run
//! in-process against the live arena (see DESIGN.md, "Driver").

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::compiler::{CommandOutcome, Compiler};
use crate::error::Complaint;
use crate::Interpreter;

const PROMPT: &[u8] = b"> ";

/// A cheaply-cloned handle onto one shared `Read`, so the command lexer and
/// `GETC` can walk the same byte stream without fighting over ownership of
/// it.
struct SharedReader<R>(Rc<RefCell<R>>);

impl<R> Clone for SharedReader<R> {
    fn clone(&self) -> Self {
        SharedReader(Rc::clone(&self.0))
    }
}

impl<R: Read> Read for SharedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.borrow_mut().read(buf)
    }
}

pub(crate) fn load_file<R: Read>(interp: &mut Interpreter, source: R) -> Option<Complaint> {
    let mut compiler = Compiler::new(source);
    let mut last = None;
    while !compiler.at_eof() {
        let mut latch = crate::error::Latch::new();
        let _ = compiler.compile_command(
            &mut interp.arena,
            &mut interp.natives,
            &mut io::empty(),
            &mut io::sink(),
            &mut latch,
        );
        if let Some(c) = latch.get() {
            last = Some(c.clone());
            compiler.recover_after_complaint(&mut latch);
        }
    }
    last
}

pub(crate) fn read_eval_print_loop<R: Read, W: Write>(interp: &mut Interpreter, input: R, mut out: W) {
    let shared = SharedReader(Rc::new(RefCell::new(input)));
    let mut compiler = Compiler::new(shared.clone());
    while !compiler.at_eof() {
        let _ = out.write_all(PROMPT);
        let _ = out.flush();
        let mut latch = crate::error::Latch::new();
        let mut device_in = shared.clone();
        let outcome = compiler.compile_command(
            &mut interp.arena,
            &mut interp.natives,
            &mut device_in,
            &mut out,
            &mut latch,
        );
        if let Some(c) = latch.get() {
            let _ = writeln!(out, "{}", c.message);
            compiler.recover_after_complaint(&mut latch);
            continue;
        }
        if let Some(CommandOutcome::Value(v)) = outcome {
            let _ = writeln!(out, "{}", v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn repl_prompts_and_prints_results() {
        let mut interp = Interpreter::new();
        let mut out = Vec::new();
        read_eval_print_loop(&mut interp, Cursor::new(b"1 + 2\n".to_vec()), &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "> 3\n> ");
    }

    #[test]
    fn repl_prints_complaint_message() {
        let mut interp = Interpreter::new();
        let mut out = Vec::new();
        read_eval_print_loop(&mut interp, Cursor::new(b"nosuchname\n".to_vec()), &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "> Unknown identifier\n> ");
    }

    #[test]
    fn load_file_is_silent_and_returns_last_complaint() {
        let mut interp = Interpreter::new();
        let complaint = load_file(&mut interp, Cursor::new(b"let a = 5\n".to_vec()));
        assert!(complaint.is_none());
        assert!(interp.arena().lookup(b"a").is_some());

        let complaint = load_file(&mut interp, Cursor::new(b"nosuchname\n".to_vec()));
        assert_eq!(complaint.unwrap().message, "Unknown identifier");
    }

    #[test]
    fn error_recovery_flushes_rest_of_line_only() {
        // Trailing garbage after the bad identifier must not surface a
        // second complaint, and the next line must evaluate normally.
        let mut interp = Interpreter::new();
        let mut out = Vec::new();
        read_eval_print_loop(
            &mut interp,
            Cursor::new(b"nosuchname 1 2 3\n2 + 2\n".to_vec()),
            &mut out,
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "> Unknown identifier\n> 4\n> "
        );
    }
}
