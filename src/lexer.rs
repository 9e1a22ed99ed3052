//! # Lexer
//!
//! Single-character-lookahead tokenizer over any [`Read`] byte source —
//! one byte at a time, exactly like the original's `next_char()` over a
//! `FILE*`, so the same lexer drives both `load_file` (reading a whole
//! script) and the REPL (reading interactively from stdin) without
//! buffering an entire command ahead of time. Classifies numeric,
//! identifier/keyword, string, operator, newline, and end-of-input tokens.
//! Lexical errors (bad character, overflowing literal, unterminated string,
//! overlong identifier) latch onto the shared [`Latch`]; the lexer then
//! reports [`Token::Eof`] for the remainder of the current line.

use std::io::Read;

use crate::arena::{SIZE_W, W};
use crate::error::{Complaint, ComplaintKind, Latch};

/// Maximum identifier/keyword byte length (also the dictionary's name-length
/// limit).
pub const MAX_NAME_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Number(W),
    Ident(Vec<u8>),
    Str(Vec<u8>),
    Then,
    Forget,
    Let,
    If,
    Fun,
    Else,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Amp,
    Pipe,
    Caret,
    LParen,
    RParen,
    Eq,
    Colon,
    Semi,
    Newline,
    Eof,
}

fn keyword(bytes: &[u8]) -> Option<Token> {
    Some(match bytes {
        b"then" => Token::Then,
        b"forget" => Token::Forget,
        b"let" => Token::Let,
        b"if" => Token::If,
        b"fun" => Token::Fun,
        b"else" => Token::Else,
        _ => return None,
    })
}

fn hex_digit_value(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'a'..=b'f' => Some((c - b'a' + 10) as u32),
        b'A'..=b'F' => Some((c - b'A' + 10) as u32),
        _ => None,
    }
}

/// One byte of lookahead over a live [`Read`] source.
pub struct Lexer<R: Read> {
    source: R,
    ch: Option<u8>,
}

impl<R: Read> Lexer<R> {
    pub fn new(source: R) -> Self {
        let mut lx = Lexer { source, ch: None };
        lx.advance();
        lx
    }

    fn advance(&mut self) {
        let mut buf = [0u8; 1];
        match self.source.read(&mut buf) {
            Ok(0) | Err(_) => self.ch = None,
            Ok(_) => self.ch = Some(buf[0]),
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.ch {
            if c == b'\n' {
                break;
            }
            self.advance();
        }
    }

    /// Read and classify the next token.
    pub fn next(&mut self, latch: &mut Latch) -> Token {
        loop {
            match self.ch {
                None => return Token::Eof,
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.advance();
                    continue;
                }
                Some(b'#') => {
                    self.skip_line();
                    continue;
                }
                Some(b'\n') => {
                    self.advance();
                    return Token::Newline;
                }
                _ => break,
            }
        }
        let c = self.ch.unwrap();
        match c {
            b'0'..=b'9' => self.lex_number(latch),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_ident_or_keyword(latch),
            b'\'' => self.lex_string(latch),
            b'+' => { self.advance(); Token::Plus }
            b'-' => { self.advance(); Token::Minus }
            b'*' => { self.advance(); Token::Star }
            b'/' => { self.advance(); Token::Slash }
            b'%' => { self.advance(); Token::Percent }
            b'<' => { self.advance(); Token::Lt }
            b'&' => { self.advance(); Token::Amp }
            b'|' => { self.advance(); Token::Pipe }
            b'^' => { self.advance(); Token::Caret }
            b'(' => { self.advance(); Token::LParen }
            b')' => { self.advance(); Token::RParen }
            b'=' => { self.advance(); Token::Eq }
            b':' => { self.advance(); Token::Colon }
            b';' => { self.advance(); Token::Semi }
            _ => {
                self.advance();
                latch.raise(Complaint::new(ComplaintKind::Lexical, "Lexical error"));
                Token::Eof
            }
        }
    }

    fn lex_number(&mut self, latch: &mut Latch) -> Token {
        if self.ch == Some(b'0') {
            self.advance();
            if matches!(self.ch, Some(b'x') | Some(b'X')) {
                self.advance();
                return self.lex_hex(latch);
            }
            return self.lex_decimal_continue(0, latch);
        }
        self.lex_decimal(latch)
    }

    fn lex_decimal(&mut self, latch: &mut Latch) -> Token {
        self.lex_decimal_digits(0, latch)
    }

    fn lex_decimal_continue(&mut self, start: i64, latch: &mut Latch) -> Token {
        self.lex_decimal_digits(start, latch)
    }

    /// Accumulate decimal digits with checked arithmetic so a long digit run
    /// (e.g. a 20-digit literal) raises "Numeric overflow" instead of
    /// panicking on an `i64` multiply/add before the range check ever runs.
    /// Once overflow is detected the accumulator is left alone but the
    /// remaining digit characters are still consumed.
    fn lex_decimal_digits(&mut self, start: i64, latch: &mut Latch) -> Token {
        let mut value = start;
        let mut overflowed = value > W::MAX as i64;
        while let Some(c) = self.ch {
            if !c.is_ascii_digit() {
                break;
            }
            if !overflowed {
                let digit = (c - b'0') as i64;
                match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                    Some(v) if v <= W::MAX as i64 => value = v,
                    _ => overflowed = true,
                }
            }
            self.advance();
        }
        if overflowed {
            latch.raise(Complaint::new(ComplaintKind::Lexical, "Numeric overflow"));
        }
        Token::Number(value as W)
    }

    /// Mirrors the original's overflow check exactly: reject once more than
    /// `2 * sizeof(W)` hex digits have been consumed, regardless of their
    /// value. This is a digit-count bound, not a true overflow check (see
    /// DESIGN.md Open Question (a)) — preserved intentionally.
    fn lex_hex(&mut self, latch: &mut Latch) -> Token {
        let max_digits = 2 * SIZE_W;
        let mut value: u32 = 0;
        let mut digits = 0usize;
        while let Some(c) = self.ch {
            match hex_digit_value(c) {
                Some(d) => {
                    digits += 1;
                    if digits <= max_digits {
                        value = (value << 4) | d;
                    }
                    self.advance();
                }
                None => break,
            }
        }
        if digits == 0 {
            latch.raise(Complaint::new(ComplaintKind::Lexical, "Lexical error"));
            return Token::Eof;
        }
        if digits > max_digits {
            latch.raise(Complaint::new(ComplaintKind::Lexical, "Numeric overflow"));
        }
        Token::Number(value as W)
    }

    fn lex_ident_or_keyword(&mut self, latch: &mut Latch) -> Token {
        let mut bytes = Vec::with_capacity(MAX_NAME_LEN);
        let mut overflowed = false;
        while let Some(c) = self.ch {
            if c.is_ascii_alphanumeric() || c == b'_' {
                if bytes.len() < MAX_NAME_LEN {
                    bytes.push(c);
                } else {
                    overflowed = true;
                }
                self.advance();
            } else {
                break;
            }
        }
        if overflowed {
            latch.raise(Complaint::new(ComplaintKind::Lexical, "Identifier too long"));
        }
        if let Some(kw) = keyword(&bytes) {
            return kw;
        }
        Token::Ident(bytes)
    }

    fn lex_string(&mut self, latch: &mut Latch) -> Token {
        self.advance(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.ch {
                None => {
                    latch.raise(Complaint::new(ComplaintKind::Lexical, "Unterminated string"));
                    return Token::Str(bytes);
                }
                Some(b'\'') => {
                    self.advance();
                    return Token::Str(bytes);
                }
                Some(c) => {
                    bytes.push(c);
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokens(src: &str) -> Vec<Token> {
        let mut latch = Latch::new();
        let mut lx = Lexer::new(Cursor::new(src.as_bytes().to_vec()));
        let mut out = Vec::new();
        loop {
            let t = lx.next(&mut latch);
            let done = t == Token::Eof;
            out.push(t);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn decimal_and_hex_literals() {
        assert_eq!(tokens("42").into_iter().next().unwrap(), Token::Number(42));
        assert_eq!(tokens("0x2A").into_iter().next().unwrap(), Token::Number(42));
    }

    #[test]
    fn keywords_recognized() {
        assert_eq!(tokens("let").into_iter().next().unwrap(), Token::Let);
        assert_eq!(tokens("fun").into_iter().next().unwrap(), Token::Fun);
        assert_eq!(tokens("letx").into_iter().next().unwrap(), Token::Ident(b"letx".to_vec()));
    }

    #[test]
    fn string_literal() {
        assert_eq!(tokens("'hi'").into_iter().next().unwrap(), Token::Str(b"hi".to_vec()));
    }

    #[test]
    fn unterminated_string_latches() {
        let mut latch = Latch::new();
        let mut lx = Lexer::new(Cursor::new(b"'hi".to_vec()));
        lx.next(&mut latch);
        assert!(latch.is_raised());
        assert_eq!(latch.get().unwrap().message, "Unterminated string");
    }

    #[test]
    fn overlong_hex_latches_overflow_by_digit_count() {
        let mut latch = Latch::new();
        let mut lx = Lexer::new(Cursor::new(b"0x123456789".to_vec()));
        lx.next(&mut latch);
        assert!(latch.is_raised());
        assert_eq!(latch.get().unwrap().message, "Numeric overflow");
    }

    #[test]
    fn bad_character_latches_lexical_error() {
        let mut latch = Latch::new();
        let mut lx = Lexer::new(Cursor::new(b"@".to_vec()));
        lx.next(&mut latch);
        assert!(latch.is_raised());
        assert_eq!(latch.get().unwrap().kind, ComplaintKind::Lexical);
    }
}
