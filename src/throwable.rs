//! `error.*` fields: type, message and stack trace.
//!
//! The stack trace is written either as one JSON string or as an array with
//! one element per line. Line splitting happens in a single scan straight
//! into the output buffer; no list of lines is ever built.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::{self, Write};

use crate::buffer::with_scratch_buffer;
use crate::escape::{quote, quote_display, quote_range};

/// Where the stack trace text comes from.
#[derive(Clone, Copy)]
pub enum StackTrace<'a> {
    /// Stack text rendered by the caller. May contain `\r\n`, `\n` or `\r`
    /// line breaks.
    Text(&'a str),
    /// Stack text already split into lines.
    Lines(&'a [String]),
    /// A live error. Its stack is the optional captured backtrace followed by
    /// one `Caused by:` line per error in its `source()` chain.
    Error {
        error: &'a (dyn Error + 'static),
        backtrace: Option<&'a Backtrace>,
    },
}

impl fmt::Debug for StackTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackTrace::Text(text) => f.debug_tuple("Text").field(text).finish(),
            StackTrace::Lines(lines) => f.debug_tuple("Lines").field(lines).finish(),
            StackTrace::Error { error, .. } => f.debug_tuple("Error").field(error).finish(),
        }
    }
}

/// An exception already broken into its parts.
#[derive(Clone, Copy)]
pub struct Exception<'a> {
    pub type_name: &'a str,
    pub message: Option<&'a dyn fmt::Display>,
    pub stack: StackTrace<'a>,
}

impl<'a> Exception<'a> {
    pub fn new(type_name: &'a str, message: Option<&'a dyn fmt::Display>, stack: StackTrace<'a>) -> Self {
        Exception { type_name, message, stack }
    }
}

/// Writes `"error.type"`, `"error.message"` (when `message` is present) and
/// `"error.stack_trace"`, each followed by a comma.
///
/// A live error whose rendering produces nothing beyond its headline line
/// has no stack trace; the `"error.stack_trace"` key is then left out
/// entirely.
pub fn serialize_exception(
    buf: &mut String,
    type_name: &str,
    message: Option<&dyn fmt::Display>,
    stack: StackTrace<'_>,
    as_array: bool,
) {
    buf.push_str("\"error.type\":\"");
    quote(buf, type_name);
    buf.push_str("\",");

    if let Some(message) = message {
        buf.push_str("\"error.message\":\"");
        quote_display(buf, message);
        buf.push_str("\",");
    }

    let rollback = buf.len();
    buf.push_str("\"error.stack_trace\":");
    buf.push(if as_array { '[' } else { '"' });

    let written = match stack {
        StackTrace::Text(text) => {
            if as_array {
                push_split_lines(buf, text);
            } else {
                quote(buf, text);
            }
            true
        }
        StackTrace::Lines(lines) => {
            push_lines(buf, lines, as_array);
            true
        }
        StackTrace::Error { error, backtrace } => {
            print_stack_trace(buf, type_name, error, backtrace, as_array)
        }
    };

    if written {
        buf.push(if as_array { ']' } else { '"' });
        buf.push(',');
    } else {
        buf.truncate(rollback);
    }
}

/// Serializes a live error: its `Display` output is the message and its
/// source chain (plus `backtrace`, when captured) is the stack trace.
pub fn serialize_error(
    buf: &mut String,
    type_name: &str,
    error: &(dyn Error + 'static),
    backtrace: Option<&Backtrace>,
    as_array: bool,
) {
    serialize_exception(
        buf,
        type_name,
        Some(&format_args!("{error}")),
        StackTrace::Error { error, backtrace },
        as_array,
    );
}

/// Array elements for `text`, split on `\r\n`, `\n` and `\r`.
///
/// A trailing line break does not add an empty element. Text without any
/// line break becomes a single element.
fn push_split_lines(buf: &mut String, text: &str) {
    let bytes = text.as_bytes();
    let mut first = true;
    let mut line_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let terminator_len = match bytes[i] {
            b'\n' => 1,
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => 2,
            b'\r' => 1,
            _ => {
                i += 1;
                continue;
            }
        };
        push_element(buf, text, line_start, i, &mut first);
        i += terminator_len;
        line_start = i;
    }

    if first || line_start < bytes.len() {
        push_element(buf, text, line_start, bytes.len(), &mut first);
    }
}

#[inline]
fn push_element(buf: &mut String, text: &str, start: usize, end: usize, first: &mut bool) {
    if !*first {
        buf.push(',');
    }
    *first = false;
    buf.push('"');
    quote_range(buf, text, start, end);
    buf.push('"');
}

fn push_lines(buf: &mut String, lines: &[String], as_array: bool) {
    for (i, line) in lines.iter().enumerate() {
        if as_array {
            if i > 0 {
                buf.push(',');
            }
            buf.push('"');
            quote(buf, line);
            buf.push('"');
        } else {
            quote(buf, line);
            buf.push_str("\\n");
        }
    }
}

/// Renders `error` line by line into `buf`. Returns `false`, with `buf`
/// restored, when no line followed the headline.
fn print_stack_trace(
    buf: &mut String,
    type_name: &str,
    error: &(dyn Error + 'static),
    backtrace: Option<&Backtrace>,
    as_array: bool,
) -> bool {
    let initial_len = buf.len();

    let lines = with_scratch_buffer(|scratch| {
        let mut printer = StackPrinter {
            out: &mut *buf,
            line: scratch,
            as_array,
            lines: 0,
        };

        // Writes into `StackPrinter` and `String` never fail.
        // The headline is one line even when the message spans several.
        let _ = write!(printer.line, "{type_name}: {error}");
        printer.end_line();
        if let Some(backtrace) = backtrace.filter(|bt| bt.status() == BacktraceStatus::Captured) {
            let _ = write!(printer, "{backtrace}");
            printer.end_partial_line();
        }
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = writeln!(printer, "Caused by: {cause}");
            source = cause.source();
        }
        printer.end_partial_line();
        printer.lines
    });

    if lines <= 1 {
        buf.truncate(initial_len);
        false
    } else {
        true
    }
}

/// Collects formatted text one line at a time in the scratch buffer and
/// emits every completed line into the output buffer.
struct StackPrinter<'b> {
    out: &'b mut String,
    line: &'b mut String,
    as_array: bool,
    lines: usize,
}

impl StackPrinter<'_> {
    fn end_line(&mut self) {
        let line = self.line.strip_suffix('\r').unwrap_or(self.line.as_str());
        if self.as_array {
            if self.lines > 0 {
                self.out.push(',');
            }
            self.out.push('"');
            quote(self.out, line);
            self.out.push('"');
        } else {
            quote(self.out, line);
            self.out.push_str("\\n");
        }
        self.line.clear();
        self.lines += 1;
    }

    fn end_partial_line(&mut self) {
        if !self.line.is_empty() {
            self.end_line();
        }
    }
}

impl fmt::Write for StackPrinter<'_> {
    fn write_str(&mut self, mut s: &str) -> fmt::Result {
        while let Some(pos) = s.find('\n') {
            self.line.push_str(&s[..pos]);
            self.end_line();
            s = &s[pos + 1..];
        }
        self.line.push_str(s);
        Ok(())
    }
}
