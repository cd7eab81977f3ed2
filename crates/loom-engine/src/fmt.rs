//! Whitespace formatter for Loom source
//!
//! Re-indents by brace depth (4 spaces per level), trims trailing
//! whitespace and collapses runs of blank lines. Braces inside string
//! literals and comments do not count. Token content is never changed, so
//! formatted source compiles to the same module.

const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Str,
    BlockComment,
}

/// Format `source`.
pub fn format_source(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut depth: usize = 0;
    let mut state = Scan::Code;
    let mut blank_run = 0;

    for raw in source.lines() {
        let line = raw.trim();
        let scan = scan_line(line, state);

        if line.is_empty() && state == Scan::Code {
            blank_run += 1;
            continue;
        }
        if blank_run > 0 && !out.is_empty() && !line.starts_with('}') {
            out.push('\n');
        }
        blank_run = 0;

        if !line.is_empty() {
            for _ in 0..depth.saturating_sub(scan.leading_closes) {
                out.push_str(INDENT);
            }
        }
        out.push_str(line);
        out.push('\n');

        depth = (depth + scan.opens).saturating_sub(scan.closes);
        state = scan.end;
    }

    out
}

struct LineScan {
    opens: usize,
    closes: usize,
    /// Closing braces before any other code on the line
    leading_closes: usize,
    end: Scan,
}

/// Scan one line starting in `state`, counting braces that are code.
fn scan_line(line: &str, mut state: Scan) -> LineScan {
    let mut scan = LineScan {
        opens: 0,
        closes: 0,
        leading_closes: 0,
        end: state,
    };
    let mut leading = true;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            Scan::Code => match c {
                '{' => {
                    scan.opens += 1;
                    leading = false;
                }
                '}' => {
                    scan.closes += 1;
                    if leading {
                        scan.leading_closes += 1;
                    }
                }
                '"' => {
                    state = Scan::Str;
                    leading = false;
                }
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = Scan::BlockComment;
                }
                c if c.is_whitespace() => {}
                _ => leading = false,
            },
            Scan::Str => match c {
                '\\' => {
                    chars.next();
                }
                '"' => state = Scan::Code,
                _ => {}
            },
            Scan::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = Scan::Code;
                }
            }
        }
    }
    // A regular string cannot span lines
    scan.end = if state == Scan::Str { Scan::Code } else { state };
    scan
}
