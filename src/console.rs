use crate::view::Snapshot;
use std::{
    fmt,
    io::{self, BufRead, Write},
};

/// The debugger's way of talking to the user.
pub trait Console {
    /// Ask for a line of input, `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    /// Show the current state of the session.
    fn refresh(&mut self, _snapshot: &Snapshot) {}

    /// Show a block of text, like the manual or part of the log.
    fn show(&mut self, _text: &str) {}

    fn clear(&mut self) {}
}

/// Line based console on stdin and stdout.
pub struct Terminal {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin(),
            stdout: io::stdout(),
        }
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for Terminal {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        let mut stdout = self.stdout.lock();
        write!(stdout, "{} ", prompt).ok()?;
        stdout.flush().ok()?;

        let mut line = String::new();
        match self.stdin.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                tracing::error!("failed to read from stdin: {}", err);
                None
            }
        }
    }

    fn refresh(&mut self, snapshot: &Snapshot) {
        let _ = writeln!(self.stdout.lock(), "{}", snapshot);
    }

    fn show(&mut self, text: &str) {
        let _ = writeln!(self.stdout.lock(), "{}", text);
    }

    fn clear(&mut self) {
        let mut stdout = self.stdout.lock();
        let _ = write!(stdout, "\x1b[2J\x1b[H");
        let _ = stdout.flush();
    }
}

/// Put `title` in the terminal's title bar, leaving the prompt line alone.
pub fn write_title(out: &mut impl Write, title: &impl fmt::Display) -> io::Result<()> {
    write!(out, "\x1b]2;{}\x07", title)?;
    out.flush()
}

/// Console fed from a fixed list of lines, recording everything it is shown.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct Scripted {
    lines: std::collections::VecDeque<String>,
    pub prompts: Vec<String>,
    pub shown: Vec<String>,
    pub refreshes: usize,
}

#[cfg(test)]
impl Scripted {
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            lines: lines.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
impl Console for Scripted {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.prompts.push(prompt.to_string());
        self.lines.pop_front()
    }

    fn refresh(&mut self, _snapshot: &Snapshot) {
        self.refreshes += 1;
    }

    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }
}
