use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const LABEL_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy)]
enum Tone {
    Pending,
    Success,
    Info,
    Warn,
    Error,
}

impl Tone {
    fn to_stderr(self) -> bool {
        matches!(self, Tone::Warn | Tone::Error)
    }

    fn style(self) -> Style {
        let color = match self {
            Tone::Pending => AnsiColor::Cyan,
            Tone::Success => AnsiColor::Green,
            Tone::Info => AnsiColor::Blue,
            Tone::Warn => AnsiColor::Yellow,
            Tone::Error => AnsiColor::Red,
        };
        Style::new().bold().fg_color(Some(color.into()))
    }
}

fn color_enabled(stderr: bool) -> bool {
    let tty = if stderr {
        io::stderr().is_terminal()
    } else {
        io::stdout().is_terminal()
    };
    tty && std::env::var_os("NO_COLOR").is_none()
}

/// Render one status block. The label is right-aligned and continuation
/// lines are indented under the message.
fn render(tone: Tone, label: &str, message: &str, color: bool) -> String {
    let label = format!("{label:>LABEL_WIDTH$}");
    let (on, off) = if color {
        let style = tone.style();
        (style.render().to_string(), style.render_reset().to_string())
    } else {
        (String::new(), String::new())
    };

    let mut out = String::new();
    for (idx, line) in message.split('\n').enumerate() {
        if idx == 0 {
            out.push_str(&format!("{on}{label}{off} {line}\n"));
        } else {
            out.push_str(&format!("{:>LABEL_WIDTH$} {line}\n", ""));
        }
    }
    out
}

fn emit(tone: Tone, label: &str, message: &str) {
    let stderr = tone.to_stderr();
    let text = render(tone, label, message, color_enabled(stderr));
    // Best effort: a closed pipe must not abort the command.
    if stderr {
        let mut handle = io::stderr().lock();
        let _ = handle.write_all(text.as_bytes());
        let _ = handle.flush();
    } else {
        let mut handle = io::stdout().lock();
        let _ = handle.write_all(text.as_bytes());
        let _ = handle.flush();
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 60 {
        format!("{}m {}s", elapsed.as_secs() / 60, elapsed.as_secs() % 60)
    } else if elapsed.as_secs_f64() >= 1.0 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

pub fn info(message: impl Display) {
    emit(Tone::Info, "Info", &message.to_string());
}

pub fn warn(message: impl Display) {
    emit(Tone::Warn, "Warning", &message.to_string());
}

pub fn error(message: impl Display) {
    emit(Tone::Error, "Error", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    emit(Tone::Success, label, &message.to_string());
}

/// A long-running step, reported once when started and once when finished.
pub struct Progress {
    message: String,
    started: Instant,
    finished: bool,
}

impl Progress {
    pub fn start(label: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        emit(Tone::Pending, label, &message);
        Self {
            message,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn success(mut self, label: &str) {
        self.finished = true;
        let elapsed = format_elapsed(self.started.elapsed());
        emit(
            Tone::Success,
            label,
            &format!("{} in {elapsed}", self.message),
        );
    }

    pub fn fail(mut self, label: &str, error: impl Display) {
        self.finished = true;
        let elapsed = format_elapsed(self.started.elapsed());
        emit(
            Tone::Error,
            label,
            &format!("{} after {elapsed}: {error}", self.message),
        );
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.finished {
            emit(Tone::Warn, "Aborted", &self.message);
        }
    }
}
