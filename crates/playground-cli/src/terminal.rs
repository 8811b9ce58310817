use crossterm::{
    cursor::MoveTo,
    terminal::{Clear, ClearType},
    tty::IsTty,
};
use playground_core::TerminalWidget;
use std::io::{self, Write};

/// Terminal widget printing straight to stdout.
pub struct StdoutWidget {
    out: io::Stdout,
    clear_screen: bool,
}

impl StdoutWidget {
    /// Never clears the screen; for one-shot runs whose output may be piped.
    pub fn plain() -> Self {
        Self {
            out: io::stdout(),
            clear_screen: false,
        }
    }

    /// Clears the screen on `clear()` when stdout is a terminal.
    pub fn interactive() -> Self {
        let out = io::stdout();
        let clear_screen = out.is_tty();
        Self { out, clear_screen }
    }
}

impl TerminalWidget for StdoutWidget {
    fn write_raw(&mut self, text: &str) {
        let mut out = self.out.lock();
        let _ = write!(out, "{}", text);
        let _ = out.flush();
    }

    fn write_line(&mut self, text: &str) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }

    fn clear(&mut self) {
        if self.clear_screen {
            let _ = crossterm::execute!(self.out, Clear(ClearType::All), MoveTo(0, 0));
        }
    }
}
