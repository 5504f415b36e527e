use anyhow::Result;
use crossterm::{
    cursor, execute,
    terminal::{self, ClearType},
};
use std::io::{self, IsTerminal, Write};

/// Raw-mode session for the interactive player. Restores the terminal on drop,
/// including when playback bails out with an error.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        if !io::stdout().is_terminal() {
            return Ok(Self { active: false });
        }
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), cursor::Hide)?;
        Ok(Self { active: true })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = execute!(io::stdout(), cursor::Show);
            let _ = terminal::disable_raw_mode();
            println!();
        }
    }
}

/// Resets state left behind by a previous crash (raw mode, hidden cursor).
pub fn reset() {
    let _ = terminal::disable_raw_mode();
    if io::stdout().is_terminal() {
        let _ = execute!(io::stdout(), cursor::Show);
    }
}

/// Rewrites the current line in place.
pub fn write_status(line: &str) {
    let mut stdout = io::stdout();
    if !stdout.is_terminal() {
        return;
    }
    let _ = execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine)
    );
    let _ = write!(stdout, "{}", line);
    let _ = stdout.flush();
}
