use anyhow::{Context, anyhow};
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, ClearType},
};
use std::io::{Stdout, Write, stdout};

/// Smallest cell area the host will draw into.
pub const MIN_COLS: u16 = 8;
pub const MIN_ROWS: u16 = 4;

/// Raw mode plus alternate screen for as long as the guard lives.
pub struct TerminalGuard {
    out: Stdout,
}

impl TerminalGuard {
    pub fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Drop undoes raw mode even if a later step fails.
        let mut guard = Self { out: stdout() };
        guard
            .out
            .execute(terminal::EnterAlternateScreen)
            .context("enter alternate screen")?
            .execute(terminal::Clear(ClearType::All))
            .context("clear screen")?
            .execute(cursor::Hide)
            .context("hide cursor")?;
        Ok(guard)
    }

    pub fn writer(&self) -> Stdout {
        stdout()
    }

    /// Current terminal size, rejecting areas too small to draw in.
    pub fn size(&self) -> anyhow::Result<(u16, u16)> {
        let (cols, rows) = terminal::size().context("get terminal size")?;
        if cols < MIN_COLS || rows < MIN_ROWS {
            return Err(anyhow!(
                "terminal too small (need at least {MIN_COLS}x{MIN_ROWS}, got {cols}x{rows})"
            ));
        }
        Ok((cols, rows))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        // Undo sync output, autowrap and colour state left by a presenter.
        let _ = self.out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = self.out.flush();
        let _ = self.out.execute(cursor::Show);
        let _ = self.out.execute(terminal::LeaveAlternateScreen);
    }
}
