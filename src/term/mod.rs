//! Terminal presentation of rendered surfaces.

mod halfblock;
mod terminal;

pub use halfblock::HalfBlockPresenter;
pub use terminal::{MIN_COLS, MIN_ROWS, TerminalGuard};

use std::io::Write;

use crate::render::Surface;

/// One screen update: the picture plus the text drawn under and over it.
pub struct Screen<'a> {
    pub cols: u16,
    pub rows: u16,
    /// Rows of `cols` cells given to the picture; the rest hold the HUD.
    pub picture_rows: u16,
    pub surface: &'a Surface,
    pub hud: &'a str,
    pub popup: Option<&'a str>,
}

impl Screen<'_> {
    pub fn hud_rows(&self) -> u16 {
        self.rows.saturating_sub(self.picture_rows)
    }
}

pub trait Presenter {
    fn name(&self) -> &'static str;
    /// Pixel size the presenter wants for a `cols`×`rows` cell area.
    fn surface_size(&self, cols: u16, rows: u16) -> (usize, usize);
    fn present(&mut self, screen: &Screen<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Centered text box over the picture. The first line is the title.
pub fn draw_popup(out: &mut dyn Write, cols: u16, rows: u16, text: &str) -> anyhow::Result<()> {
    let (cols, rows) = (cols as usize, rows as usize);
    if text.trim().is_empty() || cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_w = cols.saturating_sub(6).max(1);
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let chars: Vec<char> = raw.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
        }
        for chunk in chars.chunks(max_w) {
            lines.push(chunk.iter().collect());
        }
    }

    let inner_w = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, max_w);
    let box_w = (inner_w + 4).min(cols.saturating_sub(2)).max(4);
    let inner_w = box_w - 4;
    let body_h = lines.len().min(rows.saturating_sub(3).max(1));
    let box_h = body_h + 2;

    let left = (cols - box_w) / 2 + 1;
    let top = rows.saturating_sub(box_h) / 2 + 1;
    let edge = "-".repeat(box_w - 2);

    out.write_all(b"\x1b[0m\x1b[38;2;236;242;255m\x1b[48;2;10;14;24m")?;
    write!(out, "\x1b[{top};{left}H+{edge}+")?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = top + 1 + i;
        write!(out, "\x1b[{row};{left}H| {:<inner_w$} |", line)?;
        if i == 0 {
            write!(out, "\x1b[{row};{}H\x1b[1m{line}\x1b[22m", left + 2)?;
        }
    }
    write!(out, "\x1b[{};{left}H+{edge}+", top + box_h - 1)?;
    out.write_all(b"\x1b[0m")?;
    Ok(())
}
