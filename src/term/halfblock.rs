use std::io::Write;

use super::{Presenter, Screen, draw_popup};

const UPPER_HALF: char = '\u{2580}';

/// Two pixels per cell: foreground paints the top half, background the bottom.
#[derive(Debug, Default)]
pub struct HalfBlockPresenter {
    fg: Option<[u8; 3]>,
    bg: Option<[u8; 3]>,
    sync_updates: bool,
}

impl HalfBlockPresenter {
    pub fn new(sync_updates: bool) -> Self {
        Self {
            sync_updates,
            ..Self::default()
        }
    }
}

impl Presenter for HalfBlockPresenter {
    fn name(&self) -> &'static str {
        "halfblock"
    }

    fn surface_size(&self, cols: u16, rows: u16) -> (usize, usize) {
        (cols as usize, rows as usize * 2)
    }

    fn present(&mut self, screen: &Screen<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let cols = screen.cols as usize;
        let rows = screen.picture_rows as usize;
        let s = screen.surface;
        if cols == 0 || rows == 0 || s.dims() != self.surface_size(screen.cols, screen.picture_rows) {
            return Ok(());
        }

        if self.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }
        // Autowrap off while painting full-width rows.
        out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
        self.fg = None;
        self.bg = None;

        for row in 0..rows {
            for x in 0..cols {
                let [tr, tg, tb, _] = s.get(x, row * 2);
                let [br, bg, bb, _] = s.get(x, row * 2 + 1);
                let (top, bottom) = ([tr, tg, tb], [br, bg, bb]);
                if self.fg != Some(top) {
                    write!(out, "\x1b[38;2;{tr};{tg};{tb}m")?;
                    self.fg = Some(top);
                }
                if self.bg != Some(bottom) {
                    write!(out, "\x1b[48;2;{br};{bg};{bb}m")?;
                    self.bg = Some(bottom);
                }
                write!(out, "{UPPER_HALF}")?;
            }
            out.write_all(b"\r\n")?;
        }

        let mut hud = screen.hud.lines();
        for i in 0..screen.hud_rows() as usize {
            write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", rows + i + 1)?;
            if let Some(line) = hud.next() {
                let clipped: String = line.chars().take(cols).collect();
                write!(out, "{clipped}")?;
            }
        }

        if let Some(text) = screen.popup {
            draw_popup(out, screen.cols, screen.rows, text)?;
        }

        out.write_all(b"\x1b[?7h")?;
        if self.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Surface;

    #[test]
    fn paints_one_glyph_per_cell_and_the_hud() {
        let mut surface = Surface::new(2, 2);
        surface.put(0, 0, [255.0, 0.0, 0.0]);
        let screen = Screen {
            cols: 2,
            rows: 2,
            picture_rows: 1,
            surface: &surface,
            hud: "ok",
            popup: None,
        };
        let mut out = Vec::new();
        HalfBlockPresenter::new(false)
            .present(&screen, &mut out)
            .expect("present");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.matches(UPPER_HALF).count(), 2);
        assert!(text.contains("\x1b[38;2;255;0;0m"));
        assert!(text.contains("ok"));
    }
}
