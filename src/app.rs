use crate::builtin::{builtin_presets, find_preset};
use crate::capture::AudioCapture;
use crate::config::{Config, RenderConfig};
use crate::preset::Preset;
use crate::scheduler::FrameScheduler;
use crate::term::{HalfBlockPresenter, MIN_COLS, MIN_ROWS, Presenter, Screen, TerminalGuard};
use crate::visualizer::Visualizer;
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::fmt::Write as _;
use std::io::BufWriter;
use std::time::{Duration, Instant};

const HUD_ROWS: u16 = 2;
/// Upper bound on one idle wait so key presses stay responsive.
const MAX_IDLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    Next,
    Prev,
    Cut,
    ToggleBlur,
    ToggleHud,
    ToggleHelp,
    None,
}

fn key_action(code: KeyCode, mods: KeyModifiers) -> Action {
    match code {
        KeyCode::Char('c') if mods.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('n') | KeyCode::Right => Action::Next,
        KeyCode::Char('p') | KeyCode::Left => Action::Prev,
        KeyCode::Char('c') => Action::Cut,
        KeyCode::Char('b') => Action::ToggleBlur,
        KeyCode::Char('h') => Action::ToggleHud,
        KeyCode::Char('?') | KeyCode::F(1) => Action::ToggleHelp,
        _ => Action::None,
    }
}

fn help_text() -> &'static str {
    "warpviz keys\n\
     \n\
     n / right  next preset (blended)\n\
     p / left   previous preset (blended)\n\
     c          cut to next preset\n\
     b          toggle blur passes\n\
     h          toggle HUD\n\
     ?          toggle this help\n\
     q / esc    quit"
}

fn picture_rows(rows: u16, show_hud: bool) -> u16 {
    let hud = if show_hud { HUD_ROWS } else { 0 };
    rows.saturating_sub(hud).max(1)
}

fn fits(size: (u16, u16)) -> bool {
    size.0 >= MIN_COLS && size.1 >= MIN_ROWS
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let mut render_cfg: RenderConfig = cfg.render_config().context("invalid configuration")?;
    let presets = builtin_presets();
    let mut index = cfg
        .preset
        .as_deref()
        .and_then(|q| find_preset(&presets, q))
        .unwrap_or(0);
    let blend = cfg.blend_duration().context("invalid configuration")?;

    let mut capture = AudioCapture::open(cfg.source, cfg.device.as_deref())
        .with_context(|| format!("start audio (source={:?})", cfg.source))?;
    if let (Some(c), None) = (&capture, cfg.sample_rate_hint) {
        render_cfg.sample_rate = c.sample_rate_hz;
    }

    let term = TerminalGuard::enter()?;
    let mut out = BufWriter::new(term.writer());
    let mut presenter = HalfBlockPresenter::new(!cfg.no_sync);

    let mut size = term.size()?;
    let mut show_hud = true;
    let mut show_help = false;
    let (w, h) = presenter.surface_size(size.0, picture_rows(size.1, show_hud));
    let mut viz = Visualizer::new(render_cfg, w, h).context("build renderer")?;
    viz.load_preset(&presets[index], Duration::ZERO, Instant::now())
        .with_context(|| format!("load preset '{}'", presets[index].name))?;

    let mut scheduler = FrameScheduler::new(cfg.fps, cfg.max_catch_up);
    let mut fps = FpsCounter::new();
    let mut notice = String::new();

    loop {
        while event::poll(Duration::ZERO)? {
            let mut relayout = false;
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    match key_action(k.code, k.modifiers) {
                        Action::Quit => return Ok(()),
                        Action::Next => {
                            index = (index + 1) % presets.len();
                            switch(&mut viz, &presets[index], blend, &mut notice);
                        }
                        Action::Prev => {
                            index = (index + presets.len() - 1) % presets.len();
                            switch(&mut viz, &presets[index], blend, &mut notice);
                        }
                        Action::Cut => {
                            index = (index + 1) % presets.len();
                            switch(&mut viz, &presets[index], Duration::ZERO, &mut notice);
                        }
                        Action::ToggleBlur => {
                            let on = viz.toggle_blur();
                            notice = format!("blur {}", if on { "on" } else { "off" });
                        }
                        Action::ToggleHud => {
                            show_hud = !show_hud;
                            relayout = true;
                        }
                        Action::ToggleHelp => show_help = !show_help,
                        Action::None => {}
                    }
                }
                Event::Resize(c, r) => {
                    size = (c, r);
                    relayout = true;
                }
                _ => {}
            }
            if relayout && fits(size) {
                let (w, h) = presenter.surface_size(size.0, picture_rows(size.1, show_hud));
                viz.resize(w, h);
            }
        }

        let now = Instant::now();
        let due = scheduler.tick(now);
        if due > 0 && fits(size) {
            let windows = capture.as_mut().map(|c| c.windows(viz.window_len()));
            let step = scheduler.interval();
            for i in (0..due).rev() {
                let at = now.checked_sub(step * i).unwrap_or(now);
                viz.render(at, windows.as_ref());
            }
            fps.tick(now);

            let hud = if show_hud {
                build_hud(&viz, size.0 as usize, fps.fps(), &notice)
            } else {
                String::new()
            };
            let screen = Screen {
                cols: size.0,
                rows: size.1,
                picture_rows: picture_rows(size.1, show_hud),
                surface: viz.output(),
                hud: &hud,
                popup: show_help.then(help_text),
            };
            presenter.present(&screen, &mut out)?;
        }

        let wait = scheduler.time_until_next(Instant::now()).min(MAX_IDLE);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

fn switch(viz: &mut Visualizer, preset: &Preset, blend: Duration, notice: &mut String) {
    let blend = preset
        .base
        .blend_hint
        .filter(|_| !blend.is_zero())
        .and_then(|s| Duration::try_from_secs_f32(s).ok())
        .unwrap_or(blend);
    notice.clear();
    if let Err(e) = viz.load_preset(preset, blend, Instant::now()) {
        let _ = write!(notice, "rejected: {e}");
    }
}

fn build_hud(viz: &Visualizer, cols: usize, fps: f32, notice: &str) -> String {
    let name = viz.current_name().unwrap_or("<none>");
    let backend = viz
        .current_backend()
        .map(|k| k.label())
        .unwrap_or("-");
    let mut hud = String::new();
    let _ = write!(hud, "{name} | {backend} [{}] | {}", viz.backend_status(), viz.state());
    if viz.compositor().is_blending() {
        let _ = write!(hud, " {:>3.0}%", viz.mix() * 100.0);
    }
    let _ = write!(hud, " | {fps:>5.1} fps");
    hud.push('\n');
    if notice.is_empty() {
        hud.push_str("n/p switch  c cut  b blur  h hud  ? help  q quit");
    } else {
        hud.push_str(notice);
    }
    hud.lines()
        .map(|l| l.chars().take(cols).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

struct FpsCounter {
    since: Option<Instant>,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            since: None,
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self, now: Instant) {
        let since = *self.since.get_or_insert(now);
        self.frames += 1;
        let dt = now.saturating_duration_since(since).as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.since = Some(now);
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(key_action(KeyCode::Char('q'), KeyModifiers::NONE), Action::Quit);
        assert_eq!(key_action(KeyCode::Char('c'), KeyModifiers::CONTROL), Action::Quit);
        assert_eq!(key_action(KeyCode::Char('c'), KeyModifiers::NONE), Action::Cut);
        assert_eq!(key_action(KeyCode::Char('x'), KeyModifiers::NONE), Action::None);
    }

    #[test]
    fn hud_takes_two_rows_when_shown() {
        assert_eq!(picture_rows(24, true), 22);
        assert_eq!(picture_rows(24, false), 24);
        assert_eq!(picture_rows(1, true), 1);
    }
}
