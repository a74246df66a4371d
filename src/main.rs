use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use gridtty::audio::{self, AudioHandle};
use gridtty::middle::Middle;
use gridtty::pipeline::persistence;
use gridtty::shared::InputEvent;
use gridtty::tui;
use gridtty::voices::VoiceRegistry;

const FALLBACK_SAMPLE_RATE: u32 = 44100;
const LOOKAHEAD_SECONDS: f64 = 0.05; // ticks are scheduled this far ahead of now
const MAX_LATENESS_SECONDS: f64 = 0.25; // older ticks are dropped after a stall

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// the terminal is ours while running, so logs go to <project>/.gridtty/gridtty.log
fn init_logging(project_dir: &Path) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    let log_path = persistence::project_file_path(project_dir).with_file_name("gridtty.log");
    let file = log_path
        .parent()
        .and_then(|dir| std::fs::create_dir_all(dir).ok())
        .and_then(|_| File::create(&log_path).ok());
    if let Some(file) = file {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&project_dir);

    let state = persistence::load_project(&project_dir).unwrap_or_default();

    let audio = audio::start_audio().unwrap_or_else(|e| {
        log::warn!("no audio output ({e:#}), running silent");
        AudioHandle::silent(FALLBACK_SAMPLE_RATE)
    });
    let voices = VoiceRegistry::from_specs(&state.channels, &project_dir, &audio.sender());
    let mut middle = Middle::new(state, voices, LOOKAHEAD_SECONDS).with_max_lateness(MAX_LATENESS_SECONDS);

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    let mut last_tick = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let ds = middle.display_state();
        tui_state.sync(&ds);

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state, &ds)?;
        for event in events {
            if event == InputEvent::Quit {
                middle.handle_input(event);
                // save before quitting
                if let Err(e) = persistence::save_project(&project_dir, &middle.state) {
                    log::warn!("could not save project: {e:#}");
                }
                term.clear()?;
                return Ok(());
            }
            middle.handle_input(event);
        }

        let elapsed = last_tick.elapsed().as_secs_f64();
        last_tick = Instant::now();
        middle.tick(elapsed);
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
