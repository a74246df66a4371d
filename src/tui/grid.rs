use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::mode::TuiState;
use crate::shared::{CellState, DisplayState, STEPS_PER_BEAT};

const LABEL_WIDTH: u16 = 6;

/// First index of a `visible`-wide window over `len` items that keeps `focus` in view.
fn window_start(focus: usize, visible: usize, len: usize) -> usize {
    if len <= visible {
        return 0;
    }
    focus.saturating_sub(visible / 2).min(len - visible)
}

pub fn draw_grid(frame: &mut Frame, area: Rect, ds: &DisplayState, ts: &TuiState) {
    let block = Block::default().borders(Borders::ALL).title(" grid ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let total = ds.slot_starts.len();
    let visible_rows = inner.height as usize;
    let visible_steps = inner.width.saturating_sub(LABEL_WIDTH) as usize;
    if visible_rows == 0 || visible_steps == 0 {
        return;
    }

    let first_row = window_start(ts.row, visible_rows, ds.rows.len());
    let first_step = window_start(ts.step, visible_steps, total);
    let last_step = (first_step + visible_steps).min(total);

    let lines: Vec<Line> = ds
        .rows
        .iter()
        .enumerate()
        .skip(first_row)
        .take(visible_rows)
        .map(|(row_idx, row)| {
            let mut spans = vec![Span::styled(
                format!("{:>5} ", row.label),
                Style::default().fg(Color::Gray),
            )];
            for step in first_step..last_step {
                let slot = ds.slot_starts[step];
                let (glyph, mut style) = match row.cells[step] {
                    CellState::On => ("█", Style::default().fg(Color::LightMagenta)),
                    CellState::Hidden => ("·", Style::default().fg(Color::DarkGray)),
                    CellState::Off if slot && step % STEPS_PER_BEAT == 0 => ("┆", Style::default().fg(Color::DarkGray)),
                    CellState::Off if slot => ("-", Style::default().fg(Color::DarkGray)),
                    CellState::Off => (" ", Style::default()),
                };
                if ds.cursor_step == Some(step) {
                    style = style.bg(Color::Rgb(60, 60, 20));
                }
                if row_idx == ts.row && step == ts.step {
                    style = style.bg(Color::Blue).add_modifier(Modifier::BOLD);
                    if ts.paint.is_some() {
                        style = style.bg(Color::Magenta);
                    }
                }
                spans.push(Span::styled(glyph, style));
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}
