use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::grid::draw_grid;
use super::mode::TuiState;
use crate::shared::DisplayState;

const HELP: &str =
    "enter toggle  p paint  d division  c/v chord  t r o b m chord opts  spc play  a all  s stop  g seek  +/- bpm  [/] bars  X clear  q quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // channels + transport
            Constraint::Min(8),    // grid
            Constraint::Length(3), // chord + status
            Constraint::Length(1), // key help
        ])
        .split(area);

    draw_header(frame, sections[0], state);
    draw_grid(frame, sections[1], state, ts);
    draw_footer(frame, sections[2], state, ts);
    frame.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        sections[3],
    );
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut spans: Vec<Span> = Vec::new();
    for (i, name) in state.channel_names.iter().enumerate() {
        let style = if i == state.selected_channel {
            Style::default().fg(Color::Black).bg(Color::LightMagenta).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {name} "), style));
        spans.push(Span::raw(" "));
    }
    if !state.channel_ready {
        spans.push(Span::styled("(loading) ", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::raw(format!(
        "| {} | {:.0} bpm | {} bars | {}",
        state.playing_label, state.bpm, state.measures, state.position_label
    )));

    let block = Block::default().borders(Borders::ALL).title(" gridtty ");
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let beat = ts.step / crate::shared::STEPS_PER_BEAT;
    let division = state.divisions.get(beat).copied().unwrap_or(1);
    let text = format!(
        "chord {} | step {} beat {} /{} | {}",
        state.chord_label,
        ts.step + 1,
        beat + 1,
        division,
        state.status
    );
    let block = Block::default().borders(Borders::ALL);
    frame.render_widget(Paragraph::new(text).block(block), area);
}
