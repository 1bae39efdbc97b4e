use crate::app::{InputMode, InputState};
use crate::links;
use crate::model::{ScannerPhase, View};
use crate::session::SessionController;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

const APP_TITLE: &str = "BELLASTER  ";

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    good: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 10, 10),
    panel_bg: Color::Rgb(24, 24, 24),
    border: Color::Rgb(96, 96, 96),
    text: Color::Rgb(240, 240, 240),
    muted: Color::Rgb(150, 150, 150),
    accent: Color::Rgb(249, 115, 22),
    alert: Color::Rgb(248, 113, 113),
    good: Color::Rgb(74, 222, 128),
};

pub fn draw(frame: &mut Frame, controller: &SessionController, input: &InputState) {
    let colors = PALETTE;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let state = controller.state();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(state.view.label(), Style::default().fg(colors.text)),
        Span::styled("  |  camera: ", Style::default().fg(colors.muted)),
        Span::styled(
            state.scanner_phase.label(),
            Style::default().fg(phase_color(state.scanner_phase, &colors)),
        ),
    ]))
    .block(panel_block("Music guessing game", &colors));
    frame.render_widget(header, vertical[0]);

    match state.view {
        View::Home => draw_home(frame, vertical[1], &colors),
        View::Game => draw_game(frame, vertical[1], controller, &colors),
        View::Creator => draw_creator(frame, vertical[1], controller, input, &colors),
    }

    let footer_text = if input.mode == InputMode::Command {
        format!(":{}", input.buffer)
    } else {
        controller.status.clone()
    };
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(key_hints(state.view), Style::default().fg(colors.muted)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(footer_text, Style::default().fg(colors.text)),
    ]))
    .block(panel_block("Message", &colors));
    frame.render_widget(footer, vertical[2]);

    if controller.is_scanning() && state.view == View::Game {
        draw_scanner_overlay(frame, controller, &colors);
    }
}

fn key_hints(view: View) -> &'static str {
    match view {
        View::Home => "g play, c make cards, l copy login link, : command, q quit",
        View::Game => {
            "s scan, x stop, v reveal, n next card, a rescan, y copy player link, Esc back"
        }
        View::Creator => "type or paste a link, Enter generate, Ctrl+Y copy image link, Esc back",
    }
}

fn phase_color(phase: ScannerPhase, colors: &Palette) -> Color {
    match phase {
        ScannerPhase::Idle | ScannerPhase::Stopped => colors.muted,
        ScannerPhase::Starting | ScannerPhase::Running => colors.accent,
        ScannerPhase::Error => colors.alert,
    }
}

fn draw_home(frame: &mut Frame, area: Rect, colors: &Palette) {
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(
                "BELLA",
                Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "STER",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            "BIRTHDAY EDITION",
            Style::default().fg(colors.muted),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "[g] START GAME",
            Style::default().fg(colors.accent),
        )),
        Line::from(Span::styled(
            "[l] CONNECT STREAMING ACCOUNT",
            Style::default().fg(colors.good),
        )),
        Line::from(Span::styled(
            "Full tracks need a one-time login in your browser.",
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            "[c] MAKE CARDS",
            Style::default().fg(colors.text),
        )),
    ];
    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(panel_block("Home", colors));
    frame.render_widget(body, area);
}

fn draw_game(frame: &mut Frame, area: Rect, controller: &SessionController, colors: &Palette) {
    let state = controller.state();
    let mut lines = Vec::new();

    match &state.current_track {
        Some(track) if state.revealed => {
            lines.push(Line::from(Span::styled(
                "Was that the right answer?",
                Style::default().fg(colors.good).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled("Track: ", Style::default().fg(colors.muted)),
                Span::styled(links::track_url(track), Style::default().fg(colors.text)),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Player: ", Style::default().fg(colors.muted)),
                Span::styled(links::embed_url(track), Style::default().fg(colors.text)),
            ]));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "[n] next card",
                Style::default().fg(colors.accent),
            )));
        }
        Some(_) => {
            lines.push(Line::from(Span::styled(
                "MYSTERY TRACK LOADED",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Press y to copy the player link and listen. Guess the song!",
                Style::default().fg(colors.text),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "[v] REVEAL",
                Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                "[a] scan again",
                Style::default().fg(colors.muted),
            )));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "DRAW A CARD",
                Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                "and scan its QR code to start",
                Style::default().fg(colors.muted),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "[s] SCAN",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            )));
            if let Some(message) = &state.scan_error_message {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    message.as_str(),
                    Style::default().fg(colors.alert),
                )));
            }
        }
    }

    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(panel_block("In game", colors));
    frame.render_widget(body, area);
}

fn draw_scanner_overlay(frame: &mut Frame, controller: &SessionController, colors: &Palette) {
    let popup = centered_rect(frame.area(), 60, 40);
    frame.render_widget(Clear, popup);

    let state = controller.state();
    let mut lines = vec![
        Line::from(Span::styled(
            "LOOKING FOR A CODE...",
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("decoder: {}", controller.device_name()),
            Style::default().fg(colors.muted),
        )),
    ];
    if let Some(message) = &state.scan_error_message {
        lines.push(Line::from(Span::styled(
            message.as_str(),
            Style::default().fg(colors.alert),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Esc] CANCEL",
        Style::default().fg(colors.accent),
    )));

    let overlay = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(panel_block("Scanner", colors));
    frame.render_widget(overlay, popup);
}

fn draw_creator(
    frame: &mut Frame,
    area: Rect,
    controller: &SessionController,
    input: &InputState,
    colors: &Palette,
) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let field = Paragraph::new(Span::styled(
        format!("{}_", input.buffer),
        Style::default().fg(colors.text),
    ))
    .block(panel_block("Track link", colors));
    frame.render_widget(field, sections[0]);

    let result = match &controller.state().generated_card_image {
        Some(url) => vec![
            Line::from(Span::styled(
                "Card image (open it and print):",
                Style::default().fg(colors.good),
            )),
            Line::from(Span::styled(url.as_str(), Style::default().fg(colors.text))),
        ],
        None => vec![Line::from(Span::styled(
            "Paste a track link and save the generated code.",
            Style::default().fg(colors.muted),
        ))],
    };
    let body = Paragraph::new(result)
        .wrap(Wrap { trim: false })
        .block(panel_block("Card factory", colors));
    frame.render_widget(body, sections[1]);
}

fn panel_block<'a>(title: &'a str, colors: &Palette) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(colors.border))
        .style(Style::default().bg(colors.panel_bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
