use crate::app::{AppCommand, AppEvent, AppState};
use anyhow::{anyhow, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::time::Duration;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver, UnboundedSender};

const HELP: &str =
    "Tab/↑↓ move · Enter generate · Ctrl-E export MIDI · Ctrl-N new song · PgUp/PgDn scroll · Esc quit";

enum KeyAction {
    Quit,
    Send(AppCommand),
    Nothing,
}

pub fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut AppState,
    event_rx: &mut UnboundedReceiver<AppEvent>,
    command_tx: UnboundedSender<AppCommand>,
) -> Result<()> {
    loop {
        loop {
            match event_rx.try_recv() {
                Ok(event) => app.handle_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(anyhow!("background worker stopped unexpectedly"))
                }
            }
        }
        if app.in_flight() {
            app.tick();
        }

        terminal.draw(|frame| draw(frame, app))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match handle_key(app, key) {
            KeyAction::Quit => break,
            KeyAction::Send(command) => {
                command_tx
                    .send(command)
                    .map_err(|_| anyhow!("background worker is no longer accepting commands"))?;
            }
            KeyAction::Nothing => {}
        }
    }
    Ok(())
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => KeyAction::Quit,
            KeyCode::Char('g') => app.submit().map_or(KeyAction::Nothing, KeyAction::Send),
            KeyCode::Char('e') => {
                app.prepare_midi_export().map_or(KeyAction::Nothing, KeyAction::Send)
            }
            KeyCode::Char('n') => {
                app.reset();
                KeyAction::Nothing
            }
            _ => KeyAction::Nothing,
        };
    }

    match key.code {
        KeyCode::Esc => return KeyAction::Quit,
        KeyCode::Enter => return app.submit().map_or(KeyAction::Nothing, KeyAction::Send),
        KeyCode::Tab | KeyCode::Down => app.focus_next(),
        KeyCode::BackTab | KeyCode::Up => app.focus_previous(),
        KeyCode::PageDown => app.scroll_output(10),
        KeyCode::PageUp => app.scroll_output(-10),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Char(ch) => app.insert_char(ch),
        _ => {}
    }
    KeyAction::Nothing
}

fn draw(frame: &mut Frame, app: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(1)])
        .split(frame.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(app.fields().count() as u16 + 2), Constraint::Min(4)])
        .split(columns[0]);

    draw_form(frame, app, left[0]);
    draw_status(frame, app, left[1]);
    draw_output(frame, app, columns[1]);

    frame.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        rows[1],
    );
}

fn draw_form(frame: &mut Frame, app: &AppState, area: Rect) {
    let focused = app.focused();
    let lines: Vec<Line> = app
        .fields()
        .map(|(field, value)| {
            let is_focused = field == focused;
            let label_style = if is_focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let value_span = match (value.is_empty(), is_focused) {
                (true, true) => Span::styled("▏", Style::default().fg(Color::Cyan)),
                (true, false) => Span::styled(field.hint(), Style::default().fg(Color::DarkGray)),
                (false, true) => Span::raw(format!("{value}▏")),
                (false, false) => Span::raw(value.to_string()),
            };
            Line::from(vec![Span::styled(format!("{:<14}", field.label()), label_style), value_span])
        })
        .collect();

    let block = Block::default()
        .title("Song brief")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame, app: &AppState, area: Rect) {
    let mut lines: Vec<Line> = app.status_lines.iter().map(|line| Line::raw(line.as_str())).collect();
    if app.in_flight() {
        lines.push(Line::styled(
            format!("{} Writing your song...", app.spinner()),
            Style::default().fg(Color::Yellow),
        ));
    } else if lines.is_empty() {
        lines.push(Line::raw("Fill in what you like and press Enter."));
    }
    let block = Block::default().title("Status").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn draw_output(frame: &mut Frame, app: &AppState, area: Rect) {
    let title = match app.session() {
        Some(session) => format!("Song · {}", session.generated_at.format("%H:%M:%S")),
        None => "Song".to_string(),
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    frame.render_widget(
        Paragraph::new(app.output())
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((app.output_scroll(), 0)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::FormField;
    use crate::config::AppConfig;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn typing_edits_the_focused_field() {
        let mut app = AppState::new(AppConfig::default(), None);
        handle_key(&mut app, press(KeyCode::Char('j'), KeyModifiers::NONE));
        handle_key(&mut app, press(KeyCode::Char('a'), KeyModifiers::SHIFT));
        handle_key(&mut app, press(KeyCode::Backspace, KeyModifiers::NONE));
        handle_key(&mut app, press(KeyCode::Tab, KeyModifiers::NONE));
        handle_key(&mut app, press(KeyCode::Char('z'), KeyModifiers::NONE));

        assert_eq!(app.value(FormField::Genre), "j");
        assert_eq!(app.value(FormField::Mood), "z");
    }

    #[test]
    fn enter_sends_one_generate_command_at_a_time() {
        let mut app = AppState::new(AppConfig::default(), None);
        let first = handle_key(&mut app, press(KeyCode::Enter, KeyModifiers::NONE));
        assert!(matches!(first, KeyAction::Send(AppCommand::Generate { .. })));
        let second = handle_key(&mut app, press(KeyCode::Char('g'), KeyModifiers::CONTROL));
        assert!(matches!(second, KeyAction::Nothing));
    }

    #[test]
    fn control_keys_quit_and_export() {
        let mut app = AppState::new(AppConfig::default(), None);
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Char('e'), KeyModifiers::CONTROL)),
            KeyAction::Nothing
        ));
        assert!(app.output().contains("Generate a song first"));
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Quit
        ));
        assert!(matches!(handle_key(&mut app, press(KeyCode::Esc, KeyModifiers::NONE)), KeyAction::Quit));
    }
}
