use crate::client::{AppSnapshot, format_units};
use crate::config::{ENTRY_FEE, MIN_PARTICIPANTS};
use color_eyre::eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

pub enum UserEvent {
    Quit,
    Refresh,
    NextRaffle,
    PrevRaffle,
    Create,
    ConfirmJoin,
    ConfirmPickWinner,
    Redraw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tab {
    All,
    Mine,
    Joined,
    Winners,
}

impl Tab {
    fn next(self) -> Tab {
        match self {
            Tab::All => Tab::Mine,
            Tab::Mine => Tab::Joined,
            Tab::Joined => Tab::Winners,
            Tab::Winners => Tab::All,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Tab::All => "All Raffles",
            Tab::Mine => "My Raffles",
            Tab::Joined => "Joined",
            Tab::Winners => "Winners",
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    JoinModal,
    PickModal,
    QuitModal,
}

pub struct UiState {
    mode: Mode,
    tab: Tab,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::default(),
            tab: Tab::All,
            terminal: None,
        }
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // One persistent Terminal so buffers survive across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub async fn next_event(state: &mut UiState) -> Result<UserEvent> {
    loop {
        if !event::poll(Duration::from_millis(10))? {
            // Yield to the runtime so timers and the event feed make progress.
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        }
        let Event::Key(k) = event::read()? else { continue };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        match &state.mode {
            Mode::JoinModal => match k.code {
                KeyCode::Esc | KeyCode::Char('n') => { state.mode = Mode::Normal; return Ok(UserEvent::Redraw); }
                KeyCode::Enter | KeyCode::Char('y') => { state.mode = Mode::Normal; return Ok(UserEvent::ConfirmJoin); }
                _ => {}
            },
            Mode::PickModal => match k.code {
                KeyCode::Esc | KeyCode::Char('n') => { state.mode = Mode::Normal; return Ok(UserEvent::Redraw); }
                KeyCode::Enter | KeyCode::Char('y') => { state.mode = Mode::Normal; return Ok(UserEvent::ConfirmPickWinner); }
                _ => {}
            },
            Mode::QuitModal => match k.code {
                KeyCode::Esc | KeyCode::Char('n') => { state.mode = Mode::Normal; return Ok(UserEvent::Redraw); }
                KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('q') => return Ok(UserEvent::Quit),
                _ => {}
            },
            Mode::Normal => match k.code {
                KeyCode::Char('q') => { state.mode = Mode::QuitModal; return Ok(UserEvent::Redraw); }
                KeyCode::Tab => { state.tab = state.tab.next(); return Ok(UserEvent::Redraw); }
                KeyCode::Up | KeyCode::Char('k') => return Ok(UserEvent::PrevRaffle),
                KeyCode::Down | KeyCode::Char('j') => return Ok(UserEvent::NextRaffle),
                KeyCode::Char('r') => return Ok(UserEvent::Refresh),
                KeyCode::Char('c') => return Ok(UserEvent::Create),
                KeyCode::Char('e') => { state.mode = Mode::JoinModal; return Ok(UserEvent::Redraw); }
                KeyCode::Char('w') => { state.mode = Mode::PickModal; return Ok(UserEvent::Redraw); }
                _ => {}
            },
        }
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    match state.tab {
        Tab::Winners => draw_winners(f, state, chunks[1], snap),
        _ => draw_raffles(f, state, chunks[1], snap),
    }
    draw_bottom(f, chunks[2], snap);
    draw_modals(f, state, snap);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let loading = if snap.loading { " (loading...)" } else { "" };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", snap.account.short()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(format!("| {} ", snap.network)),
        Span::raw(format!("| fee {} ", format_units(ENTRY_FEE))),
        Span::styled(
            format!("| {}{loading}", snap.status),
            Style::default().fg(Color::Yellow),
        ),
    ]);
    let block = Block::default().borders(Borders::ALL).title(" raffle ");
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_raffles(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let rows: Vec<Row> = snap
        .raffles
        .iter()
        .enumerate()
        .filter(|(_, raffle)| match state.tab {
            Tab::All | Tab::Winners => true,
            Tab::Mine => snap.my_raffles.contains(&raffle.id),
            Tab::Joined => snap.joined_raffles.contains(&raffle.id),
        })
        .map(|(index, raffle)| {
            let state_text = if raffle.has_winner {
                "drawn"
            } else if raffle.is_open {
                "open"
            } else {
                "closed"
            };
            let winner = raffle
                .winner
                .map(|w| w.short())
                .unwrap_or_else(|| "-".to_string());
            let mut row = Row::new(vec![
                truncate(&raffle.id.to_string(), 16),
                truncate(&raffle.owner.short(), 14),
                format!("{}", raffle.entrant_count),
                format_units(raffle.pool_value),
                state_text.to_string(),
                winner,
            ]);
            if index == snap.selected {
                row = row.style(Style::default().bg(Color::DarkGray).fg(Color::White));
            }
            row
        })
        .collect();

    let empty = rows.is_empty();
    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(16),
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Min(14),
        ],
    )
    .header(
        Row::new(vec!["id", "owner", "entrants", "pool", "state", "winner"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", state.tab.title())),
    );
    f.render_widget(table, area);

    if empty {
        let message = Paragraph::new("no raffles here yet - press 'c' to create one")
            .style(Style::default().fg(Color::DarkGray));
        let inner = Rect {
            x: area.x + 2,
            y: area.y + 2,
            width: area.width.saturating_sub(4),
            height: 1,
        };
        f.render_widget(message, inner);
    }
}

fn draw_winners(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let lines: Vec<Line> = if snap.winners.is_empty() {
        vec![Line::from(Span::styled(
            "no winners announced yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        snap.winners
            .iter()
            .map(|winner| {
                let when = winner
                    .timestamp_ms
                    .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms as i64))
                    .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                Line::from(vec![
                    Span::styled("* ", Style::default().fg(Color::Green)),
                    Span::raw(format!(
                        "{} won {} from raffle {} at {}",
                        winner.winner.short(),
                        format_units(winner.prize_amount),
                        winner.raffle_id.short(),
                        when,
                    )),
                ])
            })
            .collect()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", state.tab.title()));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![Line::from(Span::styled(
        "tab: switch view | up/down: select | c: create | e: enter | w: draw winner | r: refresh | q: quit",
        Style::default().fg(Color::DarkGray),
    ))];
    if let Some(error) = snap.errors.first() {
        lines.push(Line::from(Span::styled(
            truncate(error, area.width.saturating_sub(4) as usize),
            Style::default().fg(Color::Red),
        )));
    }
    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    let (title, body) = match state.mode {
        Mode::Normal => return,
        Mode::JoinModal => {
            let target = snap
                .raffles
                .get(snap.selected)
                .map(|raffle| raffle.id.short())
                .unwrap_or_else(|| "-".to_string());
            (
                " join raffle ",
                format!(
                    "Pay {} to enter raffle {}?\n\n[y/Enter] confirm   [n/Esc] cancel",
                    format_units(ENTRY_FEE),
                    target,
                ),
            )
        }
        Mode::PickModal => {
            let target = snap
                .raffles
                .get(snap.selected)
                .map(|raffle| raffle.id.short())
                .unwrap_or_else(|| "-".to_string());
            (
                " draw winner ",
                format!(
                    "Draw the winner for raffle {}?\nRequires at least {} entrants; owner only.\n\n[y/Enter] confirm   [n/Esc] cancel",
                    target, MIN_PARTICIPANTS,
                ),
            )
        }
        Mode::QuitModal => (" quit ", String::from("Leave the raffle client?\n\n[y/Enter] quit   [n/Esc] stay")),
    };

    let popup = centered_rect(50, 30, f.area());
    f.render_widget(Clear, popup);
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(Paragraph::new(body).wrap(Wrap { trim: true }).block(block), popup);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn truncate(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + 1 >= max_width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}
