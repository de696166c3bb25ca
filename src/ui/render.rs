use chrono::Local;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;

use crate::ui::app::{App, AppState};

pub fn draw(app: &App, f: &mut Frame) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(1),
            ]
            .as_ref(),
        )
        .split(size);

    // Status bar
    let status = match &app.state {
        AppState::Dashboard => {
            let link = if app.online { "online" } else { "offline" };
            let queued = app.queued_actions().len();
            match app.active_session() {
                Some(session) => {
                    let elapsed = session.elapsed_seconds(Local::now());
                    let on_break = app.current_breaks().iter().any(|b| b.is_open());
                    let break_note = if on_break { " (on break)" } else { "" };
                    let sync_note = if session.id.is_pending() { " [not yet synced]" } else { "" };
                    format!(
                        "Timed in since {} - {}h {}m{}{} | {} | {} queued | [o] Time Out [b/e] Break [s] Sync [l] Logs [q] Quit",
                        session.start_time.format("%H:%M"),
                        elapsed / 3600,
                        (elapsed % 3600) / 60,
                        break_note,
                        sync_note,
                        link,
                        queued
                    )
                }
                None => format!(
                    "Not timed in | {} | {} queued | [i] Time In [s] Sync [u] Clean Up [l] Logs [q] Quit",
                    link, queued
                ),
            }
        }
        AppState::ViewingLogs => "Viewing Logs - Press any key to return".to_string(),
        AppState::Input { prompt, buffer, .. } => format!("{}: {}_", prompt, buffer),
    };

    let status_widget = Paragraph::new(status)
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status_widget, chunks[0]);

    // Progress toward the required OJT hours
    let ratio = if app.required_hours > 0.0 {
        (app.logged_hours / app.required_hours).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("OJT Progress"))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio)
        .label(format!(
            "{:.2} / {:.0} hours ({:.0}%)",
            app.logged_hours,
            app.required_hours,
            ratio * 100.0
        ));
    f.render_widget(gauge, chunks[1]);

    // Main content area
    match &app.state {
        AppState::ViewingLogs => {
            let log_items: Vec<ListItem> = app
                .logs
                .iter()
                .rev()
                .take(30)
                .map(|log| ListItem::new(Line::from(log.clone())))
                .collect();
            let log_list =
                List::new(log_items).block(Block::default().borders(Borders::ALL).title("Logs"));
            f.render_widget(log_list, chunks[2]);
        }

        _ => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
                .split(chunks[2]);

            // Session history, newest first
            let history_items: Vec<ListItem> = app
                .history
                .iter()
                .map(|session| {
                    let end = match session.end_time {
                        Some(end) => end.format("%H:%M").to_string(),
                        None => "open".to_string(),
                    };
                    let description = session.description.as_deref().unwrap_or("");
                    ListItem::new(Line::from(format!(
                        "{}  {}-{}  {:>6.2}h  {}",
                        session.date.format("%Y-%m-%d"),
                        session.start_time.format("%H:%M"),
                        end,
                        session.total_hours,
                        description
                    )))
                })
                .collect();
            let history_list = List::new(history_items).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Sessions ({})", app.user_id)),
            );
            f.render_widget(history_list, columns[0]);

            let right = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(10)].as_ref())
                .split(columns[1]);

            // Pending queue
            let queued = app.queued_actions();
            let dead = app.dead_letter_count();
            let queue_items: Vec<ListItem> = queued
                .iter()
                .map(|action| {
                    let retry = if action.attempts > 0 {
                        format!(" (attempt {})", action.attempts + 1)
                    } else {
                        String::new()
                    };
                    ListItem::new(Line::from(format!(
                        "{} {:?}{}",
                        action.enqueued_at.format("%H:%M:%S"),
                        action.kind,
                        retry
                    )))
                })
                .collect();
            let queue_title = if dead > 0 {
                format!("Pending Sync ({}, {} dead)", queued.len(), dead)
            } else {
                format!("Pending Sync ({})", queued.len())
            };
            let queue_list = List::new(queue_items)
                .block(Block::default().borders(Borders::ALL).title(queue_title));
            f.render_widget(queue_list, right[0]);

            // Recent log lines
            let log_items: Vec<ListItem> = app
                .logs
                .iter()
                .rev()
                .take(8)
                .map(|log| ListItem::new(Line::from(log.clone())))
                .collect();
            let log_list =
                List::new(log_items).block(Block::default().borders(Borders::ALL).title("Log"));
            f.render_widget(log_list, right[1]);
        }
    }
}
