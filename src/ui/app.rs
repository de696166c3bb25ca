use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};

use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::config::settings::Settings;
use crate::database::RemoteStore;
use crate::models::breaks::Break;
use crate::models::pending::PendingAction;
use crate::models::session::Session;
use crate::store::mirror::MirrorStore;
use crate::store::queue::PendingQueue;
use crate::sync::connectivity::ConnectivityMonitor;
use crate::sync::drain;
use crate::ui::actions::{self, ActionContext};
use crate::ui::render;

#[derive(Debug, Clone)]
pub enum InputAction {
    TimeOutDescription,
}

#[derive(Debug, Clone)]
pub enum AppState {
    Dashboard,
    ViewingLogs,
    Input {
        prompt: String,
        buffer: String,
        action: InputAction,
    },
}

#[derive(Debug, Clone)]
enum Command {
    TimeIn,
    StartBreak,
    EndBreak,
    TimeOut(Option<String>),
    SyncNow,
    ForceDelete,
    CleanUp,
}

pub struct App {
    pub state: AppState,
    store: Arc<dyn RemoteStore>,
    mirror: MirrorStore,
    queue: PendingQueue,
    connectivity: ConnectivityMonitor,
    pub user_id: String,
    pub required_hours: f64,
    pub online: bool,
    pub history: Vec<Session>,
    pub logged_hours: f64,
    pub logs: Vec<String>,
}

impl App {
    pub fn new(store: Arc<dyn RemoteStore>, settings: &Settings) -> Self {
        let mirror = MirrorStore::open(settings.data_dir.join("mirror.json"), &settings.user_id);
        let queue = PendingQueue::open(settings.data_dir.join("queue.json"));
        let connectivity = ConnectivityMonitor::start(Arc::clone(&store), Duration::from_secs(5));

        Self {
            state: AppState::Dashboard,
            store,
            mirror,
            queue,
            connectivity,
            user_id: settings.user_id.clone(),
            required_hours: settings.required_hours,
            online: false,
            history: vec![],
            logged_hours: 0.0,
            logs: vec![],
        }
    }

    // Read-only views for the renderer.

    pub fn active_session(&self) -> Option<Session> {
        self.mirror.active_session()
    }

    pub fn current_breaks(&self) -> Vec<Break> {
        match self.mirror.active_session() {
            Some(session) => self.mirror.breaks(&session.id),
            None => vec![],
        }
    }

    pub fn queued_actions(&self) -> Vec<PendingAction> {
        self.queue.list()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.queue.dead_letters().len()
    }

    pub async fn run(&mut self) -> Result<()> {
        log::info!("Starting UI...");

        if let Err(e) = enable_raw_mode() {
            eprintln!("Failed to enable raw mode: {}. This may happen when running in environments without proper terminal support (e.g., SSH without pseudo-terminal, containers, etc.)", e);
            return Err(anyhow::anyhow!("Terminal raw mode not supported: {}", e));
        }
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
            eprintln!("Failed to enter alternate screen: {}", e);
            let _ = disable_raw_mode();
            return Err(anyhow::anyhow!("Failed to setup terminal: {}", e));
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // None means "never refreshed": the first loop turn with the backend
        // reachable loads history right away.
        let mut last_refresh: Option<Instant> = None;
        let refresh_interval = Duration::from_secs(30);

        loop {
            terminal.draw(|f| self.draw(f))?;

            // An offline-to-online transition with work queued starts a drain
            // without waiting for the user to press sync.
            let online = self.connectivity.is_online();
            if online && !self.online && !self.queue.is_empty() {
                let report =
                    drain::drain(self.store.as_ref(), &mut self.mirror, &mut self.queue).await;
                self.logs.push(format!(
                    "[{}] Back online. {}",
                    Local::now().format("%H:%M:%S"),
                    report.summary()
                ));
                self.refresh_remote_data().await;
            }
            self.online = online;

            if self.online && last_refresh.is_none_or(|t| t.elapsed() >= refresh_interval) {
                self.refresh_remote_data().await;
                last_refresh = Some(Instant::now());
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    log::debug!("Key pressed: {:?} in state: {:?}", key.code, self.state);

                    match self.state.clone() {
                        AppState::Dashboard => match key.code {
                            KeyCode::Char('q') => break,
                            KeyCode::Char('i') => self.execute(Command::TimeIn).await,
                            KeyCode::Char('b') => self.execute(Command::StartBreak).await,
                            KeyCode::Char('e') => self.execute(Command::EndBreak).await,
                            KeyCode::Char('o') => self.start_time_out(),
                            KeyCode::Char('s') => self.execute(Command::SyncNow).await,
                            KeyCode::Char('d') => self.execute(Command::ForceDelete).await,
                            KeyCode::Char('u') => self.execute(Command::CleanUp).await,
                            KeyCode::Char('l') => self.state = AppState::ViewingLogs,
                            _ => {}
                        },
                        AppState::ViewingLogs => {
                            // any key returns to the dashboard
                            self.state = AppState::Dashboard;
                        }
                        AppState::Input {
                            prompt,
                            mut buffer,
                            action,
                        } => match key.code {
                            KeyCode::Enter => {
                                self.state = AppState::Dashboard;
                                let text = buffer.trim().to_string();
                                let description = if text.is_empty() { None } else { Some(text) };
                                match action {
                                    InputAction::TimeOutDescription => {
                                        self.execute(Command::TimeOut(description)).await;
                                    }
                                }
                            }
                            KeyCode::Esc => {
                                self.state = AppState::Dashboard;
                                self.logs.push(format!(
                                    "[{}] Time out cancelled",
                                    Local::now().format("%H:%M:%S")
                                ));
                            }
                            KeyCode::Backspace => {
                                buffer.pop();
                                self.state = AppState::Input {
                                    prompt,
                                    buffer,
                                    action,
                                };
                            }
                            KeyCode::Char(c) => {
                                buffer.push(c);
                                self.state = AppState::Input {
                                    prompt,
                                    buffer,
                                    action,
                                };
                            }
                            _ => {
                                self.state = AppState::Input {
                                    prompt,
                                    buffer,
                                    action,
                                };
                            }
                        },
                    }
                }
            }
        }

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        Ok(())
    }

    /// Time Out goes through a description prompt, but only when the
    /// preconditions hold; otherwise the rejection lands in the log panel
    /// without leaving the dashboard.
    fn start_time_out(&mut self) {
        let now = Local::now();
        match actions::validate_time_out(&self.mirror, now) {
            Ok(_) => {
                self.state = AppState::Input {
                    prompt: "Session description (Enter to save, Esc to cancel)".to_string(),
                    buffer: String::new(),
                    action: InputAction::TimeOutDescription,
                };
            }
            Err(reason) => self
                .logs
                .push(format!("[{}] {}", now.format("%H:%M:%S"), reason)),
        }
    }

    async fn execute(&mut self, command: Command) {
        let now = Local::now();
        let online = self.online;
        let outcome = {
            let mut ctx = ActionContext {
                store: self.store.as_ref(),
                mirror: &mut self.mirror,
                queue: &mut self.queue,
                user_id: &self.user_id,
                online,
            };
            match command {
                Command::TimeIn => actions::time_in(&mut ctx, now).await,
                Command::StartBreak => actions::start_break(&mut ctx, now).await,
                Command::EndBreak => actions::end_break(&mut ctx, now).await,
                Command::TimeOut(description) => {
                    actions::time_out(&mut ctx, now, description).await
                }
                Command::SyncNow => actions::sync_now(&mut ctx, now).await,
                Command::ForceDelete => actions::force_delete(&mut ctx, now).await,
                Command::CleanUp => actions::cleanup_stuck(&mut ctx, now).await,
            }
        };

        let should_refresh = outcome.should_refresh;
        self.logs.extend(outcome.messages);
        if should_refresh && self.online {
            self.refresh_remote_data().await;
        }
    }

    async fn refresh_remote_data(&mut self) {
        match self.store.sessions_for_user(&self.user_id, 30).await {
            Ok(history) => self.history = history,
            Err(e) => log::debug!("History refresh failed: {}", e),
        }
        match self.store.total_hours_for_user(&self.user_id).await {
            Ok(hours) => self.logged_hours = hours,
            Err(e) => log::debug!("Logged-hours refresh failed: {}", e),
        }
    }

    fn draw(&self, f: &mut Frame) {
        render::draw(self, f);
    }
}
