use super::{ConfigManager, PracticeManager};
use crate::App;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

pub(crate) struct ResultsManager<'a> {
    app: &'a mut App,
}

impl<'a> ResultsManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.scroll_down(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.scroll_up(),
            (KeyModifiers::NONE, KeyCode::Char('r')) => self.restart(),
            (KeyModifiers::NONE, KeyCode::Char('c')) => ConfigManager::new(self.app).show_config(),
            _ => {}
        }
    }

    fn scroll_down(&mut self) {
        let last = self.app.engine.question_count().saturating_sub(1);
        self.app.results_scroll = (self.app.results_scroll + 1).min(last);
    }

    fn scroll_up(&mut self) {
        self.app.results_scroll = self.app.results_scroll.saturating_sub(1);
    }

    /// Discard the submitted attempt and load the exercise again.
    fn restart(&mut self) {
        debug!("App: restarting exercise {}", self.app.engine.exercise_id());
        self.app.engine.reset();
        PracticeManager::new(self.app).start_load();
    }
}
