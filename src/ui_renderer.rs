use crate::{App, AppView, LOADING_FRAMES};
use exercise_runner::{
    config,
    practice::{AttemptPhase, PracticeEngine},
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::Line,
    widgets::{Block, List, ListItem, ListState, Paragraph, Wrap},
};

pub(crate) struct UiRenderer<'a> {
    app: &'a mut App,
}

impl<'a> UiRenderer<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn render(&mut self, frame: &mut Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(7),
            ])
            .split(frame.area());

        self.render_header(frame, layout[0]);
        match self.app.view {
            AppView::Practice => self.render_practice(frame, layout[1]),
            AppView::Results => self.render_results(frame, layout[1]),
            AppView::Config => self.render_config(frame, layout[1]),
        }
        self.render_status(frame, layout[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let app = &*self.app;
        let effective = app.effective_config();
        let exercise_label = match &app.exercise_details {
            Some(details) if !details.title.trim().is_empty() => details.title.clone(),
            _ => format!("Exercise {}", app.engine.exercise_id()),
        };
        let header_title = Line::from(format!("{} • {}", exercise_label, effective.api_base_url))
        .bold()
        .blue()
        .centered();

        let user_line = if effective.user_id.trim().is_empty() {
            "User: <not set>".to_string()
        } else {
            format!("User: {}", effective.user_id)
        };
        let started_line = match app.attempt_started {
            Some(started) => format!("Started: {}", started.format("%H:%M:%S")),
            None => "Started: -".to_string(),
        };

        let mut header_parts = vec![user_line, started_line];
        if let Some(details) = &app.exercise_details {
            if let Some(minutes) = details.time_limit {
                header_parts.push(format!("Time limit: {} min", minutes));
            }
            if let Some(passing) = details.passing_score {
                header_parts.push(format!("Pass: {}%", passing));
            }
        }

        frame.render_widget(
            Paragraph::new(header_parts.join(" | "))
                .block(Block::bordered().title(header_title))
                .centered(),
            area,
        );
    }

    fn render_practice(&mut self, frame: &mut Frame, area: Rect) {
        let app = &*self.app;
        let engine = &app.engine;

        let body = match engine.phase() {
            AttemptPhase::Idle => String::from("Waiting to load questions."),
            AttemptPhase::Loading => format!(
                "{} Loading questions…",
                LOADING_FRAMES[app.loading_frame % LOADING_FRAMES.len()]
            ),
            AttemptPhase::LoadFailed(message) => format!(
                "Failed to load questions.\n\n{}\n\nPress r to try again.",
                message
            ),
            AttemptPhase::Ready if engine.question_count() == 0 => {
                String::from("This exercise has no questions.")
            }
            AttemptPhase::Ready | AttemptPhase::Submitting | AttemptPhase::Submitted(_) => {
                let show_feedback = app.effective_config().show_answer_feedback;
                let question = Self::question_text(engine, app.option_index, show_feedback);
                match app
                    .exercise_details
                    .as_ref()
                    .and_then(|details| details.instructions.as_deref())
                    .filter(|instructions| !instructions.trim().is_empty())
                {
                    Some(instructions) => format!("Instructions: {}\n\n{}", instructions, question),
                    None => question,
                }
            }
        };

        let title = if matches!(engine.phase(), AttemptPhase::Submitting) {
            format!(
                "Practice • {} Submitting…",
                LOADING_FRAMES[app.loading_frame % LOADING_FRAMES.len()]
            )
        } else {
            "Practice".to_string()
        };

        frame.render_widget(
            Paragraph::new(body)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from(title))),
            area,
        );
    }

    fn question_text(engine: &PracticeEngine, highlighted: usize, show_feedback: bool) -> String {
        let Some(question) = engine.current_question() else {
            return String::from("No question selected.");
        };
        let total = engine.question_count();
        let chosen = engine.chosen_for_current();

        let mut lines = vec![
            format!(
                "Question {} of {} • {} answered",
                engine.cursor_index() + 1,
                total,
                engine.answered_count()
            ),
            String::new(),
            question.text.clone(),
            String::new(),
        ];

        if question.options.is_empty() {
            lines.push(String::from("- No answer options provided"));
        }
        for (index, option) in question.options.iter().enumerate() {
            let prefix = if index == highlighted { "▶" } else { " " };
            let marker = if chosen == Some(option.id.as_str()) {
                "(•)"
            } else {
                "( )"
            };
            lines.push(format!("{} {} {}. {}", prefix, marker, index + 1, option.text));
        }

        if show_feedback {
            if let Some(feedback) = engine.answer_feedback() {
                lines.push(String::new());
                if feedback.is_correct {
                    lines.push(String::from("Correct! Well done!"));
                } else {
                    lines.push(format!(
                        "Incorrect. The correct answer is: {}",
                        feedback.correct_text.as_deref().unwrap_or("<unknown>")
                    ));
                }
            }
        }

        lines.join("\n")
    }

    fn render_results(&mut self, frame: &mut Frame, area: Rect) {
        let app = &*self.app;
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(3)])
            .split(area);

        let summary = match app.engine.phase() {
            AttemptPhase::Submitted(summary) => *summary,
            _ => app.engine.score(),
        };
        let mut summary_lines = vec![
            format!("Your score: {}", summary.display_percentage()),
            format!(
                "{} out of {} correct",
                summary.correct_count, summary.total_count
            ),
        ];
        if let (Some(started), Some(finished)) = (app.attempt_started, app.attempt_finished) {
            let seconds = (finished - started).num_seconds().max(0);
            summary_lines.push(format!("Time taken: {}m {}s", seconds / 60, seconds % 60));
        }

        frame.render_widget(
            Paragraph::new(summary_lines.join("\n"))
                .block(Block::bordered().title(Line::from("Results").bold()))
                .centered(),
            sections[0],
        );

        let items: Vec<ListItem> = app
            .engine
            .review()
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let marker = if row.is_correct { "✓" } else { "✗" };
                ListItem::new(format!(
                    "{} {}. {}\n    Your answer: {}\n    Correct answer: {}",
                    marker,
                    index + 1,
                    row.question_text,
                    row.chosen_text.as_deref().unwrap_or("<no answer>"),
                    row.correct_text.as_deref().unwrap_or("<unknown>")
                ))
            })
            .collect();

        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(app.results_scroll.min(items.len() - 1)));
        }

        frame.render_stateful_widget(
            List::new(items)
                .block(Block::bordered().title(Line::from("Breakdown")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::BOLD)),
            sections[1],
            &mut list_state,
        );
    }

    fn render_config(&mut self, frame: &mut Frame, area: Rect) {
        let app = &*self.app;
        let form = &app.config_form;
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(5)])
            .split(area);

        frame.render_widget(
            Paragraph::new(format!(
                "Config file: {}",
                config::config_file_path().display()
            ))
            .block(Block::bordered())
            .centered(),
            sections[0],
        );

        let items = vec![
            ListItem::new(format!("Request timeout: {}s", form.request_timeout_secs)),
            ListItem::new(format!("Load retry attempts: {}", form.load_retry_attempts)),
            ListItem::new(format!("Retry backoff: {}ms", form.retry_backoff_ms)),
            ListItem::new(format!(
                "Show answer feedback: {}",
                if form.show_answer_feedback {
                    "Enabled"
                } else {
                    "Disabled"
                }
            )),
            ListItem::new(if form.is_editing_access_token() {
                format!(
                    "Access token (editing): {}",
                    form.masked_access_token_buffer()
                )
            } else {
                format!("Access token: {}", form.masked_access_token())
            }),
        ];

        let mut list_state = ListState::default();
        list_state.select(Some(form.selected_index()));

        frame.render_stateful_widget(
            List::new(items)
                .block(Block::bordered().title(Line::from("Settings")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            sections[1],
            &mut list_state,
        );
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let app = &*self.app;
        let mut status_lines = Vec::new();
        if let Some(error) = &app.error {
            status_lines.push(format!("Error: {}", error));
        }

        match app.view {
            AppView::Practice => {
                if let Some(status) = &app.status {
                    status_lines.push(status.clone());
                }
                status_lines.push(
                    "↑/↓ choose • Space/1-9 answer • Enter answer/next/submit • n/p move • s submit"
                        .to_string(),
                );
                status_lines.push("c config • Esc, Ctrl-C, or q to quit.".to_string());
            }
            AppView::Results => {
                if let Some(status) = &app.status {
                    status_lines.push(status.clone());
                }
                status_lines.push(
                    "↑/↓ scroll • r practice again • c config • q to quit.".to_string(),
                );
            }
            AppView::Config => {
                if app.config_form.dirty {
                    status_lines.push("Unsaved changes".to_string());
                }
                if let Some(config_status) = &app.config_form.status {
                    status_lines.push(config_status.clone());
                }
                status_lines.push(
                    "↑/↓ choose field • ←/→ adjust • Enter on token to edit • s save • r reset • b back"
                        .to_string(),
                );
            }
        }

        if let Some(path) = &app.log_path {
            status_lines.push(format!("Log: {}", path.display()));
        }

        frame.render_widget(
            Paragraph::new(status_lines.join("\n"))
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title(Line::from("Status"))),
            area,
        );
    }
}
