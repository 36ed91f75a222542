use crate::types::CompositionRecord;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

pub const PROMPT_PREVIEW_CHARS: usize = 50;
pub const RESPONSE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerAction {
    None,
    Show(i64),
    Quit,
}

#[derive(Debug, Clone)]
pub struct Detail {
    pub record: CompositionRecord,
    pub lineage: Vec<i64>,
}

#[derive(Debug, Default)]
pub struct ViewerState {
    pub records: Vec<CompositionRecord>,
    pub selected: Option<usize>,
    pub input: String,
    pub detail: Option<Detail>,
    pub status: Option<String>,
}

impl ViewerState {
    pub fn new(records: Vec<CompositionRecord>) -> Self {
        let mut state = Self::default();
        state.set_records(records);
        state
    }

    pub fn set_records(&mut self, records: Vec<CompositionRecord>) {
        self.records = records;
        self.selected = match self.selected {
            _ if self.records.is_empty() => None,
            Some(index) => Some(index.min(self.records.len() - 1)),
            None => Some(0),
        };
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ViewerAction {
        if key.kind != KeyEventKind::Press {
            return ViewerAction::None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                ViewerAction::Quit
            }
            KeyCode::Esc => ViewerAction::Quit,
            KeyCode::Char('q') | KeyCode::Char('Q') if self.input.is_empty() => ViewerAction::Quit,
            KeyCode::Char(c) => {
                self.input.push(c);
                ViewerAction::None
            }
            KeyCode::Backspace => {
                self.input.pop();
                ViewerAction::None
            }
            KeyCode::Enter => self.submit_input(),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Up => self.move_selection(-1),
            _ => ViewerAction::None,
        }
    }

    fn submit_input(&mut self) -> ViewerAction {
        let input = std::mem::take(&mut self.input);
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return match self.selected_record() {
                Some(record) => ViewerAction::Show(record.id),
                None => ViewerAction::None,
            };
        }
        if trimmed.eq_ignore_ascii_case("q") {
            return ViewerAction::Quit;
        }
        match trimmed.parse::<i64>() {
            Ok(id) => ViewerAction::Show(id),
            Err(_) => {
                self.status = Some(
                    "Invalid input. Please enter a valid composition ID or 'q' to quit.".into(),
                );
                ViewerAction::None
            }
        }
    }

    fn move_selection(&mut self, step: isize) -> ViewerAction {
        if self.records.is_empty() {
            return ViewerAction::None;
        }
        let last = self.records.len() - 1;
        let current = self.selected.unwrap_or(0);
        let next = if step < 0 { current.saturating_sub(1) } else { (current + 1).min(last) };
        self.selected = Some(next);
        ViewerAction::Show(self.records[next].id)
    }

    pub fn selected_record(&self) -> Option<&CompositionRecord> {
        self.selected.and_then(|index| self.records.get(index))
    }

    pub fn show(&mut self, id: i64, found: Option<Detail>) {
        match found {
            Some(detail) => {
                if let Some(index) = self.records.iter().position(|r| r.id == id) {
                    self.selected = Some(index);
                }
                self.status = None;
                self.detail = Some(detail);
            }
            None => {
                self.status = Some(format!("No composition found with ID {id}"));
                self.detail = None;
            }
        }
    }
}

pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

pub fn parent_label(parent_id: Option<i64>) -> String {
    parent_id.map(|id| id.to_string()).unwrap_or_else(|| "N/A".to_string())
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
