use crate::{
    app::{
        parent_label, preview, yes_no, Detail, ViewerAction, ViewerState, PROMPT_PREVIEW_CHARS,
        RESPONSE_PREVIEW_CHARS,
    },
    store::CompositionStore,
};
use anyhow::Result;
use crossterm::event::{self, Event};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::time::Duration;

const HEADERS: [&str; 5] = ["ID", "Prompt", "MIDI Filename", "Parent ID", "Is Original"];

pub fn run<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    state: &mut ViewerState,
    store: &CompositionStore,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match state.handle_key(key) {
            ViewerAction::Quit => break,
            ViewerAction::Show(id) => {
                state.set_records(store.list()?);
                let detail = match store.get(id)? {
                    Some(record) => {
                        let lineage = store.lineage(id)?.iter().map(|r| r.id).collect();
                        Some(Detail { record, lineage })
                    }
                    None => None,
                };
                state.show(id, detail);
            }
            ViewerAction::None => {}
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &ViewerState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Min(8), Constraint::Length(3)])
        .split(frame.size());

    draw_table(frame, chunks[0], state);
    draw_detail(frame, chunks[1], state);
    draw_input(frame, chunks[2], state);
}

fn draw_table(frame: &mut Frame, area: Rect, state: &ViewerState) {
    let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h)))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let rows = state.records.iter().map(|record| {
        Row::new(vec![
            Cell::from(record.id.to_string()),
            Cell::from(preview(&record.prompt, PROMPT_PREVIEW_CHARS)),
            Cell::from(record.midi_filename.clone()),
            Cell::from(parent_label(record.parent_id)),
            Cell::from(yes_no(record.is_original)),
        ])
    });
    let widths = [
        Constraint::Length(6),
        Constraint::Percentage(40),
        Constraint::Length(46),
        Constraint::Length(10),
        Constraint::Length(12),
    ];
    let title = format!("Compositions ({})", state.records.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut table_state = TableState::default();
    table_state.select(state.selected);
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn draw_detail(frame: &mut Frame, area: Rect, state: &ViewerState) {
    let block = Block::default().title("Composition Details").borders(Borders::ALL);
    let lines = match &state.detail {
        Some(detail) => detail_lines(detail),
        None => vec![Line::from("Enter a composition ID or use Up/Down to view details.")],
    };
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn detail_lines(detail: &Detail) -> Vec<Line<'static>> {
    let record = &detail.record;
    let label = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name}: "), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(value),
        ])
    };
    let lineage =
        detail.lineage.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" → ");
    vec![
        label("ID", record.id.to_string()),
        label("Prompt", record.prompt.clone()),
        label("GPT Response", preview(&record.gpt_response, RESPONSE_PREVIEW_CHARS)),
        label("MIDI Filename", record.midi_filename.clone()),
        label("Parent ID", parent_label(record.parent_id)),
        label("Is Original", yes_no(record.is_original).to_string()),
        label("Lineage", lineage),
    ]
}

fn draw_input(frame: &mut Frame, area: Rect, state: &ViewerState) {
    let title = state.status.as_deref().unwrap_or("Composition ID (Enter to view, q to quit)");
    let style = if state.status.is_some() {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    let block = Block::default().title(title.to_string()).borders(Borders::ALL).border_style(style);
    frame.render_widget(Paragraph::new(state.input.as_str()).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompositionRecord;

    #[test]
    fn detail_lines_show_lineage_chain() {
        let detail = Detail {
            record: CompositionRecord {
                id: 3,
                prompt: "Original prompt: jazz\nOriginal MIDI: a.mid\nFollow-up: slower".into(),
                gpt_response: "x".repeat(250),
                midi_filename: "followup_abc.mid".into(),
                parent_id: Some(2),
                is_original: false,
            },
            lineage: vec![1, 2, 3],
        };
        let text: Vec<String> = detail_lines(&detail)
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
            .collect();
        assert_eq!(text[2].len(), "GPT Response: ".len() + 203);
        assert_eq!(text[4], "Parent ID: 2");
        assert_eq!(text[5], "Is Original: No");
        assert_eq!(text[6], "Lineage: 1 → 2 → 3");
    }
}
