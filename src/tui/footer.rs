use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::AppState;
use crate::history::RunHistory;

/// "Page 2 of 3 · 25 runs" when pagination is shown.
pub fn page_summary(history: &RunHistory) -> Option<String> {
    if !history.pagination_visible() {
        return None;
    }
    let total = history.paging().total;
    Some(format!(
        "Page {} of {} · {} run{}",
        history.current_page().saturating_add(1),
        history.page_count().max(1),
        total,
        if total == 1 { "" } else { "s" }
    ))
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let narrow = area.width < crate::app::NARROW_WIDTH_THRESHOLD;
    let summary = page_summary(&state.history);

    let hints: Vec<(&str, &str)> = if state.has_authorize_card() {
        vec![("y", "configure"), ("n", "cancel")]
    } else if narrow {
        let mut hints = vec![("j/k", "nav"), ("⏎", "logs")];
        if summary.is_some() {
            hints.push(("n/p", "page"));
        }
        hints.extend([("r", "refresh"), ("q", "quit")]);
        hints
    } else {
        let mut hints = vec![("↑↓/jk", "navigate"), ("⏎/space", "logs")];
        if summary.is_some() {
            hints.extend([("→/n", "next"), ("←/p", "prev")]);
        }
        hints.extend([("r", "refresh"), ("t", "run now"), ("q", "quit")]);
        hints
    };

    let line = if let Some(notif) = state.notifications.last() {
        Line::from(vec![
            Span::styled("★ ", Style::default().fg(Color::Yellow)),
            Span::styled(&notif.message, Style::default().fg(Color::Yellow)),
        ])
    } else {
        let mut spans: Vec<Span> = Vec::new();
        if let Some(summary) = summary {
            spans.push(Span::styled(summary, Style::default().fg(Color::White)));
            spans.push(Span::raw("  "));
        }
        for (i, (key, desc)) in hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
            spans.push(Span::styled(
                format!(" {}", desc),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(footer, area);
}
