use crate::app::AuthorizeCard;
use crate::tui::table::format_duration;
use chrono::Utc;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

/// "Updated 3h 5m ago", measured against `now_ms`.
pub(crate) fn updated_label(updated_at: Option<i64>, now_ms: i64) -> String {
    match updated_at {
        Some(ts) if ts > 0 => {
            format!("Updated {} ago", format_duration((now_ms - ts) / 1000))
        }
        _ => "Updated -".to_string(),
    }
}

pub(crate) fn card_lines(card: &AuthorizeCard, now_ms: i64) -> Vec<Line<'static>> {
    let muted = Style::default().fg(Color::DarkGray);
    let developer = if card.developer.is_empty() {
        "unknown developer".to_string()
    } else {
        card.developer.clone()
    };

    let mut by_line = vec![
        Span::styled(
            card.app_name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" by "),
        Span::styled(developer.clone(), Style::default().fg(Color::Blue)),
    ];
    if let Some(url) = card.developer_url.as_deref().filter(|u| !u.is_empty()) {
        by_line.push(Span::styled(format!(" ({url})"), muted));
    }

    vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Cyan)),
            Span::styled(
                card.user_name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(by_line),
        Line::from(Span::styled(
            format!("wants to access your account, {}", card.user_name),
            muted,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("▸ ", Style::default().fg(Color::Cyan)),
            Span::raw("All Metadata"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "Developed by {developer} · {}",
                updated_label(card.updated_at, now_ms)
            ),
            muted,
        )),
    ]
}

pub fn render(f: &mut Frame, card: &AuthorizeCard) {
    let area = f.area();

    let width = 64u16.min(area.width);
    let height = 12u16.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let card_area = Rect::new(x, y, width, height);

    f.render_widget(Clear, card_area);

    let title = format!(" Authorize {} ", card.app_name);
    let hints = Line::from(vec![
        Span::styled(
            "y",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" configure   ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            "n",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" cancel ", Style::default().fg(Color::DarkGray)),
    ]);

    let block = Block::default()
        .title(title)
        .title_bottom(hints.centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .style(Style::default().bg(Color::Black));

    let paragraph = Paragraph::new(card_lines(card, Utc::now().timestamp_millis()))
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, card_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> AuthorizeCard {
        AuthorizeCard {
            app_name: "Search Indexing".to_string(),
            developer: "Collate Inc.".to_string(),
            developer_url: Some("https://www.getcollate.io".to_string()),
            updated_at: Some(1_000_000),
            user_name: "Aaron Johnson".to_string(),
        }
    }

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn updated_label_relative() {
        assert_eq!(updated_label(Some(1_000_000), 1_000_000 + 125_000), "Updated 2m 5s ago");
    }

    #[test]
    fn updated_label_missing() {
        assert_eq!(updated_label(None, 5), "Updated -");
        assert_eq!(updated_label(Some(0), 5), "Updated -");
    }

    #[test]
    fn card_mentions_app_developer_and_user() {
        let lines: Vec<String> = card_lines(&card(), 1_000_000 + 45_000)
            .iter()
            .map(text)
            .collect();
        assert!(lines.contains(&"● Aaron Johnson".to_string()));
        assert!(lines.contains(
            &"Search Indexing by Collate Inc. (https://www.getcollate.io)".to_string()
        ));
        assert!(lines.contains(&"▸ All Metadata".to_string()));
        assert!(lines.contains(&"Developed by Collate Inc. · Updated 45s ago".to_string()));
    }

    #[test]
    fn card_without_developer() {
        let mut c = card();
        c.developer.clear();
        c.developer_url = None;
        let lines: Vec<String> = card_lines(&c, 2_000_000).iter().map(text).collect();
        assert!(lines.contains(&"Search Indexing by unknown developer".to_string()));
    }
}
