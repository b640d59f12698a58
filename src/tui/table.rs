use crate::app::{AppState, DisplayRunRecord, RunStatus};
use crate::history::RunHistory;
use chrono::{DateTime, Local, TimeZone};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

const RUN_AT_WIDTH: usize = 20;
const RUN_TYPE_WIDTH: usize = 12;
const STATUS_WIDTH: usize = 14;
const DETAIL_INDENT: &str = "      ";

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let narrow = area.width < crate::app::NARROW_WIDTH_THRESHOLD;
    let records = state.history.records();

    if records.is_empty() {
        let msg = if state.is_loading() {
            "Loading runs…"
        } else {
            "No runs found"
        };
        let para = Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::NONE));
        f.render_widget(para, area);
        return;
    }

    let mut lines: Vec<Line> = vec![header_line(narrow)];
    let mut selected_line = 0;

    for (i, record) in records.iter().enumerate() {
        let is_selected = i == state.cursor;
        if is_selected {
            selected_line = lines.len();
        }
        let expanded = state.history.is_expanded(&record.id);
        lines.push(render_run_line(record, is_selected, expanded, narrow));
        if expanded {
            let max = (area.width as usize).saturating_sub(DETAIL_INDENT.len());
            for detail in log_detail_lines(record, &Local) {
                lines.push(Line::from(Span::styled(
                    format!("{DETAIL_INDENT}{}", truncate(&detail, max)),
                    Style::default().fg(Color::Gray),
                )));
            }
        }
    }

    // Keep the selected row on screen; the column header scrolls with it.
    let visible_height = area.height as usize;
    let scroll_offset = if selected_line >= visible_height {
        selected_line - visible_height + 1
    } else {
        0
    };
    let visible: Vec<Line> = lines
        .into_iter()
        .skip(scroll_offset)
        .take(visible_height)
        .collect();

    let table = Paragraph::new(visible).block(Block::default().borders(Borders::NONE));
    f.render_widget(table, area);
}

fn header_line(narrow: bool) -> Line<'static> {
    let style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let mut text = format!("  {:<w$} ", "Run at", w = RUN_AT_WIDTH);
    if !narrow {
        text.push_str(&format!("{:<w$} ", "Run type", w = RUN_TYPE_WIDTH));
    }
    text.push_str(&format!("{:<w$} Actions", "Status", w = STATUS_WIDTH));
    Line::from(Span::styled(text, style))
}

pub(crate) fn status_icon(status: RunStatus) -> (&'static str, Color) {
    match status {
        RunStatus::Success | RunStatus::Completed => ("✓", Color::Green),
        RunStatus::Failed | RunStatus::ActiveError => ("✗", Color::Red),
        RunStatus::Running | RunStatus::Started | RunStatus::Active => ("⟳", Color::Yellow),
        RunStatus::Stopped => ("⊘", Color::Yellow),
        RunStatus::Unknown => ("·", Color::DarkGray),
    }
}

pub(crate) fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Formats epoch milliseconds in `tz`; non-positive values render as `-`.
pub(crate) fn format_timestamp<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if millis <= 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(tz).format("%b %-d, %Y, %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        s.to_string()
    } else {
        let mut result = String::new();
        let mut width = 0;
        for c in s.chars() {
            let cw = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
            if width + cw + 1 > max_width {
                result.push('…');
                break;
            }
            result.push(c);
            width += cw;
        }
        result
    }
}

fn pad(s: &str, width: usize) -> String {
    let s = truncate(s, width);
    let used = UnicodeWidthStr::width(s.as_str());
    format!("{s}{}", " ".repeat(width.saturating_sub(used)))
}

fn render_run_line(
    record: &DisplayRunRecord,
    is_selected: bool,
    expanded: bool,
    narrow: bool,
) -> Line<'static> {
    let (icon, icon_color) = status_icon(record.status);
    let arrow = if expanded { "▼" } else { "▶" };
    let disabled = RunHistory::is_log_action_disabled(record);

    let select_style = if is_selected {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::styled(
            format!("{} ", if disabled { " " } else { arrow }),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{} ", pad(&format_timestamp(record.record.timestamp, &Local), RUN_AT_WIDTH)),
            select_style,
        ),
    ];

    if !narrow {
        spans.push(Span::styled(
            format!("{} ", pad(&record.record.run_type, RUN_TYPE_WIDTH)),
            Style::default().fg(Color::Blue),
        ));
    }

    let badge = format!("{icon} {}", record.status.label());
    spans.push(Span::styled(
        format!("{} ", pad(&badge, STATUS_WIDTH)),
        Style::default().fg(icon_color),
    ));

    let logs_style = if disabled {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM)
    } else {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::UNDERLINED)
    };
    spans.push(Span::styled("Logs", logs_style));

    Line::from(spans)
}

/// Lines shown beneath an expanded run.
pub(crate) fn log_detail_lines<Tz: TimeZone>(record: &DisplayRunRecord, tz: &Tz) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    let run = &record.record;
    let mut lines = Vec::new();

    if let Some(start) = run.start_time {
        lines.push(format!("Started   {}", format_timestamp(start, tz)));
    }
    if let Some(end) = run.end_time {
        lines.push(format!("Ended     {}", format_timestamp(end, tz)));
    }
    if let Some(ms) = run.execution_time {
        lines.push(format!("Duration  {}", format_duration(ms / 1000)));
    }
    if let Some(schedule) = run.schedule_info.as_ref().filter(|v| !v.is_null()) {
        lines.push(format!("Schedule  {schedule}"));
    }

    for (label, context) in [
        ("Success context", &run.success_context),
        ("Failure context", &run.failure_context),
    ] {
        let Some(value) = context.as_ref().filter(|v| !v.is_null()) else {
            continue;
        };
        lines.push(format!("{label}:"));
        let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        lines.extend(pretty.lines().map(|l| format!("  {l}")));
    }

    if lines.is_empty() {
        lines.push(match record.status {
            RunStatus::Running => "Run in progress, no details yet".to_string(),
            _ => "No further details".to_string(),
        });
    }
    lines
}
