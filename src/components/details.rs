//! Detail overlay for a single patient.
//!
//! Shows fields from the already-fetched list row; never triggers a request.

use crate::components::{centered_rect, palette};
use crate::models::PatientRecord;
use crate::tui::Frame;
use ratatui::{prelude::*, widgets::*};
use time::Date;

/// Label/value pairs shown in the overlay, in display order.
pub fn detail_fields(patient: &PatientRecord, today: Date) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("ID", patient.id.clone()),
        ("Date of Birth", patient.birth_date.clone()),
        ("Resource Type", patient.resource_type.clone()),
    ];
    if let Some(age) = patient.age_on(today) {
        fields.push(("Age", age.to_string()));
    }
    fields
}

pub fn render_details(frame: &mut Frame, area: Rect, patient: &PatientRecord, today: Date) {
    let dialog_area = centered_rect(60, 40, area);

    let mut lines: Vec<Line> = detail_fields(patient, today)
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(
                    format!("{:<15}", format!("{label}:")),
                    Style::default()
                        .fg(palette::MUTED)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(value, Style::default().fg(palette::TEXT)),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(
        Line::from(Span::styled(
            "Esc: Close",
            Style::default().fg(palette::MUTED),
        ))
        .alignment(Alignment::Center),
    );

    let dialog = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!(" {} ", patient.display_name()))
                .title_alignment(Alignment::Center)
                .title_style(
                    Style::default()
                        .fg(palette::TEXT)
                        .add_modifier(Modifier::BOLD),
                )
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(palette::FOCUS_BORDER))
                .style(Style::default().bg(palette::PANEL))
                .padding(Padding::horizontal(2)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, dialog_area);
    frame.render_widget(dialog, dialog_area);
}
