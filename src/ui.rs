use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
};
use crate::app::{App, InputMode};
use crate::chat::ChatRole;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, notice line, composer, footer
    let [header_area, chat_area, notice_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_notice(app, frame, notice_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let busy_indicator = if app.busy { " [streaming]" } else { "" };

    let title = Line::from(vec![
        Span::styled(" Charla ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(busy_indicator, Style::default().fg(Color::Yellow)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Conversation ");
    let inner = block.inner(area);

    // Record the drawable size so scroll math matches what is on screen
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.chat_messages {
        let (label, style) = match msg.role {
            ChatRole::User => ("You:", Style::default().fg(Color::Cyan).bold()),
            ChatRole::Assistant => ("AI:", Style::default().fg(Color::Green).bold()),
        };
        lines.push(Line::from(Span::styled(label, style)));
        if msg.content.is_empty() {
            lines.push(Line::raw(""));
        } else {
            for line in msg.content.lines() {
                lines.push(Line::raw(line.to_string()));
            }
        }
        lines.push(Line::raw(""));
    }

    if app.busy {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Green).bold(),
        )));
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::Gray),
        )));
    }

    // Clamp scrolling to rendered content
    let total_lines = app.chat_line_count(inner.width.max(1) as usize);
    let max_scroll = total_lines.saturating_sub(inner.height);
    if app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);

    let mut scrollbar_state =
        ScrollbarState::new(total_lines as usize).position(app.chat_scroll as usize);
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        area,
        &mut scrollbar_state,
    );
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let line = if let Some(error) = &app.last_error {
        Line::from(Span::styled(
            format!(" error: {}", error),
            Style::default().fg(Color::Red),
        ))
    } else if let Some(status) = &app.status_line {
        Line::from(Span::styled(
            format!(" {}", status),
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::default()
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_style = if editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(" Message ");
    let inner = block.inner(area);

    // Keep the cursor visible by windowing long input from the left
    let width = inner.width.max(1) as usize;
    let chars: Vec<char> = app.input.chars().collect();
    let start = app.cursor.saturating_sub(width.saturating_sub(1));
    let visible: String = chars.iter().skip(start).take(width).collect();

    let placeholder = visible.is_empty() && !editing;
    let paragraph = if placeholder {
        Paragraph::new(Span::styled(
            "Type a message...",
            Style::default().fg(Color::Gray),
        ))
    } else {
        Paragraph::new(visible)
    };
    frame.render_widget(paragraph.block(block), area);

    if editing {
        frame.set_cursor(inner.x + (app.cursor - start) as u16, inner.y);
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(
                if app.busy { " stop " } else { " browse " },
                label_style,
            ),
        ],
        InputMode::Normal => {
            let mut hints = vec![
                Span::styled(" i ", key_style),
                Span::styled(" compose ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" r ", key_style),
                Span::styled(" reset ", label_style),
            ];
            if app.busy {
                hints.extend(vec![
                    Span::styled(" Esc ", key_style),
                    Span::styled(" stop ", label_style),
                ]);
            }
            hints.push(Span::styled(" q ", key_style));
            hints.push(Span::styled(" quit ", label_style));
            hints
        }
    };
    hints.extend(vec![
        Span::styled(" Ctrl-C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
