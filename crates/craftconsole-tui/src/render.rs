use craftconsole_core::{Fragment, LogLevel, LogLine, Marker, McColor, SpanStyle};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

pub fn mc_color(color: McColor) -> Color {
    match color {
        McColor::Black => Color::Rgb(0x00, 0x00, 0x00),
        McColor::DarkBlue => Color::Rgb(0x00, 0x00, 0xAA),
        McColor::DarkGreen => Color::Rgb(0x00, 0xAA, 0x00),
        McColor::DarkAqua => Color::Rgb(0x00, 0xAA, 0xAA),
        McColor::DarkRed => Color::Rgb(0xAA, 0x00, 0x00),
        McColor::DarkPurple => Color::Rgb(0xAA, 0x00, 0xAA),
        McColor::Gold => Color::Rgb(0xFF, 0xAA, 0x00),
        McColor::Gray => Color::Rgb(0xAA, 0xAA, 0xAA),
        McColor::DarkGray => Color::Rgb(0x55, 0x55, 0x55),
        McColor::Blue => Color::Rgb(0x55, 0x55, 0xFF),
        McColor::Green => Color::Rgb(0x55, 0xFF, 0x55),
        McColor::Aqua => Color::Rgb(0x55, 0xFF, 0xFF),
        McColor::Red => Color::Rgb(0xFF, 0x55, 0x55),
        McColor::LightPurple => Color::Rgb(0xFF, 0x55, 0xFF),
        McColor::Yellow => Color::Rgb(0xFF, 0xFF, 0x55),
        McColor::White => Color::Reset,
    }
}

fn span_style(style: SpanStyle) -> Style {
    match style {
        SpanStyle::Color(color) => Style::default().fg(mc_color(color)),
        SpanStyle::Bold => Style::default().add_modifier(Modifier::BOLD),
        SpanStyle::Strikethrough => Style::default().add_modifier(Modifier::CROSSED_OUT),
        SpanStyle::Underline => Style::default().add_modifier(Modifier::UNDERLINED),
        SpanStyle::Italic => Style::default().add_modifier(Modifier::ITALIC),
    }
}

pub fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Error => Color::LightRed,
        LogLevel::Warn => Color::LightYellow,
        LogLevel::Debug => Color::Gray,
        LogLevel::Info => Color::LightCyan,
        LogLevel::Success => Color::LightGreen,
    }
}

fn marker_span(marker: &Marker) -> Span<'static> {
    match marker {
        Marker::Level { level, .. } => Span::styled(
            marker.label(),
            Style::default()
                .fg(level_color(*level))
                .add_modifier(Modifier::BOLD),
        ),
        Marker::Thread(_) => Span::styled(marker.label(), Style::default().fg(Color::DarkGray)),
        Marker::Plugin(_) => Span::styled(marker.label(), Style::default().fg(Color::LightMagenta)),
    }
}

pub fn log_line(line: &LogLine) -> Line<'static> {
    let mut spans = Vec::new();
    if line.health_report {
        spans.push(Span::styled("▌ ", Style::default().fg(Color::LightGreen)));
    }
    if let Some(ts) = &line.timestamp {
        spans.push(Span::styled(
            format!("[{ts}] "),
            Style::default().fg(Color::DarkGray),
        ));
    }
    for span in &line.spans {
        let style = span_style(span.style);
        for fragment in &span.fragments {
            match fragment {
                Fragment::Text(text) => spans.push(Span::styled(text.clone(), style)),
                Fragment::Marker(marker) => spans.push(marker_span(marker)),
            }
        }
    }
    let mut out = Line::from(spans);
    if line.level == LogLevel::Success && !line.health_report {
        out = out.style(Style::default().add_modifier(Modifier::BOLD));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftconsole_core::ConsoleRenderer;

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn markers_and_timestamp_are_rendered_as_text() {
        let renderer = ConsoleRenderer::new(true);
        let line = log_line(&renderer.render("[Server thread/WARN] [WARN] §chot", Some("09:00:00")));
        assert_eq!(text_of(&line), "[09:00:00] [Server thread] [WARN] hot");
        let hot = line.spans.last().unwrap();
        assert_eq!(hot.style.fg, Some(mc_color(McColor::Red)));
    }

    #[test]
    fn health_reports_get_a_gutter() {
        let renderer = ConsoleRenderer::new(true);
        let line = log_line(&renderer.render("TPS from last 1m: 20.0", None));
        assert!(text_of(&line).starts_with("▌ TPS"));
    }
}
