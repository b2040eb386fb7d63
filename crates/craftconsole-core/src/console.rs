use regex::Regex;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::OnceLock;

const HEALTH_REPORT_KEYWORDS: &[&str] = &[
    "Generating server health report",
    "TPS from last",
    "Tick durations",
    "CPU usage",
    "Memory usage",
    "Network usage",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
            LogLevel::Success => "success",
        }
    }
}

const LEVEL_TAGS: &[(LogLevel, &[&str])] = &[
    (LogLevel::Error, &["[ERROR]", "[SEVERE]"]),
    (LogLevel::Warn, &["[WARN]", "[WARNING]"]),
    (LogLevel::Debug, &["[DEBUG]"]),
    (LogLevel::Info, &["[INFO]"]),
    (LogLevel::Success, &["[SUCCESS]"]),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum McColor {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
}

impl McColor {
    const ALL: [McColor; 16] = [
        McColor::Black,
        McColor::DarkBlue,
        McColor::DarkGreen,
        McColor::DarkAqua,
        McColor::DarkRed,
        McColor::DarkPurple,
        McColor::Gold,
        McColor::Gray,
        McColor::DarkGray,
        McColor::Blue,
        McColor::Green,
        McColor::Aqua,
        McColor::Red,
        McColor::LightPurple,
        McColor::Yellow,
        McColor::White,
    ];

    pub fn from_code(code: char) -> Option<McColor> {
        let index = code.to_digit(16)?;
        if code.is_ascii_uppercase() {
            return None;
        }
        Self::ALL.get(index as usize).copied()
    }

    pub fn code(&self) -> char {
        let index = Self::ALL.iter().position(|c| c == self).unwrap_or(15);
        std::char::from_digit(index as u32, 16).unwrap_or('f')
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpanStyle {
    Color(McColor),
    Bold,
    Strikethrough,
    Underline,
    Italic,
}

impl SpanStyle {
    pub const DEFAULT: SpanStyle = SpanStyle::Color(McColor::White);

    pub fn from_code(code: char) -> Option<SpanStyle> {
        match code {
            'l' => Some(SpanStyle::Bold),
            'm' => Some(SpanStyle::Strikethrough),
            'n' => Some(SpanStyle::Underline),
            'o' => Some(SpanStyle::Italic),
            'r' => Some(SpanStyle::DEFAULT),
            _ => McColor::from_code(code).map(SpanStyle::Color),
        }
    }

    pub fn css_class(&self) -> String {
        match self {
            SpanStyle::Color(color) => format!("mc-color-{}", color.code()),
            SpanStyle::Bold => "mc-bold".to_string(),
            SpanStyle::Strikethrough => "mc-strikethrough".to_string(),
            SpanStyle::Underline => "mc-underline".to_string(),
            SpanStyle::Italic => "mc-italic".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    Level { level: LogLevel, label: String },
    Thread(String),
    Plugin(String),
}

impl Marker {
    pub fn label(&self) -> String {
        match self {
            Marker::Level { label, .. } => format!("[{label}]"),
            Marker::Thread(name) | Marker::Plugin(name) => format!("[{name}]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Marker(Marker),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledSpan {
    pub style: SpanStyle,
    pub fragments: Vec<Fragment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub raw: String,
    pub timestamp: Option<String>,
    pub level: LogLevel,
    pub thread: Option<String>,
    pub plugin: Option<String>,
    pub health_report: bool,
    pub spans: Vec<StyledSpan>,
}

impl LogLine {
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            for fragment in &span.fragments {
                match fragment {
                    Fragment::Text(text) => out.push_str(text),
                    Fragment::Marker(marker) => out.push_str(&marker.label()),
                }
            }
        }
        out
    }

    pub fn to_html(&self) -> String {
        let mut body = String::new();
        for span in &self.spans {
            let _ = write!(body, "<span class='{}'>", span.style.css_class());
            for fragment in &span.fragments {
                match fragment {
                    Fragment::Text(text) => body.push_str(&escape(text)),
                    Fragment::Marker(Marker::Level { level, label }) => {
                        let _ = write!(
                            body,
                            "<span class=\"log-level log-level-{}\">{}</span>",
                            level.as_str(),
                            escape(label)
                        );
                    }
                    Fragment::Marker(Marker::Thread(name)) => {
                        let _ = write!(body, "<span class=\"thread-name\">[{}]</span>", escape(name));
                    }
                    Fragment::Marker(Marker::Plugin(name)) => {
                        let _ = write!(body, "<span class=\"plugin-tag\">[{}]</span>", escape(name));
                    }
                }
            }
            body.push_str("</span>");
        }

        if self.health_report {
            return format!("<div class=\"health-report\">{body}</div>");
        }
        let mut html = String::from("<div class=\"log-line\">");
        if let Some(ts) = &self.timestamp {
            let _ = write!(html, "<span class=\"log-timestamp\">[{}]</span>", escape(ts));
        }
        html.push_str(&body);
        html.push_str("</div>");
        html
    }
}

fn escape(text: &str) -> String {
    text.replace('<', "&lt;")
}

enum Piece {
    Text(String),
    Marker(Marker),
}

fn splice_first<F>(pieces: &mut Vec<Piece>, mut find: F) -> Option<Marker>
where
    F: FnMut(&str) -> Option<(Range<usize>, Marker)>,
{
    for index in 0..pieces.len() {
        let Piece::Text(text) = &pieces[index] else {
            continue;
        };
        let Some((range, marker)) = find(text) else {
            continue;
        };
        let before = text[..range.start].to_string();
        let after = text[range.end..].to_string();
        let mut replacement = Vec::with_capacity(3);
        if !before.is_empty() {
            replacement.push(Piece::Text(before));
        }
        replacement.push(Piece::Marker(marker.clone()));
        if !after.is_empty() {
            replacement.push(Piece::Text(after));
        }
        pieces.splice(index..=index, replacement);
        return Some(marker);
    }
    None
}

fn thread_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]+)/(\w+)\]").expect("thread pattern"))
}

fn bracket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]+)\]").expect("bracket pattern"))
}

fn plugin_follower() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*:?\s*[\[⚡🔧🛠✨💡]").expect("plugin follower pattern"))
}

fn find_plugin(text: &str) -> Option<(Range<usize>, Marker)> {
    for caps in bracket_pattern().captures_iter(text) {
        let whole = caps.get(0)?;
        if plugin_follower().is_match(&text[whole.end()..]) {
            return Some((whole.range(), Marker::Plugin(caps[1].to_string())));
        }
    }
    None
}

fn contains_text(pieces: &[Piece], needle: &str) -> bool {
    pieces
        .iter()
        .any(|p| matches!(p, Piece::Text(text) if text.contains(needle)))
}

#[derive(Clone, Debug, Default)]
pub struct ConsoleRenderer {
    show_timestamp: bool,
}

impl ConsoleRenderer {
    pub fn new(show_timestamp: bool) -> Self {
        Self { show_timestamp }
    }

    pub fn show_timestamp(&self) -> bool {
        self.show_timestamp
    }

    pub fn set_show_timestamp(&mut self, show: bool) {
        self.show_timestamp = show;
    }

    pub fn render(&self, raw: &str, time: Option<&str>) -> LogLine {
        if HEALTH_REPORT_KEYWORDS.iter().any(|k| raw.contains(k)) {
            return LogLine {
                raw: raw.to_string(),
                timestamp: None,
                level: LogLevel::Info,
                thread: None,
                plugin: None,
                health_report: true,
                spans: apply_codes(vec![Piece::Text(raw.to_string())]),
            };
        }

        let mut pieces = vec![Piece::Text(raw.to_string())];
        let level = detect_level(&mut pieces);

        let thread = match splice_first(&mut pieces, |text| {
            let caps = thread_pattern().captures(text)?;
            let whole = caps.get(0)?;
            Some((whole.range(), Marker::Thread(caps[1].to_string())))
        }) {
            Some(Marker::Thread(name)) => Some(name),
            _ => None,
        };

        let plugin = match splice_first(&mut pieces, find_plugin) {
            Some(Marker::Plugin(name)) => Some(name),
            _ => None,
        };

        let timestamp = self.show_timestamp.then(|| match time {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => chrono::Local::now().format("%H:%M:%S").to_string(),
        });

        LogLine {
            raw: raw.to_string(),
            timestamp,
            level,
            thread,
            plugin,
            health_report: false,
            spans: apply_codes(pieces),
        }
    }
}

fn detect_level(pieces: &mut Vec<Piece>) -> LogLevel {
    for (level, tags) in LEVEL_TAGS {
        if !tags.iter().any(|tag| contains_text(pieces, tag)) {
            continue;
        }
        for tag in tags.iter() {
            splice_first(pieces, |text| {
                let start = text.find(tag)?;
                let label = tag.trim_start_matches('[').trim_end_matches(']').to_string();
                Some((
                    start..start + tag.len(),
                    Marker::Level {
                        level: *level,
                        label,
                    },
                ))
            });
        }
        return *level;
    }
    if contains_text(pieces, "Done") {
        return LogLevel::Success;
    }
    LogLevel::Info
}

// Splits text on `§` codes into a flat chain of spans. Every line opens in
// the default color; each recognized code closes the current span.
fn apply_codes(pieces: Vec<Piece>) -> Vec<StyledSpan> {
    let mut spans = Vec::new();
    let mut current = StyledSpan {
        style: SpanStyle::DEFAULT,
        fragments: Vec::new(),
    };

    for piece in pieces {
        let text = match piece {
            Piece::Marker(marker) => {
                current.fragments.push(Fragment::Marker(marker));
                continue;
            }
            Piece::Text(text) => text,
        };

        let mut buf = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '§' {
                if let Some(style) = chars.peek().copied().and_then(SpanStyle::from_code) {
                    chars.next();
                    if !buf.is_empty() {
                        current.fragments.push(Fragment::Text(std::mem::take(&mut buf)));
                    }
                    let finished = std::mem::replace(
                        &mut current,
                        StyledSpan {
                            style,
                            fragments: Vec::new(),
                        },
                    );
                    if !finished.fragments.is_empty() {
                        spans.push(finished);
                    }
                    continue;
                }
            }
            buf.push(c);
        }
        if !buf.is_empty() {
            current.fragments.push(Fragment::Text(buf));
        }
    }

    if !current.fragments.is_empty() || spans.is_empty() {
        spans.push(current);
    }
    spans
}

#[derive(Clone, Debug, Default)]
pub struct LogBuffer {
    lines: Vec<LogLine>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: LogLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn last(&self) -> Option<&LogLine> {
        self.lines.last()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
