//! Incremental text extraction.
//!
//! Large sources are processed in bounded chunks, so both UTF-8 decoding and
//! markup stripping keep their state between chunks: a multi-byte character,
//! a tag, a comment or an entity may straddle a chunk boundary.

/// Longest entity name that is still decoded.
const MAX_ENTITY: usize = 10;

/// Decodes UTF-8 across chunk boundaries, replacing invalid sequences.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    /// New decoder with no pending bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk. Bytes of an incomplete trailing character are
    /// kept until the next call.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush pending bytes at end of input.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            String::new()
        } else {
            self.carry.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Text,
    Tag { buf: String, quote: Option<char> },
    Comment { dashes: u8 },
    Entity(String),
    /// Inside `<script>` or `<style>`; `probe` collects a candidate closing tag.
    Raw { tag: &'static str, probe: String },
}

/// Streaming markup stripper.
///
/// Feeds text through a small state machine that drops tags, comments and
/// the bodies of `script`/`style`, decodes common entities, turns
/// block-level tags into line breaks and collapses runs of whitespace.
#[derive(Debug)]
pub struct MarkupStripper {
    markup: bool,
    state: State,
    space_pending: bool,
    newline_run: u8,
    at_line_start: bool,
}

impl MarkupStripper {
    /// Stripper for a markup source.
    pub fn new() -> Self {
        Self::with_markup(true)
    }

    /// Stripper that only normalizes line endings when `markup` is false.
    pub fn with_markup(markup: bool) -> Self {
        Self {
            markup,
            state: State::Text,
            space_pending: false,
            newline_run: 0,
            at_line_start: true,
        }
    }

    /// Process one chunk, appending plain text to `out`.
    pub fn feed(&mut self, chunk: &str, out: &mut String) {
        if !self.markup {
            for c in chunk.chars() {
                match c {
                    '\r' => {}
                    '\u{c}' => out.push('\n'),
                    c => out.push(c),
                }
            }
            return;
        }
        for c in chunk.chars() {
            self.step(c, out);
        }
    }

    /// Flush state at end of input.
    pub fn finish(&mut self, out: &mut String) {
        if let State::Entity(buf) = std::mem::replace(&mut self.state, State::Text) {
            self.emit('&', out);
            for c in buf.chars() {
                self.emit(c, out);
            }
        }
        self.state = State::Text;
    }

    fn step(&mut self, c: char, out: &mut String) {
        match &mut self.state {
            State::Text => match c {
                '<' => {
                    self.state = State::Tag {
                        buf: String::new(),
                        quote: None,
                    }
                }
                '&' => self.state = State::Entity(String::new()),
                c => self.emit(c, out),
            },
            State::Tag { buf, quote } => {
                match (*quote, c) {
                    (Some(q), c) if c == q => *quote = None,
                    (Some(_), _) => {}
                    (None, '"' | '\'') if !buf.is_empty() && !buf.starts_with('!') => {
                        *quote = Some(c)
                    }
                    (None, '>') => {
                        let tag = std::mem::take(buf);
                        self.state = State::Text;
                        self.close_tag(&tag, out);
                        return;
                    }
                    _ => {}
                }
                if buf.len() < 64 {
                    buf.push(c);
                }
                if buf == "!--" {
                    self.state = State::Comment { dashes: 0 };
                }
            }
            State::Comment { dashes } => match c {
                '-' => *dashes = dashes.saturating_add(1),
                '>' if *dashes >= 2 => self.state = State::Text,
                _ => *dashes = 0,
            },
            State::Entity(buf) => {
                if c == ';' {
                    let name = std::mem::take(buf);
                    self.state = State::Text;
                    match decode_entity(&name) {
                        Some(decoded) => self.emit(decoded, out),
                        None => {
                            self.emit('&', out);
                            for ch in name.chars() {
                                self.emit(ch, out);
                            }
                            self.emit(';', out);
                        }
                    }
                } else if (c.is_ascii_alphanumeric() || c == '#') && buf.len() < MAX_ENTITY {
                    buf.push(c);
                } else {
                    let name = std::mem::take(buf);
                    self.state = State::Text;
                    self.emit('&', out);
                    for ch in name.chars() {
                        self.emit(ch, out);
                    }
                    self.step(c, out);
                }
            }
            State::Raw { tag, probe } => {
                if probe.is_empty() {
                    if c == '<' {
                        probe.push(c);
                    }
                    return;
                }
                probe.push(c.to_ascii_lowercase());
                let target_len = tag.len() + 2;
                let matches_so_far = probe.len() <= target_len
                    && format!("</{tag}").starts_with(probe.as_str());
                if !matches_so_far {
                    probe.clear();
                    if c == '<' {
                        probe.push(c);
                    }
                } else if probe.len() == target_len {
                    let closing = format!("/{tag}");
                    self.state = State::Tag {
                        buf: closing,
                        quote: None,
                    };
                }
            }
        }
    }

    fn close_tag(&mut self, tag: &str, out: &mut String) {
        let name = tag_name(tag);
        let closing = tag.starts_with('/');
        match name.as_str() {
            "script" | "style" if !closing && !tag.ends_with('/') => {
                self.state = State::Raw {
                    tag: if name == "script" { "script" } else { "style" },
                    probe: String::new(),
                };
            }
            "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            | "table" | "pre" | "hr" | "blockquote" | "title" | "document" | "text"
            | "sec-header" | "ul" | "ol" => self.emit('\n', out),
            "td" | "th" if closing => self.emit(' ', out),
            _ => {}
        }
    }

    fn emit(&mut self, c: char, out: &mut String) {
        match c {
            '\n' => {
                self.space_pending = false;
                if self.newline_run < 2 {
                    out.push('\n');
                    self.newline_run += 1;
                }
                self.at_line_start = true;
            }
            c if c.is_whitespace() => {
                if !self.at_line_start {
                    self.space_pending = true;
                }
            }
            c => {
                if self.space_pending {
                    out.push(' ');
                    self.space_pending = false;
                }
                out.push(c);
                self.newline_run = 0;
                self.at_line_start = false;
            }
        }
    }
}

impl Default for MarkupStripper {
    fn default() -> Self {
        Self::new()
    }
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Decode an entity name (without `&` and `;`).
pub fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return match char::from_u32(code)? {
            '\u{a0}' => Some(' '),
            c => Some(c),
        };
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" | "ensp" | "emsp" | "thinsp" => ' ',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "rsquo" | "lsquo" => '\'',
        "rdquo" | "ldquo" => '"',
        "bull" => '\u{2022}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "sect" => '\u{a7}',
        "hellip" => '\u{2026}',
        _ => return None,
    })
}

/// Strip markup from a complete string.
pub fn strip_markup(input: &str) -> String {
    let mut stripper = MarkupStripper::new();
    let mut out = String::with_capacity(input.len() / 2);
    stripper.feed(input, &mut out);
    stripper.finish(&mut out);
    out
}

/// Wrap one line to at most `width` characters, preferring to break at spaces.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let expanded = line.replace('\t', "    ");
    let chars: Vec<char> = expanded.trim_end().chars().collect();
    if chars.len() <= width {
        return vec![chars.into_iter().collect()];
    }

    let mut lines = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + width).min(chars.len());
        let mut cut = end;
        if end < chars.len()
            && let Some(space) = chars[start..end].iter().rposition(|c| *c == ' ')
            && space > 0
        {
            cut = start + space;
        }
        lines.push(chars[start..cut].iter().collect::<String>());
        start = cut;
        while start < chars.len() && chars[start] == ' ' {
            start += 1;
        }
    }
    lines
}
