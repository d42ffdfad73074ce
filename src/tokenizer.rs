use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("log format `{spec}` did not compile: {source}")]
    Compile {
        spec: String,
        #[source]
        source: regex::Error,
    },
    #[error("log format `{0}` declares no fields")]
    NoFields(String),
}

static RE_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]+>").unwrap());
static RE_SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());
static RE_NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Marker substituted for any run of bytes outside the 7-bit ASCII range,
/// keeping span arithmetic stable downstream.
pub const NON_ASCII_MARKER: &str = "<NASCII>";

pub fn sanitize(line: &str) -> String {
    RE_NON_ASCII.replace_all(line, NON_ASCII_MARKER).into_owned()
}

/// Separator used to tokenize free-text content: runs of whitespace.
pub fn default_separator() -> &'static Regex {
    &RE_WHITESPACE
}

/// Split `text` on `separator`, dropping empty tokens.
pub fn split(text: &str, separator: &Regex) -> Vec<String> {
    separator
        .split(text.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A compiled log-format spec such as `"<process>: <content>"`.
///
/// Literal segments are escaped, whitespace runs in literals match any
/// whitespace run, and each `<field>` becomes a non-greedy named capture.
/// The matcher is anchored to the whole line.
pub struct LineFormat {
    fields: Vec<String>,
    regex: Regex,
}

impl LineFormat {
    pub fn compile(spec: &str) -> Result<Self, FormatError> {
        let mut fields = Vec::new();
        let mut pattern = String::from("^");
        let mut last = 0;
        for m in RE_FIELD.find_iter(spec) {
            push_literal(&mut pattern, &spec[last..m.start()]);
            let name = &spec[m.start() + 1..m.end() - 1];
            pattern.push_str(&format!("(?P<{name}>.*?)"));
            fields.push(name.to_string());
            last = m.end();
        }
        push_literal(&mut pattern, &spec[last..]);
        pattern.push('$');

        if fields.is_empty() {
            return Err(FormatError::NoFields(spec.to_string()));
        }
        let regex = Regex::new(&pattern).map_err(|source| FormatError::Compile {
            spec: spec.to_string(),
            source,
        })?;
        Ok(Self { fields, regex })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Match a line against the format, returning the captured fields in
    /// declaration order. `None` when the line does not fit the format.
    pub fn parse<'a>(&self, line: &'a str) -> Option<Vec<(&str, &'a str)>> {
        let caps = self.regex.captures(line)?;
        Some(
            self.fields
                .iter()
                .map(|f| (f.as_str(), caps.name(f).map(|m| m.as_str()).unwrap_or("")))
                .collect(),
        )
    }
}

fn push_literal(pattern: &mut String, literal: &str) {
    let escaped = regex::escape(literal);
    pattern.push_str(&RE_SPACE_RUN.replace_all(&escaped, r"\s+"));
}
