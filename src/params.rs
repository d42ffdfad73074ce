use serde::Serialize;

/// One extracted parameter of a processed line: a character span, a token
/// span, an entity label, and the literal text. Regex and IOC extraction
/// fill `entity` with the rule label; wildcard slots from template matching
/// use `unnamed`. Context tokens and the refanged form are present only
/// when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub char_start: usize,
    pub char_end: usize,
    pub token_start: usize,
    pub token_end: usize,
    pub entity: Option<String>,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refanged: Option<String>,
}

impl Parameter {
    pub fn new(
        char_start: usize,
        char_end: usize,
        token_start: usize,
        token_end: usize,
        entity: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            char_start,
            char_end,
            token_start,
            token_end,
            entity: Some(entity.into()),
            value: value.into(),
            prev_token: None,
            next_token: None,
            refanged: None,
        }
    }

    /// A parameter with no entity label, as produced by positional template
    /// walks in the batch strategy.
    pub fn anonymous(
        char_start: usize,
        char_end: usize,
        token_start: usize,
        token_end: usize,
        value: impl Into<String>,
    ) -> Self {
        Self {
            char_start,
            char_end,
            token_start,
            token_end,
            entity: None,
            value: value.into(),
            prev_token: None,
            next_token: None,
            refanged: None,
        }
    }
}

/// Character span of token `idx` in the space-joined rendering of `seq`.
pub fn token_span(seq: &[String], idx: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for (i, tok) in seq.iter().enumerate() {
        if i == idx {
            return Some((start, start + tok.len()));
        }
        start += tok.len() + 1;
    }
    None
}

/// Number of whitespace-delimited tokens fully or partially before `prefix`'s
/// end, i.e. the token index of a match starting right after `prefix`.
pub fn tokens_before(prefix: &str) -> usize {
    prefix.split_whitespace().count()
}
