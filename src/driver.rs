use crate::ids;
use crate::ioc;
use crate::params::{token_span, Parameter};
use crate::preprocess;
use crate::rules::RuleSet;
use crate::streaming::LcsMap;
use crate::tokenizer::{self, LineFormat};
use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// External named-entity tagger the driver can optionally invoke; results
/// are merged into the per-line parameter list as-is. No tagging happens
/// in-crate.
pub trait EntityTagger {
    fn tag(&self, content: &str) -> Vec<Parameter>;
}

#[derive(Debug, Error)]
pub enum LineError {
    #[error("line does not match the configured log format")]
    FormatMismatch,
    #[error("log format captured no `content` field")]
    MissingContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    ProcessingLine,
    Flushing,
}

/// The structured record emitted for every successfully processed line.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub log_id: String,
    pub line: String,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
    pub log_key: String,
    pub event_id: usize,
    pub params: Vec<Parameter>,
}

/// Options for a streaming run. The defaults mirror the configuration
/// surface: a whitespace separator, a single `<content>` field, IOC
/// extraction on, no external tagger.
pub struct DriverConfig {
    pub log_format: String,
    pub extract_iocs: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            log_format: "<content>".to_string(),
            extract_iocs: true,
        }
    }
}

/// Single-threaded, line-at-a-time state machine over the streaming
/// template store. A failed line is dropped, counted, and never touches
/// the store; only format compilation can fail, and only at construction.
pub struct StreamingDriver {
    format: LineFormat,
    rules: RuleSet,
    map: LcsMap,
    tagger: Option<Box<dyn EntityTagger>>,
    extract_iocs: bool,
    state: DriverState,
    log_keys: Vec<String>,
    seen_keys: AHashSet<String>,
    processed: usize,
    dropped: usize,
}

impl StreamingDriver {
    pub fn new(config: DriverConfig, rules: RuleSet) -> Result<Self, tokenizer::FormatError> {
        let format = LineFormat::compile(&config.log_format)?;
        Ok(Self {
            format,
            rules,
            map: LcsMap::new(),
            tagger: None,
            extract_iocs: config.extract_iocs,
            state: DriverState::Idle,
            log_keys: Vec::new(),
            seen_keys: AHashSet::new(),
            processed: 0,
            dropped: 0,
        })
    }

    pub fn with_tagger(mut self, tagger: Box<dyn EntityTagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn store(&self) -> &LcsMap {
        &self.map
    }

    /// Process one raw input line. Errors are recoverable: the line is
    /// dropped, the counter advances, and the machine returns to idle
    /// without having mutated the template store.
    pub fn process_line(&mut self, raw: &str) -> Result<LogRecord, LineError> {
        self.state = DriverState::ProcessingLine;
        let result = self.process_inner(raw);
        match &result {
            Ok(_) => self.processed += 1,
            Err(err) => {
                self.dropped += 1;
                tracing::warn!(error = %err, line = raw, "dropping line");
            }
        }
        self.state = DriverState::Idle;
        result
    }

    fn process_inner(&mut self, raw: &str) -> Result<LogRecord, LineError> {
        let line = tokenizer::sanitize(raw.trim());
        let fields = self.format.parse(&line).ok_or(LineError::FormatMismatch)?;

        let mut metadata = BTreeMap::new();
        let mut content: Option<String> = None;
        for (name, value) in fields {
            if name == "content" {
                content = Some(value.to_string());
            } else {
                metadata.insert(name.to_string(), value.to_string());
            }
        }
        let content = content.ok_or(LineError::MissingContent)?;

        // token sequence of the unmasked content, kept for span arithmetic
        let seq = tokenizer::split(&content, tokenizer::default_separator());

        let (content, mut params) = if self.extract_iocs {
            ioc::extract(&content)
        } else {
            (content, Vec::new())
        };
        let (content, rule_params) = preprocess::preprocess(&content, &self.rules);
        params.extend(rule_params);

        if let Some(tagger) = &self.tagger {
            params.extend(tagger.tag(&content));
        }

        let idx = self.map.insert(&content);
        let obj = &self.map[idx];
        let masked_seq = tokenizer::split(&content, tokenizer::default_separator());
        for run in obj.params(&masked_seq) {
            for slot in run {
                let Some((char_start, char_end)) = token_span(&seq, slot.token_index) else {
                    continue;
                };
                let mut p = Parameter::new(
                    char_start,
                    char_end,
                    slot.token_index,
                    slot.token_index + 1,
                    "unnamed",
                    slot.value,
                );
                p.prev_token = slot.prev_token;
                p.next_token = slot.next_token;
                params.push(p);
            }
        }
        params.sort_by_key(|p| p.char_start);

        let log_key = obj.template_string();
        if self.seen_keys.insert(log_key.clone()) {
            self.log_keys.push(log_key.clone());
        }

        let log_id = ids::short_id(&format!("{content}{}", chrono::Utc::now().to_rfc3339()));
        Ok(LogRecord {
            log_id,
            line,
            message: seq.join(" "),
            metadata,
            log_key,
            event_id: obj.object_id(),
            params,
        })
    }

    /// End of input: transition to flushing and hand back the distinct
    /// template strings in first-seen order. The caller persists them once;
    /// the machine is done afterwards and accepts no further lines.
    pub fn finish(&mut self) -> Vec<String> {
        self.state = DriverState::Flushing;
        std::mem::take(&mut self.log_keys)
    }
}
