use crate::lcs::{self, WILDCARD};
use crate::tokenizer;
use regex::Regex;
use std::ops::Index;

/// One token consumed by a wildcard slot during a template re-walk, with
/// the neighbouring literal tokens where the template has them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotParam {
    pub token_index: usize,
    pub value: String,
    pub prev_token: Option<String>,
    pub next_token: Option<String>,
}

/// A discovered cluster: the generalized template plus the ids of every
/// line assigned to it. Mutated in place when a new line generalizes the
/// template further; never merged with another cluster, never destroyed.
#[derive(Debug, Clone)]
pub struct LcsObject {
    object_id: usize,
    template: Vec<String>,
    line_ids: Vec<usize>,
}

impl LcsObject {
    fn new(object_id: usize, template: Vec<String>, line_id: usize) -> Self {
        Self {
            object_id,
            template,
            line_ids: vec![line_id],
        }
    }

    pub fn object_id(&self) -> usize {
        self.object_id
    }

    pub fn line_ids(&self) -> &[usize] {
        &self.line_ids
    }

    pub fn template(&self) -> &[String] {
        &self.template
    }

    pub fn template_string(&self) -> String {
        self.template.join(" ")
    }

    pub fn len(&self) -> usize {
        self.template.len()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    fn match_count(&self, seq: &[String]) -> usize {
        lcs::greedy_count(&self.template, seq)
    }

    /// Re-walk the template against `seq` with the same greedy forward
    /// alignment used for matching, emitting a literal where they align and
    /// collapsing every run of non-aligning positions into one wildcard.
    /// The literal positions of the template can only shrink here.
    fn merge(&mut self, seq: &[String], line_id: usize) {
        self.line_ids.push(line_id);
        let mut merged: Vec<String> = Vec::with_capacity(self.template.len());
        let mut last_match: Option<usize> = None;
        let mut placeholder = false;
        for token in &self.template {
            if lcs::is_wildcard(token) {
                if !placeholder {
                    merged.push(WILDCARD.to_string());
                }
                placeholder = true;
                continue;
            }
            let from = last_match.map_or(0, |j| j + 1);
            for j in from..seq.len() {
                if seq[j] == *token {
                    placeholder = false;
                    merged.push(token.clone());
                    last_match = Some(j);
                    break;
                } else if !placeholder {
                    merged.push(WILDCARD.to_string());
                    placeholder = true;
                }
            }
        }
        self.template = merged;
    }

    /// Extract the wildcard-slot parameters of `seq` against the current
    /// template: one entry per consumed token, grouped by wildcard run.
    /// Returns nothing when the walk cannot consume the whole sequence.
    pub fn params(&self, seq: &[String]) -> Vec<Vec<SlotParam>> {
        let template = &self.template;
        let mut runs: Vec<Vec<SlotParam>> = Vec::new();
        let mut j = 0usize;
        let mut prev_token: Option<String> = None;
        let mut fill_next = false;
        for i in 0..template.len() {
            if lcs::is_wildcard(&template[i]) {
                let mut slot = Vec::new();
                while j < seq.len() {
                    if i + 1 < template.len() && template[i + 1] == seq[j] {
                        break;
                    }
                    slot.push(SlotParam {
                        token_index: j,
                        value: seq[j].clone(),
                        prev_token: prev_token.take(),
                        next_token: None,
                    });
                    fill_next = true;
                    j += 1;
                }
                runs.push(slot);
            } else {
                if j >= seq.len() || template[i] != seq[j] {
                    return Vec::new();
                }
                prev_token = Some(template[i].clone());
                if fill_next {
                    if let Some(last) = runs.last_mut().and_then(|run| run.last_mut()) {
                        last.next_token = prev_token.clone();
                    }
                    fill_next = false;
                }
                j += 1;
            }
        }
        if j != seq.len() {
            return Vec::new();
        }
        runs
    }
}

/// The streaming template store: an append-only list of clusters scanned
/// linearly with a length-ratio prefilter, owning its own line and object
/// counters.
pub struct LcsMap {
    separator: Regex,
    objects: Vec<LcsObject>,
    line_id: usize,
    object_id: usize,
}

impl Default for LcsMap {
    fn default() -> Self {
        Self::new()
    }
}

impl LcsMap {
    pub fn new() -> Self {
        Self::with_separator(tokenizer::default_separator().clone())
    }

    pub fn with_separator(separator: Regex) -> Self {
        Self {
            separator,
            objects: Vec::new(),
            line_id: 0,
            object_id: 0,
        }
    }

    /// Insert one line of content, returning the index of the cluster it
    /// joined (or that was created for it).
    pub fn insert(&mut self, entry: &str) -> usize {
        let seq = tokenizer::split(entry, &self.separator);
        self.insert_seq(seq)
    }

    pub fn insert_seq(&mut self, seq: Vec<String>) -> usize {
        match self.match_seq(&seq) {
            Some(idx) => {
                self.line_id += 1;
                let line_id = self.line_id;
                self.objects[idx].merge(&seq, line_id);
                idx
            }
            None => {
                self.line_id += 1;
                let obj = LcsObject::new(self.object_id, seq, self.line_id);
                self.object_id += 1;
                self.objects.push(obj);
                self.objects.len() - 1
            }
        }
    }

    /// Best-match scan: a candidate template must be between half and double
    /// the input length, and its greedy alignment count must reach half the
    /// input length. Strictly greater counts win; ties keep the earliest
    /// cluster. An empty input never matches.
    pub fn match_seq(&self, seq: &[String]) -> Option<usize> {
        let n = seq.len();
        let mut best: Option<usize> = None;
        let mut best_count = 0usize;
        for (idx, obj) in self.objects.iter().enumerate() {
            let t_len = obj.len();
            if 2 * t_len < n || t_len > 2 * n {
                continue;
            }
            let count = obj.match_count(seq);
            if 2 * count >= n && count > best_count {
                best = Some(idx);
                best_count = count;
            }
        }
        best
    }

    pub fn objects(&self) -> &[LcsObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn separator(&self) -> &Regex {
        &self.separator
    }
}

impl Index<usize> for LcsMap {
    type Output = LcsObject;

    fn index(&self, idx: usize) -> &LcsObject {
        &self.objects[idx]
    }
}
