use crate::ids;
use crate::lcs::{self, WILDCARD};
use crate::params::Parameter;
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;

pub const DEFAULT_TAU: f64 = 0.5;

/// A cluster owned by the batch store: the generalized template and the ids
/// of the member lines, in insertion order.
#[derive(Debug, Clone)]
pub struct Cluster {
    template: Vec<String>,
    line_ids: Vec<usize>,
}

impl Cluster {
    pub fn template(&self) -> &[String] {
        &self.template
    }

    pub fn template_string(&self) -> String {
        self.template.join(" ")
    }

    pub fn line_ids(&self) -> &[usize] {
        &self.line_ids
    }

    fn literal_count(&self) -> usize {
        self.template.iter().filter(|t| !lcs::is_wildcard(t)).count()
    }

    fn literals(&self) -> Vec<String> {
        self.template
            .iter()
            .filter(|t| !lcs::is_wildcard(t))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
struct Node {
    children: AHashMap<String, usize>,
    count: usize,
    cluster: Option<usize>,
}

/// Prefix tree over cluster literal tokens, stored as an arena of nodes
/// addressed by index. A node references a cluster only at the terminal
/// node of that cluster's literal path; pass-through reference counts
/// guard pruning during remove-then-reinsert.
#[derive(Debug)]
struct PrefixTree {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

const ROOT: usize = 0;

impl PrefixTree {
    fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            free: Vec::new(),
        }
    }

    fn alloc(&mut self) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Node::default();
                idx
            }
            None => {
                self.nodes.push(Node::default());
                self.nodes.len() - 1
            }
        }
    }

    fn insert_path(&mut self, literals: &[String], cluster: usize) {
        let mut cur = ROOT;
        for token in literals {
            let next = match self.nodes[cur].children.get(token) {
                Some(&child) => child,
                None => {
                    let child = self.alloc();
                    self.nodes[cur].children.insert(token.clone(), child);
                    child
                }
            };
            self.nodes[next].count += 1;
            cur = next;
        }
        if self.nodes[cur].cluster.is_none() {
            self.nodes[cur].cluster = Some(cluster);
        }
    }

    fn remove_path(&mut self, literals: &[String]) {
        let mut cur = ROOT;
        for token in literals {
            let Some(&child) = self.nodes[cur].children.get(token) else {
                continue;
            };
            if self.nodes[child].count == 1 {
                self.nodes[cur].children.remove(token);
                self.free_subtree(child);
                break;
            }
            self.nodes[child].count -= 1;
            cur = child;
        }
    }

    fn free_subtree(&mut self, idx: usize) {
        let children: Vec<usize> = self.nodes[idx].children.values().copied().collect();
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[idx] = Node::default();
        self.free.push(idx);
    }
}

/// The offline template store: a flat cluster list plus a prefix tree over
/// constant tokens, matched in three escalating stages (tree walk, loose
/// containment, full LCS).
pub struct BatchParser {
    tau: f64,
    clusters: Vec<Cluster>,
    tree: PrefixTree,
}

impl Default for BatchParser {
    fn default() -> Self {
        Self::new(DEFAULT_TAU)
    }
}

impl BatchParser {
    pub fn new(tau: f64) -> Self {
        Self {
            tau,
            clusters: Vec::new(),
            tree: PrefixTree::new(),
        }
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, idx: usize) -> &Cluster {
        &self.clusters[idx]
    }

    /// Insert one tokenized line, returning the index of the cluster it was
    /// assigned to. On a match the template is regenerated from the exact
    /// LCS and the prefix tree is updated remove-first.
    pub fn insert(&mut self, tokens: Vec<String>, line_id: usize) -> usize {
        let matched = if tokens.is_empty() {
            // an empty sequence never matches; it becomes a degenerate,
            // parameter-free cluster
            None
        } else {
            let const_tokens: Vec<String> = tokens
                .iter()
                .filter(|t| !lcs::is_wildcard(t))
                .cloned()
                .collect();
            self.tree_match(ROOT, &const_tokens, 0)
                .or_else(|| self.loop_match(&const_tokens))
                .or_else(|| self.lcs_match(&tokens))
        };

        match matched {
            Some(idx) => {
                let subsequence = lcs::full(&tokens, &self.clusters[idx].template);
                let new_template = regenerate(&subsequence, &self.clusters[idx].template);
                if new_template != self.clusters[idx].template {
                    let old_literals = self.clusters[idx].literals();
                    self.tree.remove_path(&old_literals);
                    self.clusters[idx].template = new_template;
                    let new_literals = self.clusters[idx].literals();
                    self.tree.insert_path(&new_literals, idx);
                }
                self.clusters[idx].line_ids.push(line_id);
                idx
            }
            None => {
                let idx = self.clusters.len();
                let literals: Vec<String> = tokens
                    .iter()
                    .filter(|t| !lcs::is_wildcard(t))
                    .cloned()
                    .collect();
                self.clusters.push(Cluster {
                    template: tokens,
                    line_ids: vec![line_id],
                });
                self.tree.insert_path(&literals, idx);
                idx
            }
        }
    }

    /// Stage 1: walk the constant tokens down the tree. A node that owns a
    /// cluster qualifies when the cluster's literal count exceeds
    /// `tau * n`; a node without one continues the walk from the next
    /// position.
    fn tree_match(&self, node: usize, seq: &[String], from: usize) -> Option<usize> {
        let n = seq.len();
        for i in from..n {
            if let Some(&child) = self.tree.nodes[node].children.get(&seq[i]) {
                match self.tree.nodes[child].cluster {
                    Some(cluster_idx) => {
                        let literal_count = self.clusters[cluster_idx].literal_count();
                        if literal_count as f64 > self.tau * n as f64 {
                            return Some(cluster_idx);
                        }
                    }
                    None => return self.tree_match(child, seq, i + 1),
                }
            }
        }
        None
    }

    /// Stage 2: order-insensitive containment, reserved for sequences with
    /// large repeated-token runs that defeat the tree walk.
    fn loop_match(&self, seq: &[String]) -> Option<usize> {
        let seq_set: AHashSet<&str> = seq.iter().map(String::as_str).collect();
        for (idx, cluster) in self.clusters.iter().enumerate() {
            if 2 * cluster.template.len() < seq.len() {
                continue;
            }
            if cluster
                .template
                .iter()
                .all(|t| lcs::is_wildcard(t) || seq_set.contains(t.as_str()))
            {
                return Some(idx);
            }
        }
        None
    }

    /// Stage 3: exact LCS against every cluster passing a shared-token
    /// prefilter. Ties prefer the shorter (more specific) template; the best
    /// length must reach `tau * n`.
    fn lcs_match(&self, seq: &[String]) -> Option<usize> {
        let seq_set: AHashSet<&str> = seq.iter().map(String::as_str).collect();
        let n = seq.len();
        let mut max_len: isize = -1;
        let mut max_cluster: Option<usize> = None;
        for (idx, cluster) in self.clusters.iter().enumerate() {
            let template_set: AHashSet<&str> =
                cluster.template.iter().map(String::as_str).collect();
            let shared = seq_set.intersection(&template_set).count();
            if 2 * shared < n {
                continue;
            }
            let len = lcs::full(seq, &cluster.template).len() as isize;
            let shorter = max_cluster
                .map_or(false, |best| cluster.template.len() < self.clusters[best].template.len());
            if len > max_len || (len == max_len && shorter) {
                max_len = len;
                max_cluster = Some(idx);
            }
        }
        if max_len as f64 >= self.tau * n as f64 {
            max_cluster
        } else {
            None
        }
    }

    /// Per-cluster reporting rows: event id, template, member count.
    pub fn cluster_rows(&self) -> Vec<ClusterRow> {
        self.clusters
            .iter()
            .map(|c| {
                let template = c.template_string();
                ClusterRow {
                    event_id: ids::short_id(&template),
                    template,
                    count: c.line_ids.len(),
                }
            })
            .collect()
    }

    /// Per-line assignment rows, ordered by line id.
    pub fn assignments(&self) -> Vec<Assignment> {
        self.clusters
            .iter()
            .flat_map(|c| {
                let template = c.template_string();
                let event_id = ids::short_id(&template);
                c.line_ids.iter().map(move |&line_id| Assignment {
                    line_id,
                    event_id: event_id.clone(),
                    template: template.clone(),
                })
            })
            .sorted_by_key(|r| r.line_id)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRow {
    pub event_id: String,
    pub template: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub line_id: usize,
    pub event_id: String,
    pub template: String,
}

/// Regenerate a template from an exact LCS: walk the old template consuming
/// the subsequence from the front, wildcarding every non-participating
/// position and collapsing a trailing unmatched run into one wildcard entry.
fn regenerate(subsequence: &[String], template: &[String]) -> Vec<String> {
    if subsequence.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(template.len());
    let mut next = 0usize;
    let mut consumed = 0usize;
    for token in template {
        consumed += 1;
        if *token == subsequence[next] {
            out.push(token.clone());
            next += 1;
        } else {
            out.push(WILDCARD.to_string());
        }
        if next == subsequence.len() {
            break;
        }
    }
    if consumed < template.len() {
        out.push(WILDCARD.to_string());
    }
    out
}

/// Positional parameter extraction for a finalized template: one parameter
/// per non-aligning position, with char positions advanced by the original
/// (pre-mask) token lengths, and a trailing unmatched run emitted as a
/// single space-joined parameter.
pub fn extract_parameters(
    template: &[String],
    tokens: &[String],
    original: &[String],
) -> Vec<Parameter> {
    if template.is_empty() {
        return Vec::new();
    }
    let mut params = Vec::new();
    let mut pos = 0usize;
    let mut consumed = 0usize;
    for (k, token) in tokens.iter().enumerate() {
        if k >= template.len() {
            break;
        }
        consumed += 1;
        if *token != template[k] {
            params.push(Parameter::anonymous(
                pos,
                pos + token.len(),
                k,
                k + 1,
                token.as_str(),
            ));
        }
        pos += original.get(k).map_or(token.len(), String::len) + 1;
        if consumed == template.len() {
            break;
        }
    }
    if consumed < tokens.len() {
        let rest = tokens[consumed..].join(" ");
        let char_end = pos + rest.len();
        params.push(Parameter::anonymous(
            pos,
            char_end,
            consumed,
            tokens.len(),
            rest,
        ));
    }
    params
}
