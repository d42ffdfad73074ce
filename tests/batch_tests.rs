use autoparse::batch::{self, BatchParser};

fn toks(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

#[test]
fn disjoint_sequences_form_separate_clusters() {
    let mut parser = BatchParser::default();
    parser.insert(toks("a b c d"), 1);
    parser.insert(toks("w x y z"), 2);
    assert_eq!(parser.clusters().len(), 2);
    assert_eq!(parser.cluster(0).template_string(), "a b c d");
    assert_eq!(parser.cluster(1).template_string(), "w x y z");
}

#[test]
fn shared_half_at_tau_boundary_is_accepted() {
    // tau = 0.5, length 4: an LCS of exactly 2 must be accepted
    let mut parser = BatchParser::default();
    parser.insert(toks("a b c d"), 1);
    let idx = parser.insert(toks("a b y z"), 2);
    assert_eq!(idx, 0);
    assert_eq!(parser.clusters().len(), 1);
    assert_eq!(parser.cluster(0).template_string(), "a b *");
    assert_eq!(parser.cluster(0).line_ids(), &[1, 2]);
}

#[test]
fn shared_below_tau_boundary_is_rejected() {
    // tau = 0.5, length 4: a single shared token fails the prefilter
    let mut parser = BatchParser::default();
    parser.insert(toks("a b c d"), 1);
    let idx = parser.insert(toks("a x y z"), 2);
    assert_eq!(idx, 1);
    assert_eq!(parser.clusters().len(), 2);
}

#[test]
fn tree_match_accepts_a_known_prefix_path() {
    let mut parser = BatchParser::default();
    parser.insert(toks("kernel oom killer invoked"), 1);
    let idx = parser.insert(toks("kernel oom killer invoked again"), 2);
    assert_eq!(idx, 0);
    // the new line generalized the template through the exact LCS
    assert_eq!(
        parser.cluster(0).template_string(),
        "kernel oom killer invoked"
    );
}

#[test]
fn loop_match_handles_reordered_repeated_runs() {
    let mut parser = BatchParser::new(0.9);
    parser.insert(toks("retry retry retry send"), 1);
    // same token multiset, different order: the containment stage claims it
    let idx = parser.insert(toks("send retry retry retry"), 2);
    assert_eq!(idx, 0);
    assert_eq!(parser.clusters().len(), 1);
}

#[test]
fn lcs_tie_prefers_the_shorter_template() {
    let mut parser = BatchParser::default();
    parser.insert(toks("p a b q e f"), 1);
    parser.insert(toks("u c d v"), 2);
    // LCS with both templates is 2; the shorter template is more specific
    let idx = parser.insert(toks("a b c d"), 3);
    assert_eq!(idx, 1);
    assert_eq!(parser.cluster(1).template_string(), "* c d *");
}

#[test]
fn regenerated_template_is_reachable_through_the_tree() {
    let mut parser = BatchParser::default();
    parser.insert(toks("z a b c"), 1);
    parser.insert(toks("a b c w"), 2);
    assert_eq!(parser.cluster(0).template_string(), "* a b c");
    // the old literal path starting at `z` is gone; the new one matches
    let idx = parser.insert(toks("a b c v"), 3);
    assert_eq!(idx, 0);
    assert_eq!(parser.cluster(0).line_ids(), &[1, 2, 3]);
}

#[test]
fn empty_sequence_becomes_a_degenerate_cluster() {
    let mut parser = BatchParser::default();
    parser.insert(toks("a b"), 1);
    let idx = parser.insert(Vec::new(), 2);
    assert_eq!(idx, 1);
    assert!(parser.cluster(1).template().is_empty());
    let another = parser.insert(Vec::new(), 3);
    assert_eq!(another, 2);
}

#[test]
fn wildcard_tokens_are_excluded_from_tree_paths() {
    let mut parser = BatchParser::default();
    parser.insert(toks("read * bytes from disk"), 1);
    let idx = parser.insert(toks("read * bytes from disk"), 2);
    assert_eq!(idx, 0);
    assert_eq!(parser.clusters().len(), 1);
}

#[test]
fn trailing_unmatched_run_collapses_to_one_wildcard_entry() {
    let mut parser = BatchParser::default();
    parser.insert(toks("connect peer timeout"), 1);
    let idx = parser.insert(toks("connect peer"), 2);
    assert_eq!(idx, 0);
    assert_eq!(parser.cluster(0).template_string(), "connect peer *");
}

#[test]
fn extract_parameters_reports_mismatching_positions() {
    let template = toks("connect * port *");
    let tokens = toks("connect alpha port 8080");
    let original = toks("connect alpha port 8080");
    let params = batch::extract_parameters(&template, &tokens, &original);
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].value, "alpha");
    assert_eq!(params[0].char_start, 8);
    assert_eq!(params[0].char_end, 13);
    assert_eq!(params[0].token_start, 1);
    assert_eq!(params[1].value, "8080");
    assert_eq!(params[1].token_start, 3);
    assert!(params[0].entity.is_none());
}

#[test]
fn extract_parameters_joins_a_trailing_run() {
    let template = toks("job done *");
    let tokens = toks("job done in 42 ms");
    let original = toks("job done in 42 ms");
    let params = batch::extract_parameters(&template, &tokens, &original);
    // positions past the template collapse into one space-joined parameter
    let last = params.last().unwrap();
    assert_eq!(last.value, "42 ms");
    assert_eq!(last.token_start, 3);
    assert_eq!(last.token_end, 5);
}

#[test]
fn cluster_rows_report_counts_and_stable_ids() {
    let mut parser = BatchParser::default();
    parser.insert(toks("a b c d"), 1);
    parser.insert(toks("a b y z"), 2);
    parser.insert(toks("q r s t"), 3);
    let rows = parser.cluster_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].template, "a b *");
    assert_eq!(rows[0].count, 2);
    assert_eq!(rows[0].event_id.len(), 8);

    let assignments = parser.assignments();
    assert_eq!(assignments.len(), 3);
    assert_eq!(assignments[0].line_id, 1);
    assert_eq!(assignments[0].template, "a b *");
    assert_eq!(assignments[2].template, "q r s t");
}
