use crate::params::{tokens_before, Parameter};
use crate::rules::RuleSet;

/// Apply the ordered rule table to `content`, replacing each match with an
/// uppercase `<LABEL>` placeholder and recording one [`Parameter`] per match.
///
/// Matches are found against the content as it stands when each rule runs,
/// so an earlier rule consumes text before a later one sees it; recorded
/// char spans are valid in that same intermediate content. Token positions
/// are counted against the original, unmasked content. Placeholders contain
/// no rule-vocabulary characters, so later rules never re-match them.
pub fn preprocess(content: &str, rules: &RuleSet) -> (String, Vec<Parameter>) {
    mask(content, rules, |entity| format!("<{}>", entity.to_uppercase()))
}

/// Same masking discipline as [`preprocess`], but replaces matches with the
/// wildcard token so masked slots merge with template wildcards. Used by the
/// batch strategy.
pub fn preprocess_wildcard(content: &str, rules: &RuleSet) -> (String, Vec<Parameter>) {
    mask(content, rules, |_| crate::lcs::WILDCARD.to_string())
}

fn mask(
    content: &str,
    rules: &RuleSet,
    placeholder: impl Fn(&str) -> String,
) -> (String, Vec<Parameter>) {
    let mut formatted = content.to_string();
    let mut params = Vec::new();

    for (entity, regex) in rules.iter() {
        let matches: Vec<(usize, usize, String)> = regex
            .find_iter(&formatted)
            .filter_map(Result::ok)
            .map(|m| (m.start(), m.end(), m.as_str().to_string()))
            .collect();
        if matches.is_empty() {
            continue;
        }

        for (start, end, value) in &matches {
            let prefix = content.get(..*start).unwrap_or(content);
            let token_start = tokens_before(prefix);
            params.push(Parameter::new(
                *start,
                *end,
                token_start,
                token_start + 1,
                entity,
                value.clone(),
            ));
        }

        // back-to-front so the recorded spans stay valid while replacing
        let replacement = placeholder(entity);
        for (start, end, _) in matches.iter().rev() {
            formatted.replace_range(*start..*end, &replacement);
        }
    }

    (formatted, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_address_is_masked_with_span_and_label() {
        let line = "User bal (192.168.139.1) set 'SYSLOG_NOTICE' to ''";
        let (masked, params) = preprocess(line, &RuleSet::defaults());
        assert_eq!(params.len(), 1);
        let p = &params[0];
        assert_eq!(p.entity.as_deref(), Some("ip_address"));
        assert_eq!(p.char_start, 10);
        assert_eq!(p.char_end, 23);
        assert_eq!(p.value, "192.168.139.1");
        assert_eq!(p.char_end - p.char_start, p.value.len());
        assert_eq!(&masked[10..10 + "<IP_ADDRESS>".len()], "<IP_ADDRESS>");
    }

    #[test]
    fn wildcard_masking_uses_star() {
        let line = "request from 10.0.0.7 denied";
        let (masked, params) = preprocess_wildcard(line, &RuleSet::defaults());
        assert_eq!(masked, "request from * denied");
        assert_eq!(params[0].value, "10.0.0.7");
    }

    #[test]
    fn placeholders_are_not_rematched_by_later_rules() {
        // the version rule would match the dotted quad if the ip_address
        // rule had not consumed it first
        let line = "peer 10.1.2.3 joined";
        let (masked, params) = preprocess(line, &RuleSet::defaults());
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].entity.as_deref(), Some("ip_address"));
        assert_eq!(masked, "peer <IP_ADDRESS> joined");
    }

    #[test]
    fn multiple_matches_of_one_rule_are_all_replaced() {
        let line = "link 10.0.0.1 to 10.0.0.2 down";
        let (masked, params) = preprocess(line, &RuleSet::defaults());
        let ips: Vec<&Parameter> = params
            .iter()
            .filter(|p| p.entity.as_deref() == Some("ip_address"))
            .collect();
        assert_eq!(ips.len(), 2);
        assert_eq!(masked, "link <IP_ADDRESS> to <IP_ADDRESS> down");
        assert_eq!(ips[0].token_start, 1);
        assert_eq!(ips[1].token_start, 3);
    }
}
