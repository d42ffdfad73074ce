use crate::params::Parameter;
use crate::tokenizer;
use once_cell::sync::Lazy;
use regex::Regex;

// Defang-tolerant indicator patterns. URLs run first so addresses embedded
// in a URL are consumed with it; the bare-hex hash rule runs after emails
// so hex-looking local parts stay attached to their address.
static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:h(?:tt|xx)ps?|ftps?|fxps?)(?::|\[:\])//[^\s"'<>]*[^\s"'<>.,;:!?)]"#)
        .unwrap()
});

static RE_IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:(?:\.|\[\.\]|\(\.\)|\[dot\]|\(dot\))\d{1,3}){3}\b").unwrap()
});

static RE_IPV6: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b").unwrap());

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b[A-Za-z0-9._%+-]+(?:@|\[@\]|\[at\]|\(at\))[A-Za-z0-9-]+(?:(?:\.|\[\.\]|\[dot\])[A-Za-z0-9-]+)+\b",
    )
    .unwrap()
});

static RE_HASH: Lazy<Regex> = Lazy::new(|| {
    // SHA-256, SHA-1, MD5 — longest first
    Regex::new(r"\b(?:[0-9a-fA-F]{64}|[0-9a-fA-F]{40}|[0-9a-fA-F]{32})\b").unwrap()
});

static RE_YARA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\brule\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Extract indicators of compromise from `content`, tolerating defanged
/// representations. Each hit records a [`Parameter`] and is rewritten to an
/// uppercase placeholder in place, so the ordered-rule pass that follows
/// never sees the raw indicator. Where defanging was undone the parameter
/// carries the refanged form.
pub fn extract(content: &str) -> (String, Vec<Parameter>) {
    let mut formatted = content.to_string();
    let mut params = Vec::new();
    extract_kind(&RE_URL, "url", Some(refang_url), &mut formatted, &mut params);
    extract_kind(
        &RE_IPV4,
        "ip_address",
        Some(refang_ipv4),
        &mut formatted,
        &mut params,
    );
    extract_kind(&RE_IPV6, "ip_address", None, &mut formatted, &mut params);
    extract_kind(
        &RE_EMAIL,
        "email",
        Some(refang_email),
        &mut formatted,
        &mut params,
    );
    extract_kind(&RE_HASH, "hash", None, &mut formatted, &mut params);
    extract_rule_names(&mut formatted, &mut params);
    (formatted, params)
}

fn extract_kind(
    regex: &Regex,
    entity: &str,
    refang: Option<fn(&str) -> String>,
    formatted: &mut String,
    params: &mut Vec<Parameter>,
) {
    while let Some(m) = regex.find(formatted) {
        let (start, end) = (m.start(), m.end());
        let value = m.as_str().to_string();
        let token_start = token_index(&formatted[..start]);
        let mut param =
            Parameter::new(start, end, token_start, token_start + 1, entity, value.clone());
        if let Some(refang) = refang {
            let clean = refang(&value);
            if clean != value {
                param.refanged = Some(clean);
            }
        }
        params.push(param);
        formatted.replace_range(start..end, &format!("<{}>", entity.to_uppercase()));
    }
}

fn extract_rule_names(formatted: &mut String, params: &mut Vec<Parameter>) {
    while let Some(caps) = RE_YARA.captures(formatted) {
        let m = caps.get(1).expect("rule name group");
        let (start, end) = (m.start(), m.end());
        let token_start = token_index(&formatted[..start]);
        params.push(Parameter::new(
            start,
            end,
            token_start,
            token_start + 1,
            "yara_rule",
            m.as_str(),
        ));
        formatted.replace_range(start..end, "<YARA_RULE>");
    }
}

fn token_index(prefix: &str) -> usize {
    tokenizer::default_separator()
        .split(prefix)
        .count()
        .saturating_sub(1)
}

fn refang_url(url: &str) -> String {
    let mut out = url
        .replace("[.]", ".")
        .replace("[dot]", ".")
        .replace("[:]", ":");
    let lower = out.to_lowercase();
    if lower.starts_with("hxxp") {
        out.replace_range(..4, "http");
    } else if lower.starts_with("fxp") {
        out.replace_range(..3, "ftp");
    }
    out
}

fn refang_ipv4(ip: &str) -> String {
    ip.replace("[.]", ".")
        .replace("(.)", ".")
        .replace("[dot]", ".")
        .replace("(dot)", ".")
}

fn refang_email(email: &str) -> String {
    email
        .replace("[at]", "@")
        .replace("(at)", "@")
        .replace("[@]", "@")
        .replace("[.]", ".")
        .replace("[dot]", ".")
}
