/// Short, stable hex identifier for templates and lines.
///
/// Identifiers are opaque to the rest of the crate; the only contract is
/// determinism for identical input.
pub fn short_id(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex()[..8].to_string()
}
