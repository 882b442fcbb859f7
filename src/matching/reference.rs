/// Strip all whitespace from a payment reference.
///
/// Bank files print structured references in groups ("21 00000 00003 …");
/// returns `None` when nothing is left.
pub fn normalize_reference(reference: &str) -> Option<String> {
    let normalized: String = reference.chars().filter(|c| !c.is_whitespace()).collect();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
