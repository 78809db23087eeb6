use std::path::PathBuf;

/// Expand a path beginning with `~` into a `PathBuf` under the user's home
/// directory. Paths without a leading `~` are returned unchanged.
///
/// Returns `None` when the path needs expansion but the home directory
/// cannot be determined.
pub fn expand_tilde(input: &str) -> Option<PathBuf> {
    if !input.starts_with('~') {
        return Some(PathBuf::from(input));
    }
    // Accept both `HOME` (Unix) and `USERPROFILE` (Windows).
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    let rest = input.trim_start_matches('~');
    let mut p = PathBuf::from(home);
    let trimmed = rest.trim_start_matches(['/', '\\']);
    if !trimmed.is_empty() {
        p.push(trimmed);
    }
    Some(p)
}
