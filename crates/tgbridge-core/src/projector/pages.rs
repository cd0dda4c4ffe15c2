//! Splitting answers that exceed the platform's message length.
//!
//! Lengths are counted in `char`s. A page breaks at the last newline inside
//! the final tenth of the window when there is one, otherwise exactly at
//! the limit.

/// Split `text` into pages of at most `max_len` characters.
///
/// Always returns at least one page (possibly empty).
pub fn paginate(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut pages = Vec::new();
    let mut rest = text;

    loop {
        let cut = match rest.char_indices().nth(max_len) {
            Some((byte_idx, _)) => byte_idx,
            None => {
                pages.push(rest.to_string());
                return pages;
            }
        };

        let window = &rest[..cut];
        let soft_floor = max_len - max_len / 10;
        let newline = window
            .rfind('\n')
            .filter(|&idx| window[..idx].chars().count() >= soft_floor);

        match newline {
            Some(idx) => {
                pages.push(window[..idx].to_string());
                rest = &rest[idx + 1..];
            }
            None => {
                pages.push(window.to_string());
                rest = &rest[cut..];
            }
        }
    }
}
