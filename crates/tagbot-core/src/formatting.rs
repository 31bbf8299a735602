/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Split plain text into chunks of at most `limit` bytes, preferring line
/// breaks, then spaces. Words longer than `limit` are cut on char boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut rest = text;
    while rest.len() > limit {
        let head = floor_char_boundary(rest, limit);
        let cut = rest[..head]
            .rfind('\n')
            .or_else(|| rest[..head].rfind(' '))
            .filter(|i| *i > 0)
            .unwrap_or(head);

        out.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut idx = max.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    if idx == 0 {
        // First char is wider than `max`; take it whole to make progress.
        s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len())
    } else {
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>&\""), "&lt;b&gt;&amp;&quot;");
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("@a @b", 100), vec!["@a @b".to_string()]);
    }

    #[test]
    fn splits_on_spaces_under_limit() {
        let text = (0..50).map(|i| format!("@user{i}")).collect::<Vec<_>>().join(" ");
        let chunks = split_message(&text, 40);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 40));
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn prefers_line_breaks_and_respects_utf8() {
        let text = format!("заголовок\n{}", "я".repeat(30));
        let chunks = split_message(&text, 25);
        assert_eq!(chunks[0], "заголовок");
        assert!(chunks.iter().all(|c| c.len() <= 25));
        assert_eq!(chunks[1..].concat(), "я".repeat(30));
    }
}
