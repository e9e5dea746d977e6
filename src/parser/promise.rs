//! Completion marker extraction: `<promise>TOKEN</promise>`.

const OPEN: &str = "<promise>";
const CLOSE: &str = "</promise>";

/// Extract the completion promise from runner output.
///
/// Agents narrate before they conclude, so the last complete marker wins.
/// A marker whose closing tag is missing (truncated output) or whose token is
/// empty or spans lines is skipped. Never fails.
pub fn extract_promise(text: &str) -> Option<String> {
    let mut found = None;
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(OPEN) {
        let token_start = cursor + rel + OPEN.len();
        let rest = &text[token_start..];

        let Some(close_rel) = rest.find(CLOSE) else {
            break;
        };

        // Another opening tag before this one closes: this marker was cut off
        if let Some(next_open) = rest.find(OPEN)
            && next_open < close_rel
        {
            cursor = token_start + next_open;
            continue;
        }

        let token = rest[..close_rel].trim();
        if is_valid_token(token) {
            found = Some(token.to_string());
        }
        cursor = token_start + close_rel + CLOSE.len();
    }

    found
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && !token.contains(['\n', '\r', '<', '>'])
}
