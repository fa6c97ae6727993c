//! Plain-text rendering of Mastodon status HTML.
//!
//! Status bodies arrive as a small HTML subset (`<p>`, `<br>`, `<a>`, `<span>`).
//! Tags are dropped, entities decoded and whitespace collapsed so the result reads
//! naturally in a single mesh message.

/// Strip tags, decode entities and collapse whitespace runs to single spaces.
///
/// State machine, not a parser. Paragraph and line breaks become a single space.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut tag_name = String::new();
    let mut name_done = false;
    let mut in_entity = false;
    let mut entity_buf = String::new();

    for ch in html.chars() {
        if in_entity {
            if ch == ';' {
                out.push_str(&decode_entity(&entity_buf));
                entity_buf.clear();
                in_entity = false;
            } else if entity_buf.len() < 10 && !ch.is_whitespace() && ch != '&' && ch != '<' {
                entity_buf.push(ch);
            } else {
                out.push('&');
                out.push_str(&entity_buf);
                entity_buf.clear();
                in_entity = false;
                match ch {
                    '&' => in_entity = true,
                    '<' => {
                        in_tag = true;
                        tag_name.clear();
                    }
                    _ => out.push(ch),
                }
            }
            continue;
        }

        if in_tag {
            if ch == '>' {
                let lower = tag_name.to_ascii_lowercase();
                if matches!(
                    lower.trim_end_matches('/'),
                    "br" | "p" | "/p" | "div" | "/div" | "li"
                ) {
                    out.push(' ');
                }
                tag_name.clear();
                name_done = false;
                in_tag = false;
            } else if ch.is_whitespace() {
                // attributes follow
                name_done = !tag_name.is_empty();
            } else if !name_done && tag_name.len() < 50 {
                tag_name.push(ch);
            }
            continue;
        }

        match ch {
            '<' => {
                in_tag = true;
                tag_name.clear();
            }
            '&' => {
                in_entity = true;
                entity_buf.clear();
            }
            _ => out.push(ch),
        }
    }

    if in_entity {
        out.push('&');
        out.push_str(&entity_buf);
    }

    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode one entity body (without `&` and `;`).
fn decode_entity(entity: &str) -> String {
    match entity {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        "nbsp" => " ".to_string(),
        s if s.starts_with('#') => {
            let num_str = &s[1..];
            let codepoint = match num_str.strip_prefix('x').or_else(|| num_str.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num_str.parse::<u32>().ok(),
            };
            codepoint
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| format!("&{};", entity))
        }
        _ => format!("&{};", entity),
    }
}
