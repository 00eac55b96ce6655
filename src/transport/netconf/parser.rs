//! Element extraction from NETCONF replies.
//! Matches elements by local name (namespace prefixes ignored); enough for
//! the flat operational replies Junos returns, not a general XML parser.

/// Raw inner content of every element with local name `tag`, in document order.
/// Self-closing elements yield an empty string.
pub fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        let rest = &xml[start + 1..];
        pos = start + 1;

        if rest.starts_with(['/', '?', '!']) {
            continue;
        }

        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let qname = &rest[..name_len];
        if local_name(qname) != tag {
            continue;
        }

        let Some(tag_end) = rest.find('>') else {
            break;
        };
        if rest[..tag_end].ends_with('/') {
            found.push("");
            pos = start + 1 + tag_end + 1;
            continue;
        }

        let content_start = start + 1 + tag_end + 1;
        match closing_tag(xml, content_start, qname) {
            Some(content_end) => {
                found.push(&xml[content_start..content_end]);
                pos = content_start;
            }
            None => break,
        }
    }

    found
}

/// Offset of the `</qname>` matching an element whose content starts at `from`.
fn closing_tag(xml: &str, from: usize, qname: &str) -> Option<usize> {
    let open = format!("<{}", qname);
    let close = format!("</{}>", qname);
    let mut depth = 0usize;
    let mut pos = from;

    loop {
        let next_close = pos + xml[pos..].find(&close)?;
        let next_open = xml[pos..next_close]
            .match_indices(&open)
            .map(|(i, _)| pos + i)
            .find(|&i| {
                let after = &xml[i + open.len()..];
                let self_closing = after
                    .find('>')
                    .map(|end| after[..end].ends_with('/'))
                    .unwrap_or(false);
                after.starts_with(|c: char| c.is_whitespace() || c == '>') && !self_closing
            });

        match next_open {
            Some(i) => {
                depth += 1;
                pos = i + open.len();
            }
            None if depth == 0 => return Some(next_close),
            None => {
                depth -= 1;
                pos = next_close + close.len();
            }
        }
    }
}

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// Unescaped, trimmed text of the first element named `tag`.
pub fn text(xml: &str, tag: &str) -> Option<String> {
    elements(xml, tag)
        .into_iter()
        .next()
        .map(|raw| unescape(raw.trim()))
}

/// Unescaped, trimmed text of every element named `tag`.
pub fn all_text(xml: &str, tag: &str) -> Vec<String> {
    elements(xml, tag)
        .into_iter()
        .map(|raw| unescape(raw.trim()))
        .collect()
}

pub fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .and_then(|end| entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            // Unknown or unterminated references are kept verbatim.
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Character for a named or numeric (`#N`, `#xN`) reference body.
fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => name.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Message of the first error-severity `<rpc-error>` in a reply, if any.
/// Warnings are not errors.
pub fn rpc_error(reply: &str) -> Option<String> {
    elements(reply, "rpc-error").into_iter().find_map(|err| {
        let severity = text(err, "error-severity").unwrap_or_else(|| "error".to_string());
        if severity != "error" {
            return None;
        }
        Some(
            text(err, "error-message")
                .or_else(|| text(err, "error-tag"))
                .unwrap_or_else(|| "unknown error".to_string()),
        )
    })
}
