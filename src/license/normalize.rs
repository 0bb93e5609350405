/// Characters removed from license text wherever they appear:
/// form feed, byte-order mark and zero-width space.
const CONTROL_CHARACTERS: [char; 3] = ['\u{000C}', '\u{FEFF}', '\u{200B}'];

/// Canonicalize raw license text.
///
/// - whitespace-only input yields `None`
/// - form feeds, BOMs and zero-width spaces are dropped
/// - leading and trailing CR/LF characters are trimmed
/// - every line ending becomes `\r\n`
/// - the indentation shared by all non-blank lines is removed
///
/// The result is a fixed point: normalizing it again returns the same text.
pub fn normalize(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let stripped: String = raw
        .chars()
        .filter(|c| !CONTROL_CHARACTERS.contains(c))
        .collect();
    let trimmed = stripped.trim_matches(|c| c == '\r' || c == '\n');
    if trimmed.trim().is_empty() {
        return None;
    }

    let unified = unify_line_endings(trimmed);
    let lines: Vec<&str> = unified.split('\n').collect();
    if common_indentation(&lines) == 0 {
        return Some(unified);
    }
    Some(remove_common_indentation(&lines).join("\n"))
}

/// Strip the shared leading spaces from every non-blank line.
fn remove_common_indentation<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let indent = common_indentation(lines);
    lines
        .iter()
        .map(|&line| {
            if is_blank(line) {
                line
            } else {
                let spaces = line.len() - line.trim_start_matches(' ').len();
                &line[spaces.min(indent)..]
            }
        })
        .collect()
}

/// Replace lone `\n` and lone `\r` with `\r\n`, leaving existing pairs alone.
fn unify_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 32);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                out.push_str("\r\n");
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' => out.push_str("\r\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Smallest count of leading spaces over the non-blank lines.
///
/// Tabs do not count as indentation. Once a line with no leading space is
/// seen the minimum is frozen at zero and the remaining lines are skipped.
fn common_indentation(lines: &[&str]) -> usize {
    let mut indent: Option<usize> = None;
    for line in lines {
        if indent == Some(0) {
            break;
        }
        if is_blank(line) {
            continue;
        }
        let spaces = line.chars().take_while(|c| *c == ' ').count();
        indent = Some(indent.map_or(spaces, |current| current.min(spaces)));
    }
    indent.unwrap_or(0)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
