//! Extraction of import targets from Sass, SCSS and CSS source text.
//!
//! Only the directives that pull in other files are recognised:
//! `@import`, `@use` and `@forward`. Everything else is ignored.

use std::sync::LazyLock;

use regex::Regex;

// Comma-first alternation lets an import list continue on the next line.
static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(import|use|forward)\s+((?:,\s*\n|[^;\n])*)")
        .expect("directive pattern is valid")
});

/// Return the import targets of `source` in order of appearance.
///
/// Targets are returned as written (quotes removed). Remote URLs, `url()`
/// imports, interpolated names and built-in `sass:` modules are skipped.
pub fn extract_imports(source: &str) -> Vec<String> {
    let cleaned = strip_comments(source);
    let mut targets = Vec::new();

    for caps in DIRECTIVE.captures_iter(&cleaned) {
        let kind = &caps[1];
        let args = &caps[2];

        let items = split_outside_quotes(args);
        let items = if kind == "import" {
            items
        } else {
            // @use/@forward take a single url followed by modifiers
            items.into_iter().take(1).collect()
        };

        for item in items {
            if let Some(target) = import_target(&item) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }

    targets
}

fn import_target(item: &str) -> Option<String> {
    let item = item.trim();
    if item.is_empty() || item.starts_with("url(") {
        return None;
    }

    let target = match item.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let rest = &item[1..];
            let end = rest.find(quote)?;
            rest[..end].to_string()
        }
        _ => item.split_whitespace().next()?.to_string(),
    };

    if is_skipped(&target) {
        return None;
    }
    Some(target)
}

fn is_skipped(target: &str) -> bool {
    target.is_empty()
        || target.contains("://")
        || target.starts_with("//")
        || target.starts_with("sass:")
        || target.contains("#{")
}

fn split_outside_quotes(args: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in args.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == ',' => items.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }
    items.push(current);
    items
}

/// Remove `//` and `/* */` comments, leaving quoted strings intact.
///
/// Newlines inside removed comments are kept so line-based directives in
/// the indented syntax stay on their own lines.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q || c == '\n' {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }

    out
}
