//! Text and filter utilities

/// Normalize message text before storage: drop NUL and other control characters except
/// newlines and tabs, collapse runs of spaces/tabs, trim each line, and drop blank lines.
pub fn clean_text(text: &str) -> String {
    let mut lines = Vec::new();
    for line in text.lines() {
        let line: String = line
            .chars()
            .filter(|c| !c.is_control() || *c == '\t')
            .collect();
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }
    lines.join("\n")
}

/// True if `sender` matches any bot pattern (glob syntax, case-insensitive).
pub fn is_bot_sender(sender: &str, bot_patterns: &[String]) -> bool {
    let sender = sender.trim().to_lowercase();
    bot_patterns
        .iter()
        .any(|p| glob_match(&p.to_lowercase(), &sender))
}

/// Reject `!`-prefixed bot patterns. Patterns only exclude; there is no negation.
pub fn check_bot_patterns(bot_patterns: &[String]) -> anyhow::Result<()> {
    if let Some(p) = bot_patterns.iter().find(|p| p.trim_start().starts_with('!')) {
        anyhow::bail!(
            "bot pattern {:?} starts with '!'; negated patterns are not supported",
            p
        );
    }
    Ok(())
}

/// Simple glob pattern matching (supports * and ?). Every other character, `!` included,
/// matches itself.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let mut pattern_chars = pattern.chars().peekable();
    let mut text_chars = text.chars().peekable();

    while let Some(&p) = pattern_chars.peek() {
        match p {
            '*' => {
                while pattern_chars.next_if_eq(&'*').is_some() {}
                if pattern_chars.peek().is_none() {
                    return true; // trailing * matches everything
                }
                let rest: String = pattern_chars.clone().collect();
                loop {
                    if glob_match(&rest, &text_chars.clone().collect::<String>()) {
                        return true;
                    }
                    if text_chars.next().is_none() {
                        return false;
                    }
                }
            }
            '?' => {
                pattern_chars.next();
                if text_chars.next().is_none() {
                    return false;
                }
            }
            _ => {
                pattern_chars.next();
                if text_chars.next() != Some(p) {
                    return false;
                }
            }
        }
    }

    text_chars.peek().is_none()
}
