use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":_[^:\s]+:").expect("valid emoji placeholder regex"))
}

/// Channel emoji placeholders (`:_name:`) in a message, in order.
pub fn custom_emojis(text: &str) -> impl Iterator<Item = &str> {
    placeholder().find_iter(text).map(|m| m.as_str())
}

/// Most frequent emoji, ignoring `excluded`. Ties go to the smaller name.
pub(super) fn top<'a>(
    emojis: impl Iterator<Item = &'a str>,
    excluded: Option<&str>,
) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for e in emojis {
        *counts.entry(e).or_default() += 1;
    }
    top_of(&counts, excluded)
}

pub(super) fn top_of(counts: &BTreeMap<&str, usize>, excluded: Option<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for (&name, &n) in counts {
        if Some(name) == excluded {
            continue;
        }
        // Ascending iteration: only a strictly higher count replaces.
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((name, n));
        }
    }
    best.map(|(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_placeholders_but_not_plain_colons() {
        let found: Vec<&str> = custom_emojis("gg :_clap::_clap: at 10:30 :smile:").collect();
        assert_eq!(found, [":_clap:", ":_clap:"]);
    }

    #[test]
    fn exclusion_and_ties() {
        let list = [":_b:", ":_a:", ":_c:", ":_c:"];
        assert_eq!(top(list.into_iter(), None).as_deref(), Some(":_c:"));
        assert_eq!(top(list.into_iter(), Some(":_c:")).as_deref(), Some(":_a:"));
        assert_eq!(top(std::iter::empty(), None), None);
    }
}
