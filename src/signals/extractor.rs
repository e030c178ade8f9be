//! Pulls agent-type demand out of free text.
//!
//! An explicit "need a `<type>` agent" phrase wins over a bare "`<type>` agent"
//! mention. Only the first occurrence of each pattern is considered.
//!
//! Stopwords are rejected in both tiers, so "need an agent" yields nothing from
//! the need phrase and falls through to the bare mention. This intentionally
//! differs from a need-tier match that accepts any captured word.

use lazy_static::lazy_static;
use regex::Regex;

use super::types::Opportunity;

/// Captured words that are never agent types
pub const STOPWORDS: [&str; 4] = ["the", "an", "this", "that"];

lazy_static! {
    static ref NEED_PATTERN: Regex = Regex::new(r"(?i)need (?:a |an )?(\w+) agent").unwrap();
    static ref AGENT_PATTERN: Regex = Regex::new(r"(?i)(\w+) agent").unwrap();
}

/// Extract a single opportunity from a message, tagged with the given source
pub fn extract_opportunity(text: &str, source: &str) -> Option<Opportunity> {
    if let Some(agent_type) = first_capture(&NEED_PATTERN, text) {
        if !is_stopword(&agent_type) {
            let description = format!("Demand for {} agent", agent_type);
            return Some(Opportunity::new(agent_type, description, source));
        }
    }

    let agent_type = first_capture(&AGENT_PATTERN, text)?;
    if is_stopword(&agent_type) {
        return None;
    }

    let description = format!("{} agent mentioned", agent_type);
    Some(Opportunity::new(agent_type, description, source))
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_need_phrase() {
        let opp = extract_opportunity("We need a gaming agent for tournaments", "chat").unwrap();
        assert_eq!(opp.agent_type, "gaming");
        assert_eq!(opp.description, "Demand for gaming agent");
        assert_eq!(opp.mentions, 1);
        assert_eq!(opp.source, "chat");
    }

    #[test]
    fn test_need_phrase_takes_priority_over_earlier_mention() {
        let opp =
            extract_opportunity("The trader agent is fine but we need an oracle agent", "chat")
                .unwrap();
        assert_eq!(opp.agent_type, "oracle");
    }

    #[test]
    fn test_bare_mention() {
        let opp = extract_opportunity("Someone should build a meme agent", "posts").unwrap();
        assert_eq!(opp.agent_type, "meme");
        assert_eq!(opp.description, "meme agent mentioned");
    }

    #[test]
    fn test_stopword_rejected() {
        assert!(extract_opportunity("the agent is slow", "chat").is_none());
        assert!(extract_opportunity("Is THAT agent still running?", "chat").is_none());
    }

    #[test]
    fn test_need_an_agent_without_type() {
        assert!(extract_opportunity("we need an agent", "chat").is_none());
    }

    #[test]
    fn test_type_is_lowercased() {
        let opp = extract_opportunity("NEED A Social AGENT", "chat").unwrap();
        assert_eq!(opp.agent_type, "social");
    }

    #[test]
    fn test_no_mention() {
        assert!(extract_opportunity("gm everyone", "chat").is_none());
    }
}
