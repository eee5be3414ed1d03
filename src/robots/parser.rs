//! Robots.txt rule evaluation backed by the robotstxt crate

use robotstxt::DefaultMatcher;

/// Robots.txt rules for one origin
///
/// `None` means the rules could not be obtained and everything is permitted.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    content: Option<String>,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// A permissive rule set, used when robots.txt is missing or unreachable
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Returns true if no rules were loaded
    pub fn is_permissive(&self) -> bool {
        self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }

    /// Checks whether `url` may be fetched by `user_agent`
    ///
    /// Accepts either an absolute URL or a bare path.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.content.as_deref() {
            Some(content) if !content.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
            _ => true,
        }
    }
}
