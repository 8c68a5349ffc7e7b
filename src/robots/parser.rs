//! Robots.txt parser implementation
//!
//! Path matching is delegated to the robotstxt crate; this module extracts
//! the rule list and crawl delay of the group that applies to our agent.

use robotstxt::DefaultMatcher;

/// Whether a rule permits or forbids a path prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Allow,
    Disallow,
}

/// One `Allow:` or `Disallow:` line of the applicable group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub kind: RuleKind,
    pub path: String,
}

/// Robots policy for one host, as seen by one user agent
#[derive(Debug, Clone)]
pub struct HostDirectives {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Product token we match groups against, e.g. "FrontierBot"
    agent_token: String,
    rules: Vec<PathRule>,
    crawl_delay: Option<f64>,
}

/// A `User-agent:` group while parsing
#[derive(Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<PathRule>,
    crawl_delay: Option<f64>,
}

impl HostDirectives {
    /// Parses robots.txt content for the given user agent
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    /// * `user_agent` - Full user agent string; only the product token is matched
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let agent_token = product_token(user_agent);
        let groups = parse_groups(content);

        // Same rule as the matcher: exact product token, then "*"
        let token = agent_token.to_lowercase();
        let specific: Vec<&Group> = groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| agent_matches(a, &token)))
            .collect();
        let applicable: Vec<&Group> = if specific.is_empty() {
            groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            specific
        };

        // Groups naming the same agent are merged
        let rules = applicable
            .iter()
            .flat_map(|g| g.rules.iter().cloned())
            .collect();
        let crawl_delay = applicable.iter().find_map(|g| g.crawl_delay);

        Self {
            content: content.to_string(),
            agent_token,
            rules,
            crawl_delay,
        }
    }

    /// Creates permissive directives that allow everything
    ///
    /// This is used as the default when robots.txt cannot be fetched or parsed.
    pub fn permissive() -> Self {
        Self {
            content: String::new(),
            agent_token: String::new(),
            rules: Vec::new(),
            crawl_delay: None,
        }
    }

    /// Checks if a URL is allowed
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path (e.g. "/page.html")
    pub fn allows(&self, url: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.agent_token, url)
    }

    /// Crawl delay in seconds declared for our agent, if any
    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delay
    }

    /// Ordered allow/disallow rules of the group that applies to us
    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// True for the fallback used after a failed fetch or an empty file
    pub fn is_permissive(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// "FrontierBot/1.0 (+https://...)" -> "FrontierBot"
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Whether a `User-agent:` value names our product token
///
/// Only the leading `[a-z_-]` run of the value is compared, so
/// "FrontierBot/2.0" names "frontierbot" but "Bot" does not.
fn agent_matches(agent: &str, token: &str) -> bool {
    let name: String = agent
        .chars()
        .take_while(|c| c.is_ascii_alphabetic() || *c == '_' || *c == '-')
        .collect();
    !name.is_empty() && name == token
}

/// Splits robots.txt into user-agent groups
///
/// Consecutive `User-agent:` lines share a group; a `User-agent:` line after
/// any rule starts a new one.
fn parse_groups(content: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut current = Group::default();
    let mut in_rules = false;

    for line in content.lines() {
        // Strip trailing comments
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    groups.push(std::mem::take(&mut current));
                    in_rules = false;
                }
                current.agents.push(value.to_lowercase());
            }
            "allow" | "disallow" => {
                in_rules = true;
                // An empty Disallow permits everything and adds no rule
                if value.is_empty() {
                    continue;
                }
                let kind = if key == "allow" {
                    RuleKind::Allow
                } else {
                    RuleKind::Disallow
                };
                current.rules.push(PathRule {
                    kind,
                    path: value.to_string(),
                });
            }
            "crawl-delay" => {
                in_rules = true;
                if let Ok(delay) = value.parse::<f64>() {
                    if delay.is_finite() && delay >= 0.0 {
                        current.crawl_delay = Some(delay);
                    }
                }
            }
            _ => {}
        }
    }

    if !current.agents.is_empty() {
        groups.push(current);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT: &str = "TestBot/1.0";

    #[test]
    fn test_permissive() {
        let robots = HostDirectives::permissive();
        assert!(robots.allows("/any/path"));
        assert!(robots.allows("https://example.com/admin"));
        assert_eq!(robots.crawl_delay(), None);
        assert!(robots.is_permissive());
    }

    #[test]
    fn test_parse_disallow_all() {
        let robots = HostDirectives::parse("User-agent: *\nDisallow: /", AGENT);
        assert!(!robots.allows("/"));
        assert!(!robots.allows("https://example.com/page"));
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = HostDirectives::parse("User-agent: *\nDisallow: /admin", AGENT);
        assert!(robots.allows("/"));
        assert!(robots.allows("/page"));
        assert!(!robots.allows("/admin"));
        assert!(!robots.allows("https://example.com/admin/users"));
    }

    #[test]
    fn test_parse_allow_and_disallow() {
        let content = "User-agent: *\nDisallow: /private\nAllow: /private/public";
        let robots = HostDirectives::parse(content, AGENT);
        assert!(robots.allows("/"));
        assert!(!robots.allows("/private"));
        assert!(robots.allows("/private/public"));

        assert_eq!(
            robots.rules(),
            &[
                PathRule {
                    kind: RuleKind::Disallow,
                    path: "/private".to_string()
                },
                PathRule {
                    kind: RuleKind::Allow,
                    path: "/private/public".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_specific_agent_group_wins() {
        let content = "User-agent: TestBot\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = HostDirectives::parse(content, AGENT);
        assert!(!robots.allows("/page"));
        assert_eq!(robots.rules().len(), 1);

        let other = HostDirectives::parse(content, "GoodBot/2.0");
        assert!(other.allows("/page"));
    }

    #[test]
    fn test_garbage_content_allows() {
        let robots = HostDirectives::parse("This is not valid robots.txt {{{", AGENT);
        assert!(robots.allows("/any/path"));
        assert!(robots.rules().is_empty());
    }

    #[test]
    fn test_empty_content_allows() {
        let robots = HostDirectives::parse("", AGENT);
        assert!(robots.allows("/any/path"));
        assert!(robots.is_permissive());
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let content = "User-agent: *\nCrawl-delay: 10\nDisallow: /admin";
        let robots = HostDirectives::parse(content, AGENT);
        assert_eq!(robots.crawl_delay(), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_specific_agent() {
        let content = "User-agent: TestBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10";
        assert_eq!(HostDirectives::parse(content, AGENT).crawl_delay(), Some(5.0));
        assert_eq!(
            HostDirectives::parse(content, "OtherBot").crawl_delay(),
            Some(10.0)
        );
    }

    #[test]
    fn test_crawl_delay_absent() {
        let robots = HostDirectives::parse("User-agent: *\nDisallow: /admin", AGENT);
        assert_eq!(robots.crawl_delay(), None);
    }

    #[test]
    fn test_crawl_delay_decimal_and_case() {
        let robots = HostDirectives::parse("user-agent: testbot\ncrawl-delay: 2.5", AGENT);
        assert_eq!(robots.crawl_delay(), Some(2.5));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let content = "User-agent: BotA\nUser-agent: TestBot\nCrawl-delay: 3";
        assert_eq!(HostDirectives::parse(content, AGENT).crawl_delay(), Some(3.0));
        assert_eq!(HostDirectives::parse(content, "BotC").crawl_delay(), None);
    }

    #[test]
    fn test_negative_crawl_delay_ignored() {
        let robots = HostDirectives::parse("User-agent: *\nCrawl-delay: -4", AGENT);
        assert_eq!(robots.crawl_delay(), None);
    }

    #[test]
    fn test_agent_substring_does_not_select_group() {
        let content = "User-agent: Bot\nDisallow: /\nCrawl-delay: 60\n\nUser-agent: *\nCrawl-delay: 1";
        let robots = HostDirectives::parse(content, "FrontierBot/1.0");

        assert!(robots.allows("/page"));
        assert_eq!(robots.crawl_delay(), Some(1.0));
        assert!(robots.rules().is_empty());
    }

    #[test]
    fn test_agent_with_version_selects_group() {
        let content = "User-agent: FrontierBot/2.0\nDisallow: /x\nCrawl-delay: 4\n\nUser-agent: *\nCrawl-delay: 1";
        let robots = HostDirectives::parse(content, "FrontierBot/1.0");

        assert!(!robots.allows("/x/y"));
        assert_eq!(robots.crawl_delay(), Some(4.0));
        assert_eq!(robots.rules().len(), 1);
    }

    #[test]
    fn test_repeated_agent_groups_merge() {
        let content = "User-agent: TestBot\nDisallow: /a\n\nUser-agent: *\nDisallow: /\n\nUser-agent: TestBot\nDisallow: /b";
        let robots = HostDirectives::parse(content, AGENT);

        assert_eq!(robots.rules().len(), 2);
        assert!(!robots.allows("/a"));
        assert!(!robots.allows("/b"));
        assert!(robots.allows("/c"));
    }

    #[test]
    fn test_agent_matches() {
        assert!(agent_matches("testbot", "testbot"));
        assert!(agent_matches("testbot/1.0", "testbot"));
        assert!(!agent_matches("bot", "testbot"));
        assert!(!agent_matches("testbotx", "testbot"));
        assert!(!agent_matches("*", "testbot"));
    }

    #[test]
    fn test_product_token() {
        assert_eq!(product_token("FrontierBot/1.0"), "FrontierBot");
        assert_eq!(product_token("FrontierBot (+https://x)"), "FrontierBot");
        assert_eq!(product_token("Plain"), "Plain");
    }
}
