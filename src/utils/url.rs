// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::error::Result;

/// Canonical form of a page URL, used as the cache and dedup key.
///
/// Drops the fragment and lowercases scheme and host. Unparseable input is
/// returned trimmed.
///
/// # Examples
/// ```
/// use questlog::utils::url::canonical_url;
///
/// assert_eq!(
///     canonical_url("HTTPS://Wiki.Example/wiki/Page#Section"),
///     "https://wiki.example/wiki/Page"
/// );
/// ```
pub fn canonical_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// Resolve a potentially relative link against the page it appeared on.
pub fn resolve(base: &str, href: &str) -> Option<String> {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .ok()
        .map(|u| u.to_string())
}

/// Article URL for a wiki page title.
///
/// # Examples
/// ```
/// use questlog::utils::url::article_url;
///
/// assert_eq!(
///     article_url("https://wiki.example/", "The Blazefiend"),
///     "https://wiki.example/wiki/The_Blazefiend"
/// );
/// ```
pub fn article_url(wiki_base_url: &str, title: &str) -> String {
    let page: String = title
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => "_".to_string(),
            '?' => "%3F".to_string(),
            '#' => "%23".to_string(),
            '&' => "%26".to_string(),
            other => other.to_string(),
        })
        .collect();
    format!("{}/wiki/{}", wiki_base_url.trim_end_matches('/'), page)
}

/// Full-text search link on the wiki for `term`.
pub fn wiki_search_url(wiki_base_url: &str, term: &str) -> Result<String> {
    let mut url = Url::parse(wiki_base_url)?.join("/index.php")?;
    url.query_pairs_mut().append_pair("search", term.trim());
    Ok(url.to_string())
}

/// Last path segment of a `/wiki/` link, with underscores as spaces.
pub fn wiki_page_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    let name = path.strip_prefix("/wiki/")?;
    if name.is_empty() {
        return None;
    }
    Some(name.replace('_', " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_url_drops_fragment() {
        assert_eq!(
            canonical_url("https://WIKI.example/wiki/List#Ascalon"),
            "https://wiki.example/wiki/List"
        );
        assert_eq!(canonical_url("  not a url "), "not a url");
    }

    #[test]
    fn test_resolve_relative_link() {
        assert_eq!(
            resolve("https://wiki.example/wiki/List", "/wiki/Other").as_deref(),
            Some("https://wiki.example/wiki/Other")
        );
        assert_eq!(
            resolve("https://wiki.example/wiki/List", "https://other.example/x").as_deref(),
            Some("https://other.example/x")
        );
    }

    #[test]
    fn test_article_url_escapes_query_chars() {
        assert_eq!(
            article_url("https://wiki.example", "Who Goes There?"),
            "https://wiki.example/wiki/Who_Goes_There%3F"
        );
    }

    #[test]
    fn test_wiki_search_url() {
        assert_eq!(
            wiki_search_url("https://wiki.example", "Vanguard Rescue").unwrap(),
            "https://wiki.example/index.php?search=Vanguard+Rescue"
        );
        assert!(wiki_search_url("nope", "x").is_err());
    }

    #[test]
    fn test_wiki_page_name() {
        assert_eq!(
            wiki_page_name("https://wiki.example/wiki/Category:Quests").as_deref(),
            Some("Category:Quests")
        );
        assert_eq!(wiki_page_name("https://wiki.example/index.php"), None);
    }
}
