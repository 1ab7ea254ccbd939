use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    Internal,
    External,
}

/// An anchor target after resolution against the page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The literal `href` as written in the markup.
    pub href: String,
    pub url: Url,
    pub scope: LinkScope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClassification {
    pub internal: usize,
    pub external: usize,
    /// Every resolvable link, in the order the hrefs were given.
    pub links: Vec<ResolvedLink>,
}

/// Resolves `href` against `base` using standard relative reference rules.
/// Returns `None` when the reference cannot be parsed.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    base.join(href).ok()
}

/// The authority of `reference` exactly as written, without userinfo.
///
/// Hosts are not lowercased and default ports are kept, so
/// `https://EXAMPLE.com` and `https://example.com:443` both differ from
/// `https://example.com`. A reference with a scheme but no `//` part has an
/// empty authority. A relative reference has none of its own and yields `None`.
pub fn written_authority(reference: &str) -> Option<&str> {
    let rest = match reference.split_once(':') {
        Some((scheme, rest)) if is_scheme(scheme) => match rest.strip_prefix("//") {
            Some(rest) => rest,
            None => return Some(""),
        },
        _ => reference.strip_prefix("//")?,
    };

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    Some(
        authority
            .rsplit_once('@')
            .map_or(authority, |(_, host)| host),
    )
}

fn is_scheme(candidate: &str) -> bool {
    candidate
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolves and classifies each href against the page's parsed URL.
pub fn classify(hrefs: &[String], base: &Url) -> LinkClassification {
    classify_page(hrefs, base, base.as_str())
}

/// Resolves each href against `base` and classifies it by comparing its
/// written authority with the one in `page`, the page address as given.
/// Relative hrefs inherit the page authority and are always internal.
/// Unparseable hrefs are dropped silently.
pub fn classify_page(hrefs: &[String], base: &Url, page: &str) -> LinkClassification {
    let mut classification = LinkClassification::default();
    let page_authority = written_authority(page).unwrap_or_default();

    for href in hrefs {
        let Some(url) = resolve_href(base, href) else {
            debug!("Dropping unresolvable link: {}", href);
            continue;
        };

        let link_authority = written_authority(href).unwrap_or(page_authority);
        let scope = if link_authority == page_authority {
            classification.internal += 1;
            LinkScope::Internal
        } else {
            classification.external += 1;
            LinkScope::External
        };
        debug!("  -> {} resolved to {} ({:?})", href, url, scope);

        classification.links.push(ResolvedLink {
            href: href.clone(),
            url,
            scope,
        });
    }

    classification
}
