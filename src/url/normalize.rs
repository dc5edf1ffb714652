//! URL normalization rules
//!
//! Turns a raw href/src plus the page it appeared on into a canonical
//! absolute URL, or rejects it. Rejection is a normal outcome (script links,
//! unsupported schemes, overlong URLs), so the result is an `Option`, not an
//! error.

/// Whether a link is being normalized as a page target or an image source
///
/// Image URLs additionally have their query string stripped, page URLs keep
/// theirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlTarget {
    Page,
    Image,
}

/// Top-level domains recognized when promoting a bare domain name to an
/// absolute URL
const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "biz", "info", "name", "museum", "us", "ca", "uk",
    "fr", "de", "jp", "ru", "cn", "es", "it", "au", "nz", "ch", "nl", "be", "se", "no", "fi",
    "dk", "at", "gr", "ie", "pl", "pt", "cz", "ro", "hu", "sk", "hr", "bg", "rs", "lv", "lt",
    "ee", "is", "cy", "lu", "mt", "md", "al", "ad", "li", "mc", "sm", "va", "by", "ua", "kz",
    "uz", "tm", "kg", "ge", "am", "az", "tr", "il", "in", "ae", "sa", "ir", "kw", "bh", "qa",
    "om", "ye", "ps", "lb", "jo", "sy", "iq", "eg", "ly", "dz", "ma", "tn", "sd", "er", "so",
    "ke", "et", "dj", "ug", "bi", "rw", "mg", "mu", "sc", "za", "na", "bw", "zw", "zm", "sz",
    "ls", "mw", "gq", "ga", "st", "cv", "td", "km", "cg", "ci", "lr", "sl", "gh", "ng", "cm",
    "cf", "mr", "sn", "gn", "gw", "tg", "bf", "ne", "re", "yt", "tf", "nf", "aq", "hm", "bv",
    "gs",
];

/// Normalizes a raw link against the page it was found on
///
/// # Rules
///
/// 1. Reject links carrying `javascript:`, `data:image/`, or `mailto:`.
/// 2. Already-absolute http(s) links keep their text.
/// 3. A leading slash re-bases onto the base URL's scheme and host.
/// 4. Anything else is resolved against the base URL's directory; a bare
///    domain with a recognized TLD is instead promoted to an absolute URL
///    using the base URL's scheme.
/// 5. Post-processing on every accepted branch: fragment stripped always,
///    query stripped for image targets, one trailing slash popped, literal
///    spaces percent-encoded, and anything at or above `max_len` rejected.
pub fn canonicalize(link: &str, base_url: &str, target: UrlTarget, max_len: usize) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    let lowered = link.to_ascii_lowercase();
    if lowered.contains("javascript:")
        || lowered.contains("data:image/")
        || lowered.contains("mailto:")
    {
        return None;
    }

    let resolved = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        link.to_string()
    } else if link.starts_with('/') {
        format!("{}{}", scheme_and_host(base_url)?, link)
    } else if is_bare_domain(link) {
        format!("{}{}", scheme_prefix(base_url)?, link)
    } else {
        format!("{}{}", base_directory(base_url), link)
    };

    let cut_set: &[char] = match target {
        UrlTarget::Image => &['?', '#'],
        UrlTarget::Page => &['#'],
    };
    let mut url = match resolved.find(cut_set) {
        Some(pos) => resolved[..pos].to_string(),
        None => resolved,
    };
    if url.ends_with('/') {
        url.pop();
    }
    let url = url.replace(' ', "%20");

    if url.is_empty() || url.len() >= max_len {
        None
    } else {
        Some(url)
    }
}

/// Extracts `scheme://host` from the base URL
fn scheme_and_host(base_url: &str) -> Option<&str> {
    let scheme = scheme_prefix(base_url)?;
    let rest = &base_url[scheme.len()..];
    let host_end = rest.find('/').map_or(base_url.len(), |p| scheme.len() + p);
    Some(&base_url[..host_end])
}

/// Extracts the `http://` or `https://` prefix from the base URL
fn scheme_prefix(base_url: &str) -> Option<&str> {
    let lowered_start = base_url.get(..8).unwrap_or(base_url).to_ascii_lowercase();
    if lowered_start.starts_with("https://") {
        Some(&base_url[..8])
    } else if lowered_start.starts_with("http://") {
        Some(&base_url[..7])
    } else {
        None
    }
}

/// The base URL's directory: everything up to and including the last slash
fn base_directory(base_url: &str) -> &str {
    match base_url.rfind('/') {
        Some(pos) => &base_url[..=pos],
        None => base_url,
    }
}

/// True when the link text itself looks like `host.tld` with a recognized TLD
fn is_bare_domain(link: &str) -> bool {
    if link.contains('/') {
        return false;
    }
    match link.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty() && KNOWN_TLDS.contains(&tld.to_ascii_lowercase().as_str())
        }
        None => false,
    }
}
