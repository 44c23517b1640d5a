use url::Url;

/// Normalize a URL for reconciliation: two URLs differing only by query
/// string or fragment are considered the same page.
pub fn normalize_url(raw: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(raw)?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}
