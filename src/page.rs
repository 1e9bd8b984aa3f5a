use url::{ParseError, Url};

/// Document-level side effects the client performs on the game page.
pub trait Page {
    /// Replaces the current document with a fresh copy of the same location.
    fn reload(&self);

    fn title(&self) -> String;

    fn set_title(&self, title: &str);

    /// Inline background colour of the page body (empty when unset).
    fn background(&self) -> String;

    fn set_background(&self, color: &str);
}

/// Where to navigate for a full reload of `href`.
///
/// The fragment is dropped, since navigating to a URL that differs from the
/// current one only by its fragment stays within the same document.
pub fn reload_target(href: &str) -> Result<Url, ParseError> {
    let mut url = Url::parse(href)?;
    url.set_fragment(None);
    Ok(url)
}
