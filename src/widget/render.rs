use pulldown_cmark::{ html, CowStr, Event, Options, Parser, Tag, TagEnd };
use pulldown_cmark_escape::{ escape_href, escape_html };
use url::Url;

const ALLOWED_SCHEMES: [&str; 4] = ["http", "https", "tel", "mailto"];

/// Normalises a link target through the WHATWG parser. Anything outside the allowed
/// schemes, or anything that is not an absolute URL, becomes `#`.
fn safe_href(dest: &str) -> String {
    match Url::parse(dest) {
        Ok(url) if ALLOWED_SCHEMES.contains(&url.scheme()) => url.into(),
        _ => "#".to_string(),
    }
}

fn anchor_open(dest: &str, title: &str) -> String {
    // Writing into a String cannot fail.
    let mut anchor = String::from("<a href=\"");
    let _ = escape_href(&mut anchor, &safe_href(dest));
    anchor.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\"");
    if !title.is_empty() {
        anchor.push_str(" title=\"");
        let _ = escape_html(&mut anchor, title);
        anchor.push('"');
    }
    anchor.push('>');
    anchor
}

/// Renders assistant markdown for the chat window. Links open in a new tab and raw HTML
/// from the model is shown as text.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH).map(|event| {
        match event {
            Event::Start(Tag::Link { dest_url, title, .. }) => {
                Event::InlineHtml(CowStr::from(anchor_open(&dest_url, &title)))
            }
            Event::End(TagEnd::Link) => Event::InlineHtml(CowStr::Borrowed("</a>")),
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        }
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
