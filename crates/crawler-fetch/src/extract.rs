use crawler_types::CanonicalUrl;
use scraper::{Html, Selector};
use url::Url;

pub struct Extracted {
    pub title: Option<String>,
    pub body: String,
    pub links: Vec<CanonicalUrl>,
}

pub fn extract(html: &str, final_url: &CanonicalUrl) -> Result<Extracted, String> {
    let base = Url::parse(final_url.as_str()).map_err(|e| e.to_string())?;
    let document = Html::parse_document(html);

    let title = title_selector()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let body = collapse_whitespace(&document.root_element().text().collect::<String>());

    let links = extract_links(&document, &base);

    Ok(Extracted { title, body, links })
}

fn title_selector() -> Option<Selector> {
    Selector::parse("title").ok()
}

fn link_selector() -> Option<Selector> {
    Selector::parse("a[href]").ok()
}

fn extract_links(document: &Html, base: &Url) -> Vec<CanonicalUrl> {
    let Some(selector) = link_selector() else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for el in document.select(&selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if let Ok(url) = CanonicalUrl::resolve(base, href) {
            links.push(url);
        }
    }
    links
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_of_whitespace() {
        assert_eq!(collapse_whitespace("a   b\n\tc"), "a b c");
    }

    #[test]
    fn extracts_title_body_and_links() {
        let html = r#"
            <html>
              <head><title>  Example Page  </title></head>
              <body>
                <p>Hello   world</p>
                <a href="/a">A</a>
                <a href="https://other.example/b#frag">B</a>
                <a href="mailto:x@y.com">skip</a>
              </body>
            </html>
        "#;
        let base = CanonicalUrl::parse("https://example.com/index.html").unwrap();
        let extracted = extract(html, &base).unwrap();
        assert_eq!(extracted.title.as_deref(), Some("Example Page"));
        assert!(extracted.body.contains("Hello world"));
        assert_eq!(extracted.links.len(), 2);
        assert_eq!(extracted.links[0].as_str(), "https://example.com/a");
        assert_eq!(extracted.links[1].as_str(), "https://other.example/b");
    }
}
