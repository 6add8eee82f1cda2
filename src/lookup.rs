use reqwest::Url;

use crate::error::StudioError;
use crate::models::ProductLink;

/// Turns the identification answer into a link on the shopping site.
/// The answer is trimmed and used verbatim as the `k` query parameter.
pub fn product_link(search_base: &Url, answer: &str) -> Result<ProductLink, StudioError> {
    let query = answer.trim();
    if query.is_empty() {
        return Err(StudioError::NoItemIdentified);
    }
    let mut url = search_base.clone();
    url.query_pairs_mut().clear().append_pair("k", query);
    Ok(ProductLink { query: query.to_string(), url: url.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn amazon() -> Url {
        Url::parse("https://www.amazon.com/s").unwrap()
    }

    #[test]
    fn query_is_percent_encoded() {
        let link = product_link(&amazon(), "  modern blue sofa & ottoman\n").unwrap();
        assert_eq!(link.query, "modern blue sofa & ottoman");
        assert_eq!(link.url, "https://www.amazon.com/s?k=modern+blue+sofa+%26+ottoman");
    }

    #[test]
    fn base_query_is_replaced() {
        let base = Url::parse("https://shop.example/search?k=old&ref=x").unwrap();
        let link = product_link(&base, "rattan chair").unwrap();
        assert_eq!(link.url, "https://shop.example/search?k=rattan+chair");
    }

    #[test]
    fn blank_answer_identifies_nothing() {
        assert_eq!(product_link(&amazon(), " \n "), Err(StudioError::NoItemIdentified));
    }
}
