use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

static QUERY_ID: OnceLock<Regex> = OnceLock::new();
static SHARE_PATH: OnceLock<Regex> = OnceLock::new();

fn query_id_pattern() -> &'static Regex {
    QUERY_ID.get_or_init(|| Regex::new(r"[?&]id=([^&]+)").expect("invalid query id pattern"))
}

fn share_path_pattern() -> &'static Regex {
    SHARE_PATH.get_or_init(|| {
        Regex::new(r"/d/([^/]+)/(view|preview|edit)").expect("invalid share path pattern")
    })
}

/// Rewrite a document URL into a form a browser can preview inline.
///
/// Insecure schemes are upgraded to https, and file-sharing "view" links
/// (a `/d/<id>/view|preview|edit` path segment or an `id` query parameter)
/// are rewritten to the direct-preview form. Anything else passes through
/// untouched. Applying this twice yields the same string as applying it
/// once.
pub fn normalize_preview_url(url: &str) -> String {
    let url = match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    };

    let file_id = query_id_pattern()
        .captures(&url)
        .map(|c| c[1].to_string())
        .or_else(|| share_path_pattern().captures(&url).map(|c| c[1].to_string()));

    match file_id {
        Some(id) => format!("https://drive.google.com/uc?export=preview&id={}", id),
        None => url,
    }
}

/// Parse a calendar date from the formats clients actually send: a plain
/// `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrades_insecure_scheme() {
        assert_eq!(
            normalize_preview_url("http://cdn.example.com/docs/a.pdf?x=1"),
            "https://cdn.example.com/docs/a.pdf?x=1"
        );
    }

    #[test]
    fn rewrites_share_path_links() {
        assert_eq!(
            normalize_preview_url("http://drive.example.com/file/d/ABC123/view?usp=sharing"),
            "https://drive.google.com/uc?export=preview&id=ABC123"
        );
    }

    #[test]
    fn rewrites_id_query_links() {
        assert_eq!(
            normalize_preview_url("https://drive.google.com/open?id=XYZ789&foo=bar"),
            "https://drive.google.com/uc?export=preview&id=XYZ789"
        );
    }

    #[test]
    fn leaves_direct_urls_alone() {
        let url = "https://res.example.com/invoices/doc.pdf";
        assert_eq!(normalize_preview_url(url), url);
    }

    #[test]
    fn leaves_non_urls_alone() {
        assert_eq!(normalize_preview_url("not a url"), "not a url");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "http://drive.example.com/file/d/ABC123/view?usp=sharing",
            "https://drive.google.com/open?id=XYZ789",
            "http://cdn.example.com/docs/a.pdf",
            "https://res.example.com/invoices/doc.pdf",
        ];
        for input in inputs {
            let once = normalize_preview_url(input);
            let twice = normalize_preview_url(&once);
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    #[test]
    fn parses_plain_and_rfc3339_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("2024-01-15T10:30:00Z"), Some(expected));
        assert_eq!(parse_date(" 2024-01-15 "), Some(expected));
        assert_eq!(parse_date("15/01/2024"), None);
        assert_eq!(parse_date("2024-13-40"), None);
        assert_eq!(parse_date(""), None);
    }
}
