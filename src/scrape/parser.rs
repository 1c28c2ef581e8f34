//! Record parser for department listing pages and faculty profile pages.
//!
//! All knowledge of the remote site's markup lives here. Listing pages hold one
//! `div.well` card per faculty member; profile pages are scanned as plain text
//! for contact details plus the bold "AREAS OF INTEREST" paragraph.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::errors::ParseAnomaly;
use crate::models::{FacultyEntry, ProfileDetails};

/// A listing card turned into an entry, plus the profile page it links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub entry: FacultyEntry,
    pub profile_url: Option<String>,
}

/// Result of parsing one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingParse {
    pub entries: Vec<ListingEntry>,
    pub anomalies: Vec<ParseAnomaly>,
}

struct ListingSelectors {
    card: Selector,
    name: Selector,
    heading: Selector,
    image: Selector,
    link: Selector,
}

fn listing_selectors() -> &'static ListingSelectors {
    static SELECTORS: OnceLock<ListingSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| ListingSelectors {
        card: Selector::parse("div.well").expect("static card selector is valid"),
        name: Selector::parse("h5.media-heading").expect("static name selector is valid"),
        heading: Selector::parse("h5").expect("static heading selector is valid"),
        image: Selector::parse("img[src]").expect("static image selector is valid"),
        link: Selector::parse("a[href]").expect("static link selector is valid"),
    })
}

fn bold_selector() -> &'static Selector {
    static BOLD: OnceLock<Selector> = OnceLock::new();
    BOLD.get_or_init(|| Selector::parse("b").expect("static bold selector is valid"))
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| {
        Regex::new(r"\+\d{1,3}\s*\d{10}|\b\d{10}\b").expect("static phone pattern is valid")
    })
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
            .expect("static email pattern is valid")
    })
}

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"https?://\S+").expect("static url pattern is valid"))
}

fn link_label_pattern() -> &'static Regex {
    static LABELS: OnceLock<Regex> = OnceLock::new();
    LABELS.get_or_init(|| {
        Regex::new(r"(?i)EXTERNAL\s*LINK\s*:?|PERSONAL\s*WEB\s*PAGE\s*:?")
            .expect("static label pattern is valid")
    })
}

const AREAS_OF_INTEREST_LABEL: &str = "AREAS OF INTEREST";

/// Parse a listing page into entries, in on-page order.
///
/// Never fails: a card without a usable name is recorded as an anomaly and
/// skipped, and a page without cards yields an empty result.
pub fn parse_listing(department: &str, page_url: &str, markup: &str) -> ListingParse {
    let selectors = listing_selectors();
    let document = Html::parse_document(markup);
    let base = Url::parse(page_url).ok();

    let mut parsed = ListingParse::default();
    for (index, card) in document.select(&selectors.card).enumerate() {
        match parse_card(department, base.as_ref(), card, selectors) {
            Ok(entry) => parsed.entries.push(entry),
            Err(reason) => parsed.anomalies.push(ParseAnomaly {
                department: department.to_string(),
                index,
                reason,
            }),
        }
    }
    parsed
}

fn parse_card(
    department: &str,
    base: Option<&Url>,
    card: ElementRef<'_>,
    selectors: &ListingSelectors,
) -> Result<ListingEntry, &'static str> {
    let name_heading = card
        .select(&selectors.name)
        .next()
        .ok_or("missing name heading")?;
    let name = element_text(name_heading);
    if name.is_empty() {
        return Err("empty name");
    }

    let title = card
        .select(&selectors.heading)
        .filter(|h| h.id() != name_heading.id())
        .last()
        .map(element_text)
        .unwrap_or_default();

    let image = card
        .select(&selectors.image)
        .filter_map(|img| img.value().attr("src"))
        .find_map(|src| resolve(base, src));

    let profile_url = card
        .select(&selectors.link)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| is_page_link(href))
        .find_map(|href| resolve(base, href));

    Ok(ListingEntry {
        entry: FacultyEntry {
            department: department.to_string(),
            name,
            title,
            image,
            email: None,
            number: None,
            areas_of_interest: None,
        },
        profile_url,
    })
}

/// Extract contact details from a profile page. Missing pieces stay `None`.
pub fn parse_profile(markup: &str) -> ProfileDetails {
    let document = Html::parse_document(markup);
    let text = visible_text(document.root_element());

    let number = phone_pattern()
        .find(&text)
        .map(|m| m.as_str().trim().to_string());
    let email = email_pattern()
        .find(&text)
        .map(|m| m.as_str().trim().to_string());

    ProfileDetails {
        email,
        number,
        areas_of_interest: areas_of_interest(&document),
    }
}

fn areas_of_interest(document: &Html) -> Option<String> {
    let label = document
        .select(bold_selector())
        .find(|b| element_text(*b).to_uppercase().contains(AREAS_OF_INTEREST_LABEL))?;
    let paragraph = label.parent().and_then(ElementRef::wrap)?;

    let label_text = element_text(label);
    let text = visible_text(paragraph).replace(&label_text, "");
    let text = url_pattern().replace_all(&text, "");
    let text = link_label_pattern().replace_all(&text, "");

    let cleaned = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Text of an element with fragments trimmed and joined by single spaces.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Like `element_text`, but ignores script and style content.
fn visible_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
            });
            if hidden {
                None
            } else {
                Some(text.trim())
            }
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_page_link(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    !href.is_empty()
        && !href.starts_with('#')
        && !lower.starts_with("mailto:")
        && !lower.starts_with("tel:")
        && !lower.starts_with("javascript:")
}

/// Resolve a possibly-relative reference to an absolute http(s) URL.
fn resolve(base: Option<&Url>, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    let url = match base {
        Some(base) => base.join(reference).ok()?,
        None => Url::parse(reference).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::fixtures::{listing_page, profile_page, Card};

    const PAGE: &str = "https://uni.test/dept/cse/faculty";

    #[test]
    fn test_parse_listing_extracts_cards_in_order() {
        let markup = listing_page(&[
            Card::new("Dr. Asha Rao", "Professor").image("/img/asha.jpg").link("/people/asha"),
            Card::new("Dr. Vikram Sen", "Assistant Professor"),
        ]);

        let parsed = parse_listing("cse", PAGE, &markup);

        assert!(parsed.anomalies.is_empty());
        assert_eq!(parsed.entries.len(), 2);

        let first = &parsed.entries[0];
        assert_eq!(first.entry.department, "cse");
        assert_eq!(first.entry.name, "Dr. Asha Rao");
        assert_eq!(first.entry.title, "Professor");
        assert_eq!(
            first.entry.image.as_deref(),
            Some("https://uni.test/img/asha.jpg")
        );
        assert_eq!(
            first.profile_url.as_deref(),
            Some("https://uni.test/people/asha")
        );

        let second = &parsed.entries[1];
        assert_eq!(second.entry.name, "Dr. Vikram Sen");
        assert!(second.entry.image.is_none());
        assert!(second.profile_url.is_none());
    }

    #[test]
    fn test_malformed_card_is_skipped_not_fatal() {
        let markup = r#"
            <html><body>
              <div class="well"><h5 class="media-heading">First</h5><h5>Lecturer</h5></div>
              <div class="well"><h5>Orphan title</h5></div>
              <div class="well"><h5 class="media-heading">   </h5></div>
              <div class="well"><h5 class="media-heading">Third</h5></div>
            </body></html>
        "#;

        let parsed = parse_listing("ece", PAGE, markup);

        let names: Vec<_> = parsed.entries.iter().map(|e| e.entry.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Third"]);
        assert_eq!(parsed.anomalies.len(), 2);
        assert_eq!(parsed.anomalies[0].index, 1);
        assert_eq!(parsed.anomalies[0].reason, "missing name heading");
        assert_eq!(parsed.anomalies[1].index, 2);
        assert_eq!(parsed.anomalies[1].reason, "empty name");
    }

    #[test]
    fn test_missing_title_is_empty_string() {
        let markup = r#"<div class="well"><h5 class="media-heading">Solo</h5></div>"#;
        let parsed = parse_listing("mech", PAGE, markup);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].entry.title, "");
    }

    #[test]
    fn test_page_without_cards_is_empty() {
        let parsed = parse_listing("sos", PAGE, "<html><body><p>Coming soon</p></body></html>");
        assert!(parsed.entries.is_empty());
        assert!(parsed.anomalies.is_empty());
    }

    #[test]
    fn test_reparse_is_identical() {
        let markup = listing_page(&[
            Card::new("A", "Professor").link("a.html"),
            Card::new("B", "Associate Professor").image("b.png"),
        ]);
        assert_eq!(
            parse_listing("cse", PAGE, &markup),
            parse_listing("cse", PAGE, &markup)
        );
    }

    #[test]
    fn test_non_page_links_are_ignored() {
        let markup = r##"
            <div class="well">
              <h5 class="media-heading">Mail Only</h5>
              <a href="mailto:m@uni.test">mail</a>
              <a href="#top">top</a>
              <a href="profile/mail-only">profile</a>
            </div>
        "##;
        let parsed = parse_listing("cse", PAGE, markup);
        assert_eq!(
            parsed.entries[0].profile_url.as_deref(),
            Some("https://uni.test/dept/cse/profile/mail-only")
        );
    }

    #[test]
    fn test_parse_profile_extracts_contact_details() {
        let markup = profile_page(
            "Phone: +91 9876543210",
            "asha.rao@uni.test",
            "Machine Learning, Computer Vision",
        );

        let details = parse_profile(&markup);

        assert_eq!(details.number.as_deref(), Some("+91 9876543210"));
        assert_eq!(details.email.as_deref(), Some("asha.rao@uni.test"));
        assert_eq!(
            details.areas_of_interest.as_deref(),
            Some("Machine Learning, Computer Vision")
        );
    }

    #[test]
    fn test_areas_of_interest_strips_links_and_labels() {
        let markup = r#"
            <html><body>
              <p><b>Areas of Interest:</b> VLSI Design, Embedded Systems
                 EXTERNAL LINK: https://scholar.example.org/xyz
                 Personal Web Page : http://home.example.org</p>
              <script>var phone = "1234567890";</script>
            </body></html>
        "#;

        let details = parse_profile(markup);

        assert_eq!(
            details.areas_of_interest.as_deref(),
            Some("VLSI Design, Embedded Systems")
        );
        assert!(details.number.is_none());
        assert!(details.email.is_none());
    }

    #[test]
    fn test_empty_areas_of_interest_is_absent() {
        let markup = "<p><b>AREAS OF INTEREST :</b> https://only.example.org/link</p>";
        assert!(parse_profile(markup).areas_of_interest.is_none());
    }

    #[test]
    fn test_bare_ten_digit_phone() {
        let details = parse_profile("<p>Office 0866 ext. Mobile 9123456780</p>");
        assert_eq!(details.number.as_deref(), Some("9123456780"));
    }
}
