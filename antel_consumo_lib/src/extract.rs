//! Field extraction over captured documents.
//!
//! Each logical field has a static, ordered list of strategies. A strategy
//! pairs a probe (where to look) with a pure function that turns the probed
//! text into a normalized value, or rejects it. Strategies are tried in order
//! against the main document and, for frame-sensitive fields, every child
//! frame; the first accepted text wins. Probe failures of any kind (invalid
//! selector, no element, regex miss) are a plain "no match".

use std::fmt;

use antel_browser::{DocumentSnapshot, Frame, FrameSnapshot};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::normalize::{collapse_whitespace, find_quantities, normalize_date, normalize_quantity};
use crate::snapshot::{CapturedFields, QuantitySource};

/// Number of characters of visible body text kept for diagnostics.
const BODY_SAMPLE_CHARS: usize = 1000;

/// Where a strategy looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Text of each element matching a CSS selector.
    Css(&'static str),
    /// Text of each matching element that contains `needle` (case-insensitive).
    CssContaining {
        selector: &'static str,
        needle: &'static str,
    },
    /// Element text joined with its next element sibling, for markup that
    /// splits a value and its unit across tags.
    CssWithSibling(&'static str),
    /// Regex over the raw markup. Capture group 1 if present, else the match.
    HtmlPattern(&'static str),
    /// Regex over the text content of the whole document.
    TextPattern(&'static str),
    /// Regex over the text content preceding the first occurrence of `stop`
    /// (case-insensitive); the whole text when `stop` is absent.
    TextPatternBefore {
        pattern: &'static str,
        stop: &'static str,
    },
}

/// A probe paired with its extraction function.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub probe: Probe,
    pub extract: fn(&str) -> Option<String>,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("probe", &self.probe).finish()
    }
}

impl Strategy {
    pub const fn new(probe: Probe, extract: fn(&str) -> Option<String>) -> Self {
        Self { probe, extract }
    }
}

/// Ordered strategies for one logical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub strategies: &'static [Strategy],
    /// Also look inside child frames.
    pub search_frames: bool,
}

/// A successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Normalized text returned by the extraction function.
    pub text: String,
    /// Index of the winning strategy.
    pub strategy: usize,
    /// Document the text came from.
    pub frame: Frame,
}

pub const USED: FieldSpec = FieldSpec {
    name: "used_data_gb",
    strategies: &[
        Strategy::new(
            Probe::CssContaining {
                selector: ".progress-bar__label",
                needle: "Consumidos",
            },
            quantity,
        ),
        Strategy::new(Probe::Css("[class*=\"usado\"]"), quantity),
        Strategy::new(Probe::Css("[class*=\"consumido\"]"), quantity),
        Strategy::new(
            Probe::TextPattern(r"(?i)(?:Consumidos|Usados?)\s*:?\s*([\d.,]+\s*[KMGT]B)"),
            quantity,
        ),
    ],
    search_frames: true,
};

pub const TOTAL: FieldSpec = FieldSpec {
    name: "total_data_gb",
    strategies: &[
        Strategy::new(
            Probe::CssContaining {
                selector: ".progress-bar__label",
                needle: "Incluido",
            },
            quantity,
        ),
        Strategy::new(Probe::Css("[class*=\"total\"]"), quantity),
        Strategy::new(
            Probe::TextPattern(r"(?i)(?:Incluidos?|Total)\s*:?\s*([\d.,]+\s*[KMGT]B)"),
            quantity,
        ),
    ],
    search_frames: true,
};

pub const REMAINING: FieldSpec = FieldSpec {
    name: "remaining_data_gb",
    strategies: &[
        Strategy::new(Probe::CssWithSibling(".value-data"), quantity),
        // The top-up card repeats "Me quedan" for its own balance.
        Strategy::new(
            Probe::TextPatternBefore {
                pattern: r"(?i)Me quedan\s*([\d.,]+\s*[KMGT]B)",
                stop: "Recarga datos",
            },
            quantity,
        ),
    ],
    search_frames: true,
};

pub const TOPUP_BALANCE: FieldSpec = FieldSpec {
    name: "topup_balance_gb",
    strategies: &[
        Strategy::new(
            Probe::TextPattern(r"(?i)Saldo de recargas[.:]?\s*([\d.,]+\s*GB)"),
            quantity,
        ),
        Strategy::new(
            Probe::TextPattern(r"(?i)Recarga datos.*?Me quedan\s*([\d.,]+\s*GB)"),
            quantity,
        ),
    ],
    search_frames: false,
};

pub const TOPUP_EXPIRATION: FieldSpec = FieldSpec {
    name: "topup_expiration",
    strategies: &[
        Strategy::new(
            Probe::TextPattern(
                r"(?i)Recarga datos.*?Vence el\s*(\d{1,2}/\d{1,2}/\d{4}|\d{1,2}\s+de\s+\w+(?:\s+(?:de\s+)?\d{4})?)",
            ),
            non_empty,
        ),
        Strategy::new(
            Probe::TextPattern(
                r"(?i)Vence el\s*(\d{1,2}/\d{1,2}/\d{4}|\d{1,2}\s+de\s+\w+(?:\s+(?:de\s+)?\d{4})?)",
            ),
            non_empty,
        ),
    ],
    search_frames: false,
};

pub const PLAN: FieldSpec = FieldSpec {
    name: "plan_name",
    strategies: &[
        Strategy::new(Probe::Css(".plan-title"), plan_label),
        Strategy::new(Probe::Css("[class*=\"plan\"]"), plan_label),
        Strategy::new(Probe::Css("[class*=\"nombre\"]"), plan_label),
    ],
    search_frames: false,
};

pub const BILLING_PERIOD: FieldSpec = FieldSpec {
    name: "billing_period",
    strategies: &[
        Strategy::new(
            Probe::CssContaining {
                selector: "p",
                needle: "Ciclo actual",
            },
            after_colon,
        ),
        Strategy::new(Probe::Css("[class*=\"periodo\"]"), non_empty),
        Strategy::new(
            Probe::TextPattern(
                r"(?i)Ciclo actual:?\s*(\d{1,2}\s+de\s+\w+(?:\s+al\s+\d{1,2}\s+de\s+\w+)?(?:\s+(?:de\s+)?\d{4})?)",
            ),
            non_empty,
        ),
    ],
    search_frames: false,
};

pub const DAYS_UNTIL_RENEWAL: FieldSpec = FieldSpec {
    name: "days_until_renewal",
    strategies: &[Strategy::new(
        Probe::TextPattern(r"(?i)Quedan?\s*(\d+)\s*d[íi]as?"),
        whole_number,
    )],
    search_frames: false,
};

pub const CONTRACT_END: FieldSpec = FieldSpec {
    name: "contract_end_date",
    strategies: &[
        Strategy::new(
            Probe::TextPattern(r"(?i)Fin de contrato[:\s]*(\d{1,2}/\d{1,2}/\d{4})"),
            non_empty,
        ),
        Strategy::new(
            Probe::HtmlPattern(r"(?i)Fin de contrato:?\s*(?:<[^>]+>\s*)*(\d{1,2}/\d{1,2}/\d{4})"),
            non_empty,
        ),
    ],
    search_frames: false,
};

/// Accepts text holding a data quantity.
fn quantity(text: &str) -> Option<String> {
    normalize_quantity(text)?;
    Some(collapse_whitespace(text))
}

fn non_empty(text: &str) -> Option<String> {
    let text = collapse_whitespace(text);
    (!text.is_empty()).then_some(text)
}

/// Plan labels never mention data amounts; an element that does is a
/// quantity container whose class happens to contain "plan".
fn plan_label(text: &str) -> Option<String> {
    let text = non_empty(text)?;
    (!text.to_uppercase().contains("GB")).then_some(text)
}

fn after_colon(text: &str) -> Option<String> {
    let (_, rest) = text.split_once(':')?;
    non_empty(rest)
}

fn whole_number(text: &str) -> Option<String> {
    text.trim().parse::<u32>().ok().map(|n| n.to_string())
}

/// One captured document, parsed once per extraction pass.
struct ParsedDocument<'a> {
    frame: Frame,
    raw: &'a FrameSnapshot,
    html: Html,
    text: String,
}

impl<'a> ParsedDocument<'a> {
    fn new(frame: Frame, raw: &'a FrameSnapshot) -> Self {
        let html = Html::parse_document(&raw.html);
        let text = text_content(&html);
        Self {
            frame,
            raw,
            html,
            text,
        }
    }

    fn candidates(&self, probe: &Probe) -> Vec<String> {
        match *probe {
            Probe::Css(selector) => self
                .select(selector)
                .into_iter()
                .map(|el| element_text(&el))
                .collect(),
            Probe::CssContaining { selector, needle } => {
                let needle = needle.to_lowercase();
                self.select(selector)
                    .into_iter()
                    .map(|el| element_text(&el))
                    .filter(|text| text.to_lowercase().contains(&needle))
                    .collect()
            }
            Probe::CssWithSibling(selector) => self
                .select(selector)
                .into_iter()
                .map(|el| {
                    let own = element_text(&el);
                    match el.next_siblings().find_map(ElementRef::wrap) {
                        Some(sibling) => format!("{} {}", own, element_text(&sibling)),
                        None => own,
                    }
                })
                .collect(),
            Probe::HtmlPattern(pattern) => pattern_matches(pattern, &self.raw.html),
            Probe::TextPattern(pattern) => pattern_matches(pattern, &self.text),
            Probe::TextPatternBefore { pattern, stop } => {
                pattern_matches(pattern, text_before(&self.text, stop))
            }
        }
    }

    fn select(&self, selector: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(selector) {
            Ok(selector) => self.html.select(&selector).collect(),
            Err(_) => {
                debug!("Skipping invalid selector {:?}", selector);
                Vec::new()
            }
        }
    }
}

/// Collapsed text of an element and its descendants.
fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text content of the whole document, hidden elements included, scripts
/// and styles excluded.
fn text_content(html: &Html) -> String {
    let parts: Vec<&str> = html
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?;
            let parent_name = parent.value().as_element().map(|el| el.name());
            match parent_name {
                Some("script") | Some("style") | Some("noscript") => None,
                _ => Some(&**text),
            }
        })
        .collect();
    collapse_whitespace(&parts.join(" "))
}

fn pattern_matches(pattern: &str, haystack: &str) -> Vec<String> {
    let Ok(re) = Regex::new(pattern) else {
        debug!("Skipping invalid pattern {:?}", pattern);
        return Vec::new();
    };
    re.captures_iter(haystack)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `text` up to the first case-insensitive occurrence of `stop`.
fn text_before<'t>(text: &'t str, stop: &str) -> &'t str {
    let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(stop))) else {
        return text;
    };
    match re.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

/// Builds a [`FrameSnapshot`] from markup alone, deriving the body text from
/// the document's text content.
pub fn frame_from_html(html: &str) -> FrameSnapshot {
    let text = text_content(&Html::parse_document(html));
    FrameSnapshot {
        html: html.to_string(),
        body_text: text,
    }
}

fn parse_all(document: &DocumentSnapshot) -> Vec<ParsedDocument<'_>> {
    std::iter::once(ParsedDocument::new(Frame::Main, &document.main))
        .chain(
            document
                .frames
                .iter()
                .enumerate()
                .map(|(i, frame)| ParsedDocument::new(Frame::Child(i), frame)),
        )
        .collect()
}

fn extract_parsed(docs: &[ParsedDocument<'_>], spec: &FieldSpec) -> Option<Extracted> {
    let docs = if spec.search_frames { docs } else { &docs[..docs.len().min(1)] };
    for (idx, strategy) in spec.strategies.iter().enumerate() {
        for doc in docs {
            let hit = doc
                .candidates(&strategy.probe)
                .iter()
                .find_map(|text| (strategy.extract)(text));
            if let Some(text) = hit {
                debug!(
                    "{} matched strategy {} ({:?}) in {}",
                    spec.name, idx, strategy.probe, doc.frame
                );
                return Some(Extracted {
                    text,
                    strategy: idx,
                    frame: doc.frame,
                });
            }
        }
    }
    debug!("{} not found", spec.name);
    None
}

/// Runs one field's strategies against `document`.
pub fn extract_field(document: &DocumentSnapshot, spec: &FieldSpec) -> Option<Extracted> {
    extract_parsed(&parse_all(document), spec)
}

/// Extracts every consumption field from `document`.
///
/// `today` anchors dates printed without a year. Missing fields stay `None`;
/// the raw text behind every hit is kept in `raw_data`.
pub fn extract_consumption(document: &DocumentSnapshot, today: NaiveDate) -> CapturedFields {
    let docs = parse_all(document);
    let mut fields = CapturedFields::default();
    let raw = &mut fields.raw_data;

    let visible = if document.main.body_text.trim().is_empty() {
        docs.first().map(|doc| doc.text.clone()).unwrap_or_default()
    } else {
        document.main.body_text.clone()
    };
    raw.insert(
        "body_text_sample".to_string(),
        visible.chars().take(BODY_SAMPLE_CHARS).collect(),
    );

    if let Some(hit) = extract_parsed(&docs, &USED) {
        fields.used_data_gb = normalize_quantity(&hit.text);
        raw.insert("used_element".to_string(), hit.text);
    }
    if let Some(hit) = extract_parsed(&docs, &TOTAL) {
        fields.total_data_gb = normalize_quantity(&hit.text);
        raw.insert("total_element".to_string(), hit.text);
    }

    fields.quantity_source = if fields.used_data_gb.is_some() || fields.total_data_gb.is_some() {
        QuantitySource::Structured
    } else {
        let matches = find_quantities(&visible);
        if matches.is_empty() {
            QuantitySource::Missing
        } else {
            warn!(
                "No labelled data quantities; assigning from {} body matches in document order",
                matches.len()
            );
            let listed: Vec<&str> = matches.iter().map(|(_, text)| text.as_str()).collect();
            raw.insert("data_matches".to_string(), listed.join(" | "));
            fields.used_data_gb = matches.first().map(|(gb, _)| *gb);
            fields.total_data_gb = matches.get(1).map(|(gb, _)| *gb);
            QuantitySource::BodyScan
        }
    };
    raw.insert(
        "quantity_source".to_string(),
        fields.quantity_source.as_str().to_string(),
    );

    if let Some(hit) = extract_parsed(&docs, &REMAINING) {
        fields.remaining_data_gb = normalize_quantity(&hit.text);
        raw.insert("remaining_text".to_string(), hit.text);
    }
    if let Some(hit) = extract_parsed(&docs, &TOPUP_BALANCE) {
        fields.topup_balance_gb = normalize_quantity(&hit.text);
        raw.insert("topup_balance".to_string(), hit.text);
    }
    if let Some(hit) = extract_parsed(&docs, &TOPUP_EXPIRATION) {
        fields.topup_expiration = normalize_date(&hit.text, today).and_then(|d| d.as_day());
        raw.insert("topup_expiration".to_string(), hit.text);
    }
    if let Some(hit) = extract_parsed(&docs, &PLAN) {
        fields.plan_name = Some(hit.text.clone());
        raw.insert("plan_name".to_string(), hit.text);
    }
    if let Some(hit) = extract_parsed(&docs, &BILLING_PERIOD) {
        fields.billing_cycle = normalize_date(&hit.text, today).and_then(|d| d.as_span());
        fields.billing_period = Some(hit.text.clone());
        raw.insert("billing_period".to_string(), hit.text);
    }
    if let Some(hit) = extract_parsed(&docs, &DAYS_UNTIL_RENEWAL) {
        fields.days_until_renewal = hit.text.parse().ok();
        raw.insert("days_until_renewal".to_string(), hit.text);
    }
    if let Some(hit) = extract_parsed(&docs, &CONTRACT_END) {
        fields.contract_end_date = normalize_date(&hit.text, today).and_then(|d| d.as_day());
        raw.insert("contract_end_date".to_string(), hit.text);
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 19).unwrap()
    }

    fn doc(html: &str) -> DocumentSnapshot {
        DocumentSnapshot {
            url: "https://aplicaciones.antel.com.uy/miAntel/consumo/internet".to_string(),
            main: frame_from_html(html),
            frames: Vec::new(),
        }
    }

    const MESSY: &str = r#"
<html>
<body class="dashboard">
  <div class="header">...</div>
  <div class="servicioBox internet active">
     <div class="inner-box">
         <span class="value-data">
            145,6
         </span>
         <small class="sign-data">GB</small>
         <div class="progress-bar__label">
             Consumidos
             104,4
             GB
         </div>
         <div class="progress-bar__label">
             Incluido 250 GB
         </div>
         <div class="plan-title">
             Fibra con límite 1
         </div>
     </div>
  </div>
  <div class="card-footer-extra">
    <div class="row d-md-none" style="display:none;">
        <div class="col">
            <p class="m-0 text-gray">
               Ciclo actual: <span>1 de enero</span> al <span>31 de enero</span>
            </p>
            <p class="m-0 text-gray">
               Quedan <strong>12</strong> días para renovar
            </p>
        </div>
    </div>
  </div>
  <footer>
     <p>Fin de contrato: <span class="highlight">26/11/2027</span></p>
  </footer>
</body>
</html>
"#;

    #[test]
    fn test_messy_document_yields_every_field() {
        let fields = extract_consumption(&doc(MESSY), today());
        assert_eq!(fields.used_data_gb, Some(104.4));
        assert_eq!(fields.total_data_gb, Some(250.0));
        assert_eq!(fields.remaining_data_gb, Some(145.6));
        assert_eq!(fields.plan_name.as_deref(), Some("Fibra con límite 1"));
        assert_eq!(
            fields.billing_period.as_deref(),
            Some("1 de enero al 31 de enero")
        );
        assert_eq!(fields.days_until_renewal, Some(12));
        assert_eq!(
            fields.contract_end_date,
            NaiveDate::from_ymd_opt(2027, 11, 26)
        );
        assert_eq!(fields.quantity_source, QuantitySource::Structured);
        let cycle = fields.billing_cycle.unwrap();
        assert_eq!(cycle.start, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(cycle.end, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
    }

    #[test]
    fn test_diagnostics_use_stable_keys() {
        let fields = extract_consumption(&doc(MESSY), today());
        for key in [
            "used_element",
            "total_element",
            "body_text_sample",
            "billing_period",
            "days_until_renewal",
            "contract_end_date",
            "remaining_text",
            "plan_name",
            "quantity_source",
        ] {
            assert!(fields.raw_data.contains_key(key), "missing {}", key);
        }
        assert_eq!(fields.raw_data["used_element"], "Consumidos 104,4 GB");
        assert_eq!(fields.raw_data["quantity_source"], "structured");
    }

    #[test]
    fn test_structured_match_beats_free_text() {
        let html = r#"<html><body>
            <p>Consumidos 99 GB el mes pasado</p>
            <div class="progress-bar__label">Consumidos 10,5 GB</div>
        </body></html>"#;
        let hit = extract_field(&doc(html), &USED).unwrap();
        assert_eq!(hit.strategy, 0);
        assert_eq!(hit.text, "Consumidos 10,5 GB");
    }

    #[test]
    fn test_free_text_is_the_last_resort() {
        let html = "<html><body><p>Consumidos: 7,25 GB</p></body></html>";
        let hit = extract_field(&doc(html), &USED).unwrap();
        assert_eq!(hit.strategy, USED.strategies.len() - 1);
        assert_eq!(normalize_quantity(&hit.text), Some(7.25));
    }

    #[test]
    fn test_body_scan_fills_used_and_total_in_order() {
        let html = "<html><body><p>Tu servicio</p><p>3,5 GB</p><p>de 50 GB</p></body></html>";
        let fields = extract_consumption(&doc(html), today());
        assert_eq!(fields.used_data_gb, Some(3.5));
        assert_eq!(fields.total_data_gb, Some(50.0));
        assert_eq!(fields.quantity_source, QuantitySource::BodyScan);
        assert_eq!(fields.raw_data["quantity_source"], "body_scan");
        assert_eq!(fields.raw_data["data_matches"], "3,5 GB | 50 GB");
    }

    #[test]
    fn test_no_quantities_at_all() {
        let fields = extract_consumption(&doc("<html><body><p>Hola</p></body></html>"), today());
        assert!(!fields.has_quantities());
        assert_eq!(fields.quantity_source, QuantitySource::Missing);
        assert_eq!(fields.plan_name, None);
    }

    #[test]
    fn test_topup_card() {
        let html = r#"<html><body>
            <div class="card"><h3>Recarga datos</h3>
            <p>Me quedan</p><p>224,6 GB</p><p>Vence el 15 de febrero 2026</p></div>
        </body></html>"#;
        let fields = extract_consumption(&doc(html), today());
        assert_eq!(fields.topup_balance_gb, Some(224.6));
        assert_eq!(
            fields.topup_expiration,
            NaiveDate::from_ymd_opt(2026, 2, 15)
        );
        assert_eq!(fields.remaining_data_gb, None);
    }

    #[test]
    fn test_remaining_ignores_topup_card() {
        let html = r#"<html><body>
            <div class="progress-bar__label">Consumidos 104,4 GB</div>
            <div class="progress-bar__label">Incluido 250 GB</div>
            <div class="card"><h3>Recarga datos</h3>
            <p>Me quedan</p><p>224,6 GB</p><p>Vence el 15 de febrero 2026</p></div>
        </body></html>"#;
        let fields = extract_consumption(&doc(html), today());
        assert_eq!(fields.remaining_data_gb, None);
        assert_eq!(fields.topup_balance_gb, Some(224.6));

        let snapshot = crate::snapshot::ConsumptionSnapshot::new(
            fields,
            chrono::Utc::now(),
            today(),
        );
        let remaining = snapshot.remaining_data_gb().unwrap();
        assert!((remaining - 145.6).abs() < 1e-9);
    }

    #[test]
    fn test_remaining_text_before_topup_card() {
        let html = r#"<html><body>
            <p>Me quedan 80 GB</p>
            <div class="card"><h3>Recarga datos</h3>
            <p>Me quedan</p><p>224,6 GB</p></div>
        </body></html>"#;
        let hit = extract_field(&doc(html), &REMAINING).unwrap();
        assert_eq!(hit.strategy, 1);
        assert_eq!(normalize_quantity(&hit.text), Some(80.0));
    }

    #[test]
    fn test_text_before_stop_marker() {
        assert_eq!(text_before("a Me quedan 1 GB RECARGA DATOS x", "Recarga datos"), "a Me quedan 1 GB ");
        assert_eq!(text_before("sin tarjeta", "Recarga datos"), "sin tarjeta");
    }

    #[test]
    fn test_topup_balance_label() {
        let html = "<html><body><p>Saldo de recargas: 12,5 GB</p></body></html>";
        let fields = extract_consumption(&doc(html), today());
        assert_eq!(fields.topup_balance_gb, Some(12.5));
    }

    #[test]
    fn test_plan_rejects_quantity_containers() {
        let html = r#"<html><body>
            <div class="plan-amount">250 GB</div>
            <div class="plan-name">Fibra Óptica Flex</div>
        </body></html>"#;
        let hit = extract_field(&doc(html), &PLAN).unwrap();
        assert_eq!(hit.text, "Fibra Óptica Flex");
    }

    #[test]
    fn test_invalid_selector_is_no_match() {
        const BROKEN: FieldSpec = FieldSpec {
            name: "broken",
            strategies: &[
                Strategy::new(Probe::Css("div[[["), non_empty),
                Strategy::new(Probe::Css("p"), non_empty),
            ],
            search_frames: false,
        };
        let hit = extract_field(&doc("<html><body><p>ok</p></body></html>"), &BROKEN).unwrap();
        assert_eq!(hit.strategy, 1);
        assert_eq!(hit.text, "ok");
    }

    #[test]
    fn test_frame_sensitive_fields_search_child_frames() {
        let mut document = doc("<html><body><p>Cargando...</p></body></html>");
        document.frames.push(frame_from_html(
            r#"<html><body><div class="progress-bar__label">Consumidos 1,5 GB</div></body></html>"#,
        ));
        let hit = extract_field(&document, &USED).unwrap();
        assert_eq!(hit.frame, Frame::Child(0));

        document.frames[0] = frame_from_html("<html><body><div class=\"plan-title\">Fibra</div></body></html>");
        assert!(extract_field(&document, &PLAN).is_none());
    }

    #[test]
    fn test_contract_end_from_markup() {
        let markup_only = FieldSpec {
            name: "contract_end_date",
            strategies: std::slice::from_ref(&CONTRACT_END.strategies[1]),
            search_frames: false,
        };
        let html = r#"<html><body><p>Fin de contrato: <b>01/03/2028</b></p></body></html>"#;
        let hit = extract_field(&doc(html), &markup_only).unwrap();
        assert_eq!(hit.text, "01/03/2028");
    }

    #[test]
    fn test_text_content_skips_scripts() {
        let frame = frame_from_html(
            "<html><head><script>var x = '5 GB';</script></head><body><p>Hola</p></body></html>",
        );
        assert_eq!(frame.body_text, "Hola");
    }
}
