// =============================================================================
// parser.rs - THE INFORMATION TABLE WHISPERER
// =============================================================================
//
// A 13F information table is XML. In theory it follows one schema. In
// practice every piece of filer software has its own opinion about namespace
// prefixes: some documents say <infoTable>, some say <ns1:infoTable>, and
// some mix the two in a single file because why not.
//
// So we never ask for a tag by one name. Every logical field is looked up as
// the bare name first, then under each prefix in TAG_PREFIXES, in that fixed
// order. The first match with non-empty text wins. A field that matches
// nothing is not an error; it simply takes its empty/zero default.
//
// Two things ARE errors, and they fail the whole document:
//   - no informationTable container under any candidate name
//   - any single entry that cannot be decoded (say, a value of "lots")
// We never hand back half a portfolio.
//
// The XML itself is streamed with quick-xml into a tiny owned tree. Tag
// names are kept exactly as written, prefix included, because matching on
// the written prefix is the whole point.
// =============================================================================

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, Span};

use crate::error::{HoldingsError, Result};
use crate::models::HoldingRecord;

/// Namespace prefixes tried after the bare tag name, in priority order.
/// "" is the unprefixed name and always goes first.
pub const TAG_PREFIXES: &[&str] = &["", "ns1", "ns2", "ns3", "ns4", "n1"];

/// The table-level container.
pub const TABLE_TAG: &str = "informationTable";

/// Per-holding entry tags. The first is what most generated fixtures use,
/// the second is what the EDGAR schema actually specifies.
pub const ENTRY_TAGS: &[&str] = &["infoTableEntry", "infoTable"];

const VOTING_TAG: &str = "votingAuthority";

/// Streaming 13F information-table parser.
pub struct FilingParser {
    span: Span,
}

impl FilingParser {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Parse a raw information-table document into holdings, in document
    /// order, with `rank` set to the 1-based position.
    ///
    /// Only base fields are filled. Filing stamps and derived metrics are
    /// someone else's job.
    ///
    /// # Errors
    /// `Parse` if the XML is malformed, the table container is missing, or
    /// any entry has an undecodable field.
    pub fn parse(&self, document: &[u8]) -> Result<Vec<HoldingRecord>> {
        let parsed = read_document(document)?;

        if !parsed.namespaces.is_empty() {
            debug!(
                parent: &self.span,
                namespaces = ?parsed.namespaces,
                "Namespace declarations found in information table"
            );
        }

        let table = find_first_candidate(&parsed.root, TABLE_TAG)
            .ok_or_else(|| HoldingsError::Parse("missing holdings table".to_string()))?;

        let entries = entry_elements(table);
        let mut holdings = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            holdings.push(parse_entry(entry, index)?);
        }

        info!(
            parent: &self.span,
            holdings = holdings.len(),
            bytes = document.len(),
            "Parsed information table"
        );

        Ok(holdings)
    }
}

/// Every `xmlns:prefix="uri"` declaration in the document, in document order.
pub fn declared_namespaces(document: &[u8]) -> Result<Vec<(String, String)>> {
    Ok(read_document(document)?.namespaces)
}

// =============================================================================
// Entry decoding
// =============================================================================

fn parse_entry(entry: &Element, index: usize) -> Result<HoldingRecord> {
    let field = |tag: &str| lookup_text(entry, tag);

    let (sole_voting, shared_voting, no_voting) = match find_first_candidate(entry, VOTING_TAG) {
        Some(voting) => (
            parse_count(lookup_text(voting, "Sole"), "Sole", index)?,
            parse_count(lookup_text(voting, "Shared"), "Shared", index)?,
            parse_count(lookup_text(voting, "None"), "None", index)?,
        ),
        None => (0, 0, 0),
    };

    Ok(HoldingRecord {
        rank: u32::try_from(index + 1).map_err(|_| {
            HoldingsError::Parse(format!("too many entries in information table ({})", index + 1))
        })?,
        name_of_issuer: field("nameOfIssuer").unwrap_or_default(),
        title_of_class: field("titleOfClass").unwrap_or_default(),
        cusip: field("cusip").unwrap_or_default(),
        value: parse_count(field("value"), "value", index)?,
        shares: parse_quantity(field("sshPrnamt"), "sshPrnamt", index)?,
        share_type: field("sshPrnamtType").unwrap_or_default(),
        investment_discretion: field("investmentDiscretion").unwrap_or_default(),
        other_manager: field("otherManager"),
        put_call: field("putCall"),
        sole_voting,
        shared_voting,
        no_voting,
        ..HoldingRecord::default()
    })
}

/// Whole non-negative number. Thousands separators are tolerated, and so is
/// a decimal rendering with nothing after the point ("5000.0").
fn parse_count(raw: Option<String>, field: &str, index: usize) -> Result<u64> {
    let Some(raw) = raw else { return Ok(0) };
    let cleaned = raw.replace(',', "");

    if let Ok(n) = cleaned.parse::<u64>() {
        return Ok(n);
    }
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => Ok(n as u64),
        _ => Err(entry_error(index, field, &raw)),
    }
}

/// Non-negative, possibly fractional, quantity (share or principal amount).
fn parse_quantity(raw: Option<String>, field: &str, index: usize) -> Result<f64> {
    let Some(raw) = raw else { return Ok(0.0) };
    match raw.replace(',', "").parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(entry_error(index, field, &raw)),
    }
}

fn entry_error(index: usize, field: &str, raw: &str) -> HoldingsError {
    HoldingsError::Parse(format!(
        "failed to decode entry {}: invalid {field} {raw:?}",
        index + 1
    ))
}

// =============================================================================
// Tag resolution
// =============================================================================

/// `tag`, `ns1:tag`, `ns2:tag`, ... in TAG_PREFIXES order.
fn candidate_names(tag: &str) -> impl Iterator<Item = String> + '_ {
    TAG_PREFIXES.iter().map(move |prefix| {
        if prefix.is_empty() {
            tag.to_string()
        } else {
            format!("{prefix}:{tag}")
        }
    })
}

/// First descendant matching any candidate name, probed in priority order.
fn find_first_candidate<'a>(scope: &'a Element, tag: &str) -> Option<&'a Element> {
    candidate_names(tag).find_map(|name| scope.find(&name))
}

/// Text of the first candidate whose text is non-empty.
fn lookup_text(scope: &Element, tag: &str) -> Option<String> {
    candidate_names(tag).find_map(|name| {
        scope
            .find(&name)
            .map(|el| el.text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

/// Entries of the table, using the first (entry tag, prefix) combination
/// that yields anything.
fn entry_elements(table: &Element) -> Vec<&Element> {
    for tag in ENTRY_TAGS {
        for name in candidate_names(tag) {
            let mut found = Vec::new();
            table.find_all(&name, &mut found);
            if !found.is_empty() {
                return found;
            }
        }
    }
    Vec::new()
}

// =============================================================================
// Minimal XML tree
// =============================================================================

#[derive(Debug, Default)]
struct Element {
    /// Qualified name as written, e.g. "ns1:cusip".
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Depth-first search of descendants (not `self`).
    fn find(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants named `name`, document order. Does not descend into
    /// a match.
    fn find_all<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            } else {
                child.find_all(name, out);
            }
        }
    }
}

struct ParsedDocument {
    /// Synthetic root; the document element is its only child.
    root: Element,
    namespaces: Vec<(String, String)>,
}

fn read_document(document: &[u8]) -> Result<ParsedDocument> {
    let mut reader = Reader::from_reader(document);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack = vec![Element::default()];
    let mut namespaces = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            HoldingsError::Parse(format!(
                "malformed XML near byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(start) => {
                collect_namespaces(&start, &mut namespaces)?;
                stack.push(Element::named(qualified_name(&start)));
            }
            Event::Empty(start) => {
                collect_namespaces(&start, &mut namespaces)?;
                attach(&mut stack, Element::named(qualified_name(&start)))?;
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(HoldingsError::Parse("unbalanced closing tag".to_string()));
                }
                if let Some(done) = stack.pop() {
                    attach(&mut stack, done)?;
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| HoldingsError::Parse(format!("bad text content: {e}")))?;
                append_text(&mut stack, &text);
            }
            Event::CData(cdata) => {
                let raw = cdata.into_inner();
                append_text(&mut stack, String::from_utf8_lossy(&raw).trim());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(HoldingsError::Parse(format!(
            "document ended with {} unclosed element(s)",
            stack.len() - 1
        )));
    }

    let root = stack.pop().unwrap_or_default();
    Ok(ParsedDocument { root, namespaces })
}

fn qualified_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn collect_namespaces(start: &BytesStart<'_>, out: &mut Vec<(String, String)>) -> Result<()> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| HoldingsError::Parse(format!("bad attribute: {e}")))?;
        if let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") {
            let uri = attr
                .unescape_value()
                .map_err(|e| HoldingsError::Parse(format!("bad namespace URI: {e}")))?;
            out.push((String::from_utf8_lossy(prefix).into_owned(), uri.into_owned()));
        }
    }
    Ok(())
}

fn attach(stack: &mut [Element], element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None => Err(HoldingsError::Parse("element outside of document".to_string())),
    }
}

fn append_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parser() -> FilingParser {
        FilingParser::new(Span::none())
    }

    const APPLE_ONLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <informationTable>
            <infoTableEntry>
                <nameOfIssuer>APPLE INC</nameOfIssuer>
                <titleOfClass>COM</titleOfClass>
                <cusip>037833100</cusip>
                <value>1000000</value>
                <sshPrnamt>5000</sshPrnamt>
                <sshPrnamtType>SH</sshPrnamtType>
                <investmentDiscretion>SOLE</investmentDiscretion>
                <votingAuthority>
                    <Sole>5000</Sole>
                    <Shared>0</Shared>
                    <None>0</None>
                </votingAuthority>
            </infoTableEntry>
        </informationTable>"#;

    const TWO_ENTRIES_PLAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <informationTable xmlns="http://www.sec.gov/edgar/document/thirteenf/informationtable">
            <infoTable>
                <nameOfIssuer>BANK AMER CORP</nameOfIssuer>
                <titleOfClass>COM</titleOfClass>
                <cusip>060505104</cusip>
                <value>34817</value>
                <shrsOrPrnAmt>
                    <sshPrnamt>1032852</sshPrnamt>
                    <sshPrnamtType>SH</sshPrnamtType>
                </shrsOrPrnAmt>
                <investmentDiscretion>DFND</investmentDiscretion>
                <otherManager>4</otherManager>
                <votingAuthority>
                    <Sole>1032852</Sole>
                    <Shared>0</Shared>
                    <None>0</None>
                </votingAuthority>
            </infoTable>
            <infoTable>
                <nameOfIssuer>CHEVRON CORP NEW</nameOfIssuer>
                <titleOfClass>COM</titleOfClass>
                <cusip>166764100</cusip>
                <value>18805</value>
                <shrsOrPrnAmt>
                    <sshPrnamt>126093</sshPrnamt>
                    <sshPrnamtType>SH</sshPrnamtType>
                </shrsOrPrnAmt>
                <putCall>Call</putCall>
                <investmentDiscretion>SOLE</investmentDiscretion>
                <votingAuthority>
                    <Sole>0</Sole>
                    <Shared>126093</Shared>
                    <None>0</None>
                </votingAuthority>
            </infoTable>
        </informationTable>"#;

    /// The same document with every element moved under `ns1:`.
    fn prefixed(plain: &str) -> String {
        let mut out = String::with_capacity(plain.len() * 2);
        let mut chars = plain.chars().peekable();
        while let Some(c) = chars.next() {
            out.push(c);
            if c == '<' {
                match chars.peek() {
                    Some('?') | Some('!') => {}
                    Some('/') => {
                        chars.next();
                        out.push_str("/ns1:");
                    }
                    _ => out.push_str("ns1:"),
                }
            }
        }
        out.replace(" xmlns=", " xmlns:ns1=")
    }

    #[test]
    fn test_single_entry_values_are_exact() {
        let holdings = parser().parse(APPLE_ONLY.as_bytes()).unwrap();
        assert_eq!(holdings.len(), 1);

        let apple = &holdings[0];
        assert_eq!(apple.rank, 1);
        assert_eq!(apple.name_of_issuer, "APPLE INC");
        assert_eq!(apple.cusip, "037833100");
        assert_eq!(apple.cusip.len(), 9);
        assert_eq!(apple.value, 1_000_000);
        assert_eq!(apple.shares, 5000.0);
        assert_eq!(apple.share_type, "SH");
        assert_eq!(apple.investment_discretion, "SOLE");
        assert_eq!(apple.sole_voting, 5000);
        assert_eq!(apple.other_manager, None);
        assert_eq!(apple.put_call, None);
        assert_eq!(apple.filing_date, None);
        assert_eq!(apple.size_category, None);
    }

    #[test]
    fn test_prefix_helper_prefixes_every_tag() {
        let doc = prefixed(TWO_ENTRIES_PLAIN);
        assert!(doc.contains("<ns1:informationTable xmlns:ns1="));
        assert!(doc.contains("<ns1:cusip>060505104</ns1:cusip>"));
        assert!(doc.contains("</ns1:informationTable>"));
        assert!(!doc.contains("<cusip>"));
    }

    #[test]
    fn test_prefixed_and_plain_documents_parse_identically() {
        let plain = parser().parse(TWO_ENTRIES_PLAIN.as_bytes()).unwrap();
        let with_prefix = parser().parse(prefixed(TWO_ENTRIES_PLAIN).as_bytes()).unwrap();

        assert_eq!(plain.len(), 2);
        assert_eq!(plain, with_prefix);
    }

    #[test]
    fn test_nested_share_block_and_optional_fields() {
        let holdings = parser().parse(TWO_ENTRIES_PLAIN.as_bytes()).unwrap();

        assert_eq!(holdings[0].rank, 1);
        assert_eq!(holdings[0].shares, 1_032_852.0);
        assert_eq!(holdings[0].other_manager.as_deref(), Some("4"));
        assert_eq!(holdings[0].put_call, None);

        assert_eq!(holdings[1].rank, 2);
        assert_eq!(holdings[1].name_of_issuer, "CHEVRON CORP NEW");
        assert_eq!(holdings[1].put_call.as_deref(), Some("Call"));
        assert_eq!(holdings[1].shared_voting, 126_093);
    }

    #[test]
    fn test_missing_voting_block_defaults_to_zero() {
        let doc = r#"<informationTable><infoTableEntry>
                <nameOfIssuer>MICROSOFT CORP</nameOfIssuer>
                <cusip>594918104</cusip>
                <value>250</value>
                <sshPrnamt>1000</sshPrnamt>
            </infoTableEntry></informationTable>"#;

        let holdings = parser().parse(doc.as_bytes()).unwrap();
        assert_eq!(holdings[0].sole_voting, 0);
        assert_eq!(holdings[0].shared_voting, 0);
        assert_eq!(holdings[0].no_voting, 0);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let doc = "<informationTable><infoTableEntry><cusip>594918104</cusip></infoTableEntry></informationTable>";
        let holdings = parser().parse(doc.as_bytes()).unwrap();

        assert_eq!(holdings[0].name_of_issuer, "");
        assert_eq!(holdings[0].value, 0);
        assert_eq!(holdings[0].shares, 0.0);
    }

    #[test]
    fn test_missing_table_is_a_parse_error() {
        let err = parser().parse(b"<edgarSubmission><headerData/></edgarSubmission>").unwrap_err();
        assert_eq!(err, HoldingsError::Parse("missing holdings table".to_string()));
    }

    #[test]
    fn test_one_bad_entry_fails_the_whole_document() {
        let doc = r#"<informationTable>
                <infoTableEntry><cusip>037833100</cusip><value>100</value></infoTableEntry>
                <infoTableEntry><cusip>594918104</cusip><value>lots</value></infoTableEntry>
            </informationTable>"#;

        let err = parser().parse(doc.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("entry 2"));
    }

    #[test]
    fn test_negative_shares_are_rejected() {
        let doc = "<informationTable><infoTableEntry><sshPrnamt>-5</sshPrnamt></infoTableEntry></informationTable>";
        assert_eq!(parser().parse(doc.as_bytes()).unwrap_err().kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_malformed_xml_is_a_parse_error() {
        let doc = "<informationTable><infoTableEntry><cusip>037833100</value></infoTableEntry>";
        assert_eq!(parser().parse(doc.as_bytes()).unwrap_err().kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_empty_table_yields_no_holdings() {
        let holdings = parser().parse(b"<informationTable></informationTable>").unwrap();
        assert!(holdings.is_empty());

        let holdings = parser().parse(b"<informationTable/>").unwrap();
        assert!(holdings.is_empty());
    }

    #[test]
    fn test_first_non_empty_candidate_wins() {
        let doc = r#"<informationTable xmlns:ns2="urn:x"><infoTableEntry>
                <value></value>
                <ns2:value>42</ns2:value>
            </infoTableEntry></informationTable>"#;

        let holdings = parser().parse(doc.as_bytes()).unwrap();
        assert_eq!(holdings[0].value, 42);
    }

    #[test]
    fn test_escaped_text_and_cdata() {
        let doc = r#"<informationTable><infoTableEntry>
                <nameOfIssuer>AT&amp;T INC</nameOfIssuer>
                <titleOfClass><![CDATA[COM NEW]]></titleOfClass>
                <value>1,250</value>
            </infoTableEntry></informationTable>"#;

        let holdings = parser().parse(doc.as_bytes()).unwrap();
        assert_eq!(holdings[0].name_of_issuer, "AT&T INC");
        assert_eq!(holdings[0].title_of_class, "COM NEW");
        assert_eq!(holdings[0].value, 1250);
    }

    #[test]
    fn test_declared_namespaces() {
        let doc = r#"<root xmlns:ns1="http://test.com/ns1" xmlns:ns2="http://test.com/ns2">
                <ns1:element>Test</ns1:element>
            </root>"#;

        let namespaces = declared_namespaces(doc.as_bytes()).unwrap();
        assert_eq!(
            namespaces,
            vec![
                ("ns1".to_string(), "http://test.com/ns1".to_string()),
                ("ns2".to_string(), "http://test.com/ns2".to_string()),
            ]
        );
    }
}
