//! Purpose: Tokenize raw X12 interchange text into segments and elements.
//! Exports: `Document`, `Segment`, `parse`, delimiter constants.
//! Role: Core transformation; total over all inputs, no schema validation.
//! Invariants: Segment and element order match the input exactly.
//! Invariants: Candidates that trim to the empty string contribute no segment.
//! Invariants: Delimiters are fixed: `~` terminates segments, `*` separates elements.
//! Notes: Schema-invalid content (missing envelope, wrong counts) passes through.

use serde::{Deserialize, Serialize};

pub const SEGMENT_TERMINATOR: char = '~';
pub const ELEMENT_SEPARATOR: char = '*';

/// One full interchange body: an ordered sequence of segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub segments: Vec<Segment>,
}

/// One record within a document: a short identifier plus its data elements.
/// A segment with zero elements is valid (`HL~`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub elements: Vec<String>,
}

/// Splits delimited X12 text into an ordered document.
///
/// Total over all inputs: malformed content is absorbed into best-effort
/// output rather than rejected. Each `~`-terminated candidate is trimmed of
/// surrounding whitespace (line-wrapped interchanges carry `\r\n` between
/// segments); candidates that trim to nothing are dropped. The first
/// `*`-separated field names the segment, the rest become its elements
/// verbatim.
pub fn parse(content: &str) -> Document {
    let mut segments = Vec::new();
    for candidate in content.split(SEGMENT_TERMINATOR) {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        let mut fields = candidate.split(ELEMENT_SEPARATOR);
        let id = fields.next().unwrap_or_default().to_string();
        let elements = fields.map(str::to_string).collect();
        segments.push(Segment { id, elements });
    }
    Document { segments }
}

impl Document {
    /// Renders the document back to delimited text with a trailing `~`.
    ///
    /// No escaping: identifiers or elements containing delimiter characters
    /// will not round-trip.
    pub fn to_delimited(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&segment.id);
            for element in &segment.elements {
                out.push(ELEMENT_SEPARATOR);
                out.push_str(element);
            }
            out.push(SEGMENT_TERMINATOR);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Segment, parse};

    fn segment(id: &str, elements: &[&str]) -> Segment {
        Segment {
            id: id.to_string(),
            elements: elements.iter().map(|value| value.to_string()).collect(),
        }
    }

    #[test]
    fn empty_input_yields_empty_document() {
        assert_eq!(parse(""), Document::default());
    }

    #[test]
    fn splits_segments_and_elements_in_order() {
        let document = parse("ST*850*0001~SE*2*0001~");
        assert_eq!(
            document.segments,
            vec![
                segment("ST", &["850", "0001"]),
                segment("SE", &["2", "0001"]),
            ]
        );
    }

    #[test]
    fn consecutive_terminators_emit_no_extra_segments() {
        let document = parse("ST*1~~SE*2~");
        assert_eq!(
            document.segments,
            vec![segment("ST", &["1"]), segment("SE", &["2"])]
        );
    }

    #[test]
    fn identifier_without_elements_has_empty_element_list() {
        let document = parse("HL~");
        assert_eq!(document.segments, vec![segment("HL", &[])]);
    }

    #[test]
    fn whitespace_only_candidates_are_discarded() {
        assert_eq!(parse("ST*1~   ~SE*2~"), parse("ST*1~SE*2~"));
    }

    #[test]
    fn empty_elements_are_preserved_verbatim() {
        let document = parse("REF**value~N1*ST*~");
        assert_eq!(
            document.segments,
            vec![
                segment("REF", &["", "value"]),
                segment("N1", &["ST", ""]),
            ]
        );
    }

    #[test]
    fn line_wrapped_interchange_parses_with_inner_padding_intact() {
        let content = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *240101*1200*U*00401*000000001*0*P*>~\r\n\
                       GS*PO*SENDER*RECEIVER*20240101*1200*1*X*004010~\r\n\
                       ST*850*0001~\r\n\
                       BEG*00*SA*PO123**20240101~\r\n\
                       SE*2*0001~\r\n\
                       GE*1*1~\r\n\
                       IEA*1*000000001~\r\n";
        let document = parse(content);

        let ids: Vec<&str> = document
            .segments
            .iter()
            .map(|segment| segment.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ISA", "GS", "ST", "BEG", "SE", "GE", "IEA"]);

        let isa = &document.segments[0];
        assert_eq!(isa.elements.len(), 16);
        assert_eq!(isa.elements[1], "          ");
        assert_eq!(isa.elements[5], "SENDER         ");
        assert_eq!(isa.elements[15], ">");
    }

    #[test]
    fn reparsing_rendered_text_preserves_structure() {
        let document = parse("ST*850*0001~BEG*00*SA*PO123**20240101~HL~SE*2*0001~");
        assert_eq!(parse(&document.to_delimited()), document);
    }

    #[test]
    fn segment_order_matches_input_order() {
        let content = (0..20)
            .map(|index| format!("ZZ{index}*{index}~"))
            .collect::<String>();
        let document = parse(&content);
        assert_eq!(document.segments.len(), 20);
        for (index, segment) in document.segments.iter().enumerate() {
            assert_eq!(segment.id, format!("ZZ{index}"));
            assert_eq!(segment.elements, vec![index.to_string()]);
        }
    }

    #[test]
    fn schema_invalid_content_passes_through() {
        // No ISA/IEA envelope, unknown identifiers, odd element counts.
        let document = parse("QQ*1*2*3~???~x~");
        assert_eq!(
            document.segments,
            vec![
                segment("QQ", &["1", "2", "3"]),
                segment("???", &[]),
                segment("x", &[]),
            ]
        );
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let document = parse("ST*850*0001~");
        let value = serde_json::to_value(&document).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "segments": [
                    { "id": "ST", "elements": ["850", "0001"] }
                ]
            })
        );
    }
}
