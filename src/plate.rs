// src/plate.rs
//
// Bhutan plate grammar: PREFIX-REGION-NUMBER, e.g. BP-1-A1111.
//
//   PREFIX  two letters, encodes the vehicle type (BP private, BT taxi, BG electric)
//   REGION  one digit, encodes the registration region
//   NUMBER  alphanumeric serial
//
// The OCR stage frequently reads letters in the prefix as look-alike digits,
// so the prefix gets a digit→letter correction before lookup. The region digit
// and serial are left untouched.

use crate::types::Enrichment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateInfo {
    /// Canonical `PREFIX-REGION-NUMBER` text
    pub text: String,
    pub prefix: String,
    pub region_code: char,
    pub number: String,
    pub vehicle_type: Option<&'static str>,
    pub region_name: Option<&'static str>,
}

impl PlateInfo {
    pub fn to_enrichment(&self) -> Enrichment {
        Enrichment {
            plate: Some(self.text.clone()),
            vehicle_type: self.vehicle_type.map(str::to_string),
            region_name: self.region_name.map(str::to_string),
        }
    }
}

fn correct_ocr_letter(c: char) -> char {
    match c {
        '0' => 'O',
        '1' => 'I',
        '6' => 'G',
        '8' => 'B',
        other => other,
    }
}

pub fn vehicle_type_for_prefix(prefix: &str) -> Option<&'static str> {
    match prefix {
        "BP" => Some("Private"),
        "BT" => Some("Taxi"),
        "BG" => Some("Electric"),
        _ => None,
    }
}

pub fn region_name_for_code(code: char) -> Option<&'static str> {
    match code {
        '1' => Some("Western"),
        '2' => Some("South-West"),
        '3' => Some("Central"),
        '4' => Some("Eastern"),
        _ => None,
    }
}

/// Parse raw OCR text into a plate. Returns `None` if no
/// `PREFIX-REGION-NUMBER` pattern can be found anywhere in the text.
pub fn parse_plate(raw: &str) -> Option<PlateInfo> {
    let cleaned: Vec<char> = raw
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    (0..cleaned.len()).find_map(|start| match_at(&cleaned, start))
}

fn match_at(chars: &[char], start: usize) -> Option<PlateInfo> {
    let mut i = start;

    let first = correct_ocr_letter(*chars.get(i)?);
    let second = correct_ocr_letter(*chars.get(i + 1)?);
    if !first.is_ascii_uppercase() || !second.is_ascii_uppercase() {
        return None;
    }
    i += 2;

    if chars.get(i) == Some(&'-') {
        i += 1;
    }
    let region_code = *chars.get(i)?;
    if !region_code.is_ascii_digit() {
        return None;
    }
    i += 1;

    if chars.get(i) == Some(&'-') {
        i += 1;
    }
    let number: String = chars[i.min(chars.len())..]
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if number.is_empty() {
        return None;
    }

    let prefix: String = [first, second].iter().collect();
    Some(PlateInfo {
        text: format!("{}-{}-{}", prefix, region_code, number),
        vehicle_type: vehicle_type_for_prefix(&prefix),
        region_name: region_name_for_code(region_code),
        prefix,
        region_code,
        number,
    })
}

pub fn enrichment_from_plate(raw: &str) -> Option<Enrichment> {
    parse_plate(raw).map(|p| p.to_enrichment())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_plate() {
        let p = parse_plate("BP-1-A1111").unwrap();
        assert_eq!(p.text, "BP-1-A1111");
        assert_eq!(p.prefix, "BP");
        assert_eq!(p.region_code, '1');
        assert_eq!(p.number, "A1111");
        assert_eq!(p.vehicle_type, Some("Private"));
        assert_eq!(p.region_name, Some("Western"));
    }

    #[test]
    fn test_parse_without_dashes_and_noise() {
        let p = parse_plate(" bt3 b2045 ").unwrap();
        assert_eq!(p.text, "BT-3-B2045");
        assert_eq!(p.vehicle_type, Some("Taxi"));
        assert_eq!(p.region_name, Some("Central"));
    }

    #[test]
    fn test_prefix_ocr_correction_only_touches_prefix() {
        // "8G" is OCR for "BG"; the region digit must stay a digit
        let p = parse_plate("8G-4-1234").unwrap();
        assert_eq!(p.text, "BG-4-1234");
        assert_eq!(p.vehicle_type, Some("Electric"));
        assert_eq!(p.region_name, Some("Eastern"));
    }

    #[test]
    fn test_unknown_prefix_keeps_plate_without_type() {
        let e = enrichment_from_plate("XY-9-77").unwrap();
        assert_eq!(e.plate.as_deref(), Some("XY-9-77"));
        assert!(e.vehicle_type.is_none());
        assert!(e.region_name.is_none());
    }

    #[test]
    fn test_rejects_text_without_plate_pattern() {
        assert!(parse_plate("").is_none());
        assert!(parse_plate("---").is_none());
        assert!(parse_plate("BP-").is_none());
        assert!(parse_plate("BPX").is_none());
    }
}
