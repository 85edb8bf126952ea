use std::io::Read;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::warn;

use crate::classify::placement::PlacementRecord;
use crate::classify::species::{RadiusTable, SimilarityRecord};
use crate::core::lineage::Lineage;
use crate::core::taxonomy::Taxonomy;
use crate::core::types::{Domain, GenomeId};
use crate::markers::MarkerHit;
use crate::parsing::ParseError;
use crate::red::calibration::CalibrationTable;
use crate::utils::validation::check_record_limit;

/// A data line: 1-based line number and its tab-separated fields
pub type Row<'a> = (usize, Vec<&'a str>);

/// Read a whole text file, transparently decompressing `.gz` files
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read or decompressed.
pub fn read_text(path: &Path) -> Result<String, ParseError> {
    let is_gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gz {
        let file = std::fs::File::open(path)?;
        let mut text = String::new();
        MultiGzDecoder::new(file).read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Read a file and hand its text to one of the table parsers below
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or whatever the
/// parser returns.
pub fn parse_file<T, F>(path: &Path, parse: F) -> Result<T, ParseError>
where
    F: FnOnce(&str) -> Result<T, ParseError>,
{
    let text = read_text(path)?;
    parse(&text)
}

/// Split table text into data rows.
///
/// Blank and `#` lines are skipped. The first remaining line is dropped as a
/// header when its first field (case-insensitive) is one of `header_keys`.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for rows with fewer than `min_fields`
/// fields, or `ParseError::TooManyRecords` if the row limit is exceeded.
pub fn data_rows<'a>(
    text: &'a str,
    header_keys: &[&str],
    min_fields: usize,
) -> Result<Vec<Row<'a>>, ParseError> {
    let mut rows = Vec::new();
    let mut first_data_line = true;

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').map(str::trim).collect();

        if first_data_line {
            first_data_line = false;
            let first = fields.first().map(|s| s.to_lowercase()).unwrap_or_default();
            if header_keys.contains(&first.as_str()) {
                continue;
            }
        }

        let line_num = i + 1;
        if fields.len() < min_fields {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has fewer than {min_fields} fields"
            )));
        }
        if check_record_limit(rows.len()).is_some() {
            return Err(ParseError::TooManyRecords(rows.len()));
        }
        rows.push((line_num, fields));
    }

    Ok(rows)
}

/// Parse a numeric field, naming the column and line on failure
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if the field is not a number.
pub fn parse_number<T: std::str::FromStr>(
    field: &str,
    column: &str,
    line_num: usize,
) -> Result<T, ParseError> {
    field.parse().map_err(|_| {
        ParseError::InvalidFormat(format!("Invalid {column} on line {line_num}: '{field}'"))
    })
}

/// Parse a reference taxonomy: `genome<TAB>lineage`
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed lines or lineages.
pub fn parse_taxonomy(text: &str) -> Result<Taxonomy, ParseError> {
    let mut taxonomy = Taxonomy::new();
    for (line_num, fields) in data_rows(text, &["genome", "accession", "user_genome"], 2)? {
        let lineage = Lineage::parse(fields[1]).ok_or_else(|| {
            ParseError::InvalidFormat(format!(
                "Invalid lineage on line {line_num}: '{}'",
                fields[1]
            ))
        })?;
        taxonomy.insert(GenomeId::new(fields[0]), lineage);
    }
    Ok(taxonomy)
}

/// Parse species ANI radii: `genome<TAB>radius`
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed lines.
pub fn parse_radii(text: &str) -> Result<RadiusTable, ParseError> {
    let mut radii = RadiusTable::new();
    for (line_num, fields) in data_rows(text, &["genome", "accession", "rep_genome"], 2)? {
        let radius: f64 = parse_number(fields[1], "radius", line_num)?;
        radii.insert(GenomeId::new(fields[0]), radius);
    }
    Ok(radii)
}

/// Parse calibrated RED values: `key<TAB>red`, where the key is a node label
/// or a `leafA|leafB` pair naming the MRCA of two leaves
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed lines.
pub fn parse_calibration(text: &str) -> Result<CalibrationTable, ParseError> {
    let mut table = CalibrationTable::new();
    for (line_num, fields) in data_rows(text, &["key", "node", "taxon"], 2)? {
        let red: f64 = parse_number(fields[1], "RED value", line_num)?;
        table.insert(fields[0], red);
    }
    Ok(table)
}

/// Parse placements: `query<TAB>edge<TAB>distal<TAB>pendant[<TAB>confidence]`
///
/// Lengths are kept as written; range checks happen per query at
/// classification time. A row that names a query but cannot be read becomes
/// a [`PlacementRecord::malformed`] record, so only that query fails. Rows
/// without a query id are skipped with a warning.
///
/// # Errors
///
/// Returns `ParseError::TooManyRecords` if the row limit is exceeded.
pub fn parse_placements(text: &str) -> Result<Vec<PlacementRecord>, ParseError> {
    let mut records = Vec::new();
    for (line_num, fields) in data_rows(text, &["query", "user_genome", "name"], 1)? {
        let query = fields[0];
        if query.is_empty() {
            warn!("Placement on line {line_num} has no query id; skipped");
            continue;
        }
        match placement_row(line_num, &fields) {
            Ok(record) => records.push(record),
            Err(ParseError::InvalidFormat(reason)) => {
                warn!("{query}: {reason}");
                records.push(PlacementRecord::malformed(query, reason));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}

fn placement_row(line_num: usize, fields: &[&str]) -> Result<PlacementRecord, ParseError> {
    if fields.len() < 4 {
        return Err(ParseError::InvalidFormat(format!(
            "Line {line_num} has fewer than 4 fields"
        )));
    }
    let confidence = match fields.get(4) {
        Some(raw) if !raw.is_empty() => Some(parse_number(raw, "confidence", line_num)?),
        _ => None,
    };
    Ok(PlacementRecord {
        query: GenomeId::new(fields[0]),
        edge: parse_number(fields[1], "edge", line_num)?,
        distal_length: parse_number(fields[2], "distal length", line_num)?,
        pendant_length: parse_number(fields[3], "pendant length", line_num)?,
        confidence,
        defect: None,
    })
}

/// Parse similarity results: `query<TAB>reference<TAB>ani<TAB>af`
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed lines.
pub fn parse_similarities(text: &str) -> Result<Vec<SimilarityRecord>, ParseError> {
    data_rows(text, &["query", "user_genome"], 4)?
        .into_iter()
        .map(|(line_num, fields)| {
            Ok(SimilarityRecord {
                query: GenomeId::new(fields[0]),
                reference: GenomeId::new(fields[1]),
                ani: parse_number(fields[2], "ANI", line_num)?,
                af: parse_number(fields[3], "AF", line_num)?,
            })
        })
        .collect()
}

/// Parse marker hits: `genome<TAB>locus<TAB>hmm<TAB>domain<TAB>bitscore<TAB>start<TAB>end`
///
/// A domain of `-` or an empty field means the hit is not tied to a domain.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed lines or unknown domains.
pub fn parse_marker_hits(text: &str) -> Result<Vec<MarkerHit>, ParseError> {
    data_rows(text, &["genome", "user_genome"], 7)?
        .into_iter()
        .map(|(line_num, fields)| {
            let domain = match fields[3] {
                "" | "-" => None,
                raw => Some(Domain::parse(raw).ok_or_else(|| {
                    ParseError::InvalidFormat(format!("Unknown domain on line {line_num}: '{raw}'"))
                })?),
            };
            let start: u64 = parse_number(fields[5], "start", line_num)?;
            let end: u64 = parse_number(fields[6], "end", line_num)?;
            if end < start {
                return Err(ParseError::InvalidFormat(format!(
                    "End before start on line {line_num}"
                )));
            }
            Ok(MarkerHit {
                genome: GenomeId::new(fields[0]),
                locus: fields[1].to_string(),
                hmm_id: fields[2].to_string(),
                domain,
                bit_score: parse_number(fields[4], "bit score", line_num)?,
                start,
                end,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;
    use crate::core::types::Rank;

    #[test]
    fn test_parse_taxonomy() {
        let text = "# reference taxonomy\n\
                    genome\tlineage\n\
                    A\td__Bacteria;p__P1;c__C1;o__O1;f__F1;g__G1;s__G1 alpha\n\
                    B\td__Bacteria;p__P1;c__C1;o__O1;f__F1;g__G1;s__\n";
        let tax = parse_taxonomy(text).unwrap();
        assert_eq!(tax.len(), 2);
        assert_eq!(tax.genus(&GenomeId::new("B")), Some("G1"));
        assert_eq!(tax.get("B").unwrap().deepest_rank(), Some(Rank::Genus));
    }

    #[test]
    fn test_header_is_optional() {
        let tax = parse_taxonomy("A\td__Bacteria\n").unwrap();
        assert_eq!(tax.len(), 1);
    }

    #[test]
    fn test_parse_placements_optional_confidence() {
        let text = "query\tedge\tdistal\tpendant\tconfidence\n\
                    q1\t3\t0.5\t0.5\t0.95\n\
                    q2\t0\t0.1\t0.2\n";
        let records = parse_placements(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].edge, 3);
        assert_eq!(records[0].confidence, Some(0.95));
        assert_eq!(records[1].confidence, None);
    }

    #[test]
    fn test_bad_placement_row_fails_only_its_query() {
        let text = "q1\t3\t0.1\t0.1\n\
                    q2\tNOT_AN_EDGE\t0.1\t0.1\n\
                    q3\t2\t0.1\t0.1\n\
                    q4\t2\t0.1\n\
                    \t2\t0.1\t0.1\n";
        let records = parse_placements(text).unwrap();
        let queries: Vec<&str> = records.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, ["q1", "q2", "q3", "q4"]);

        assert!(!records[0].is_malformed());
        assert!(records[1].defect.as_deref().unwrap().contains("edge on line 2"));
        assert!(!records[2].is_malformed());
        assert!(records[3].defect.as_deref().unwrap().contains("fewer than 4 fields"));
    }

    #[test]
    fn test_parse_marker_hits() {
        let text = "g1\tgene_1\tTIGR00001\tbac120\t120.5\t1\t300\n\
                    g1\tgene_2\tPF00380.14\t-\t80.0\t10\t200\n";
        let hits = parse_marker_hits(text).unwrap();
        assert_eq!(hits[0].domain, Some(Domain::Bacteria));
        assert_eq!(hits[1].domain, None);
        assert!(parse_marker_hits("g1\tgene\tTIGR1\tplants\t1\t1\t2\n").is_err());
        assert!(parse_marker_hits("g1\tgene\tTIGR1\t-\t1\t5\t2\n").is_err());
    }

    #[test]
    fn test_too_few_fields() {
        assert!(matches!(
            parse_similarities("q1\tr1\t97.0\n"),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_read_gzipped_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radii.tsv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"R1\t96.5\nR2\t95.0\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let radii = parse_file(&path, parse_radii).unwrap();
        assert_eq!(radii.get(&GenomeId::new("R1")), Some(96.5));
        assert_eq!(radii.len(), 2);
    }
}
