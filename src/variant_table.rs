//! Reader for the validated SV table consumed by clustering
//!
//! The table is tab-delimited with a header row. Required columns are:
//! `id bp1_chr bp1_pos bp1_dir bp2_chr bp2_pos bp2_dir classification support depth gtype1 gtype2`
//!
//! An optional `normal_cn` column gives the local copy number of the normal cell population.
//!

use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::info;
use thousands::Separable;

use crate::errors::{Error, Result};
use crate::variant::{Breakend, BreakendDirection, DEFAULT_NORMAL_COPY_NUMBER, Variant};

const REQUIRED_COLUMNS: [&str; 12] = [
    "id",
    "bp1_chr",
    "bp1_pos",
    "bp1_dir",
    "bp2_chr",
    "bp2_pos",
    "bp2_dir",
    "classification",
    "support",
    "depth",
    "gtype1",
    "gtype2",
];

const NORMAL_CN_COLUMN: &str = "normal_cn";

struct ColumnIndex {
    index: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(headers: &StringRecord) -> Result<Self> {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, x)| (x.to_string(), i))
            .collect::<HashMap<_, _>>();
        for col in REQUIRED_COLUMNS {
            if !index.contains_key(col) {
                return Err(Error::VariantTable {
                    msg: format!("missing required column '{col}'"),
                });
            }
        }
        Ok(Self { index })
    }

    fn get<'a>(&self, record: &'a StringRecord, col: &str) -> Option<&'a str> {
        self.index.get(col).and_then(|&i| record.get(i))
    }
}

/// Parse one record field, reporting missing or unparseable values as data integrity errors
///
fn parse_field<T: FromStr>(
    columns: &ColumnIndex,
    record: &StringRecord,
    col: &str,
    variant_id: &str,
) -> Result<T> {
    let value = columns.get(record, col).unwrap_or("");
    if value.is_empty() {
        return Err(Error::DataIntegrity {
            variant_id: variant_id.to_string(),
            msg: format!("missing value in column '{col}'"),
        });
    }
    value.parse::<T>().map_err(|_| Error::DataIntegrity {
        variant_id: variant_id.to_string(),
        msg: format!("can't parse value '{value}' in column '{col}'"),
    })
}

fn parse_breakend(
    columns: &ColumnIndex,
    record: &StringRecord,
    prefix: &str,
    variant_id: &str,
) -> Result<Breakend> {
    let chrom = parse_field::<String>(columns, record, &format!("{prefix}_chr"), variant_id)?;
    let pos = parse_field::<i64>(columns, record, &format!("{prefix}_pos"), variant_id)?;
    let dir = match columns.get(record, &format!("{prefix}_dir")) {
        Some(x) if !x.is_empty() => {
            BreakendDirection::from_str(x).map_err(|_| Error::DataIntegrity {
                variant_id: variant_id.to_string(),
                msg: format!("invalid breakend direction '{x}', must be '+', '-' or '?'"),
            })?
        }
        _ => BreakendDirection::Unknown,
    };
    Ok(Breakend { chrom, pos, dir })
}

fn parse_variant(
    columns: &ColumnIndex,
    record: &StringRecord,
    line_number: usize,
) -> Result<Variant> {
    let id = match columns.get(record, "id") {
        Some(x) if !x.is_empty() => x.to_string(),
        _ => format!("line{line_number}"),
    };

    let bp1 = parse_breakend(columns, record, "bp1", &id)?;
    let bp2 = parse_breakend(columns, record, "bp2", &id)?;
    let support = parse_field::<u32>(columns, record, "support", &id)?;
    let depth = parse_field::<u32>(columns, record, "depth", &id)?;

    let normal_copy_number = match columns.get(record, NORMAL_CN_COLUMN) {
        Some(x) if !x.is_empty() => parse_field::<f64>(columns, record, NORMAL_CN_COLUMN, &id)?,
        _ => DEFAULT_NORMAL_COPY_NUMBER,
    };

    let text = |col: &str| columns.get(record, col).unwrap_or("").to_string();
    Variant {
        classification: text("classification"),
        gtype1: text("gtype1"),
        gtype2: text("gtype2"),
        id,
        bp1,
        bp2,
        support,
        depth,
        normal_copy_number,
    }
    .validated()
}

/// Parse all variants from a tab-delimited table
///
pub fn parse_variant_table<R: Read>(reader: R) -> Result<Vec<Variant>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .delimiter(b'\t')
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| Error::VariantTable {
        msg: format!("can't parse header: {e}"),
    })?;
    let columns = ColumnIndex::new(headers)?;

    let mut variants = Vec::new();
    for (line_index, result) in rdr.records().enumerate() {
        // Account for the header line
        let line_number = line_index + 2;
        let record = result.map_err(|e| Error::VariantTable {
            msg: format!("can't parse record on line {line_number}: {e}"),
        })?;
        variants.push(parse_variant(&columns, &record, line_number)?);
    }
    Ok(variants)
}

/// Read all variants from a tab-delimited table file
///
pub fn read_variant_table(filename: &Utf8Path) -> Result<Vec<Variant>> {
    info!("Reading variant table from file: '{filename}'");
    let file = std::fs::File::open(filename).map_err(|e| Error::VariantTable {
        msg: format!("can't open file '{filename}': {e}"),
    })?;
    let variants = parse_variant_table(std::io::BufReader::new(file))?;
    info!(
        "Read {} variants from variant table",
        variants.len().separate_with_commas()
    );
    Ok(variants)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id\tbp1_chr\tbp1_pos\tbp1_dir\tbp2_chr\tbp2_pos\tbp2_dir\tclassification\tsupport\tdepth\tgtype1\tgtype2";

    fn table(rows: &[&str]) -> String {
        let mut s = HEADER.to_string();
        for row in rows {
            s.push('\n');
            s.push_str(row);
        }
        s.push('\n');
        s
    }

    #[test]
    fn test_parse_variant_table() {
        let s = table(&[
            "sv1\tchr1\t1000\t+\tchr1\t5000\t-\tDEL\t12\t60\t1,1,1\t2,1,0.6|1,1,0.4",
            "sv2\tchr2\t300\t?\tchr7\t900\t+\tTRX\t5\t40\t1,1,1\t",
        ]);
        let variants = parse_variant_table(s.as_bytes()).unwrap();
        assert_eq!(variants.len(), 2);

        let v = &variants[0];
        assert_eq!(v.id, "sv1");
        assert_eq!(v.bp1.dir, BreakendDirection::Forward);
        assert_eq!(v.bp2.pos, 5000);
        assert_eq!(v.support, 12);
        assert_eq!(v.depth, 60);
        assert_eq!(v.gtype2, "2,1,0.6|1,1,0.4");
        assert_eq!(v.normal_copy_number, DEFAULT_NORMAL_COPY_NUMBER);

        assert_eq!(variants[1].bp2.chrom, "chr7");
        assert!(variants[1].gtype2.is_empty());
    }

    #[test]
    fn test_normal_copy_number_column() {
        let s = format!(
            "{HEADER}\tnormal_cn\nsv1\tchrX\t10\t+\tchrX\t50\t-\tDEL\t4\t30\t1,0,1\t1,0,1\t1\n"
        );
        let variants = parse_variant_table(s.as_bytes()).unwrap();
        assert_eq!(variants[0].normal_copy_number, 1.0);
    }

    #[test]
    fn test_missing_depth() {
        let s = table(&["sv1\tchr1\t1000\t+\tchr1\t5000\t-\tDEL\t12\t\t1,1,1\t1,1,1"]);
        let result = parse_variant_table(s.as_bytes());
        assert!(matches!(result, Err(Error::DataIntegrity { .. })));
    }

    #[test]
    fn test_unparseable_support() {
        let s = table(&["sv1\tchr1\t1000\t+\tchr1\t5000\t-\tDEL\tNA\t60\t1,1,1\t1,1,1"]);
        let result = parse_variant_table(s.as_bytes());
        assert!(matches!(result, Err(Error::DataIntegrity { .. })));
    }

    #[test]
    fn test_support_exceeds_depth() {
        let s = table(&["sv1\tchr1\t1000\t+\tchr1\t5000\t-\tDEL\t70\t60\t1,1,1\t1,1,1"]);
        let result = parse_variant_table(s.as_bytes());
        assert!(matches!(result, Err(Error::DataIntegrity { .. })));
    }

    #[test]
    fn test_missing_column() {
        let s = "id\tbp1_chr\nsv1\tchr1\n";
        let result = parse_variant_table(s.as_bytes());
        assert!(matches!(result, Err(Error::VariantTable { .. })));
    }
}
