//! Grammar of the PandA control port.
//!
//! Single line replies are `OK`, `OK =value` or `ERR message`. Multiline replies are a
//! run of `!`-prefixed lines closed by a lone `.`. Tables are written with a `NAME<`
//! header, one decimal word per line and an empty line to finish.

use crate::{Change, Reply, Result, TableFieldLine, WireError, WireValue};

pub const CHANGES_COMMAND: &str = "*CHANGES?";
pub const ERROR_SENTINEL: &str = "(error)";

const MULTILINE_PREFIX: char = '!';
const MULTILINE_END: &str = ".";

/// Parse the raw text of one reply (lines separated by `\n`).
pub fn parse_reply(raw: &str) -> Result<Reply> {
    let mut lines = raw.lines();
    let first = lines
        .next()
        .ok_or_else(|| WireError::Malformed("empty reply".into()))?;

    if first == "OK" {
        return Ok(Reply::Ok);
    }
    if let Some(value) = first.strip_prefix("OK =") {
        return Ok(Reply::Value(value.to_string()));
    }
    if let Some(msg) = first.strip_prefix("ERR") {
        return Err(WireError::Protocol(msg.trim().to_string()));
    }

    let mut out = Vec::new();
    for line in std::iter::once(first).chain(lines) {
        if line == MULTILINE_END {
            return Ok(Reply::Multi(out));
        }
        match line.strip_prefix(MULTILINE_PREFIX) {
            Some(body) => out.push(body.to_string()),
            None => return Err(WireError::Malformed(format!("unexpected line: {line:?}"))),
        }
    }
    Err(WireError::Malformed("multiline reply missing terminator".into()))
}

/// Parse the bodies of a `*CHANGES?` reply.
///
/// `NAME=value` is a scalar change, `NAME (error)` marks the field as in error and
/// `NAME<` says a table changed.
pub fn parse_changes<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Change>> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let line = line.as_ref();
        if let Some((field, value)) = line.split_once('=') {
            out.push(Change::Scalar {
                field: field.to_string(),
                value: WireValue::Text(value.to_string()),
            });
        } else if let Some(field) = line.strip_suffix(ERROR_SENTINEL) {
            out.push(Change::Scalar {
                field: field.trim_end().to_string(),
                value: WireValue::InError,
            });
        } else if let Some(field) = line.strip_suffix('<') {
            out.push(Change::Table {
                field: field.to_string(),
            });
        } else {
            return Err(WireError::Malformed(format!("change line: {line:?}")));
        }
    }
    Ok(out)
}

/// Parse one table layout line, e.g. `63:32 POSITION int`.
pub fn parse_table_field_line(line: &str) -> Result<TableFieldLine> {
    let bad = || WireError::Malformed(format!("table field line: {line:?}"));
    let mut parts = line.split_whitespace();
    let range = parts.next().ok_or_else(bad)?;
    let name = parts.next().ok_or_else(bad)?;
    let subtype = parts.next().ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    let (high, low) = range.split_once(':').ok_or_else(bad)?;
    let bit_high = high.parse::<u32>().map_err(|_| bad())?;
    let bit_low = low.parse::<u32>().map_err(|_| bad())?;
    Ok(TableFieldLine {
        name: name.to_string(),
        bit_low,
        bit_high,
        subtype: subtype.to_string(),
    })
}

/// Parse decimal word lines from a table dump.
pub fn parse_words<S: AsRef<str>>(lines: &[S]) -> Result<Vec<u32>> {
    lines
        .iter()
        .map(|l| {
            let l = l.as_ref().trim();
            l.parse::<u32>()
                .map_err(|_| WireError::Malformed(format!("table word: {l:?}")))
        })
        .collect()
}

pub fn format_get(field: &str) -> String {
    format!("{field}?")
}

pub fn format_put(field: &str, value: &str) -> String {
    format!("{field}={value}")
}

pub fn format_table_put(field: &str, words: &[u32]) -> String {
    let mut out = format!("{field}<\n");
    for w in words {
        out.push_str(&w.to_string());
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_replies() {
        assert_eq!(parse_reply("OK").unwrap(), Reply::Ok);
        assert_eq!(
            parse_reply("OK =Sequencer table of lines").unwrap(),
            Reply::Value("Sequencer table of lines".into())
        );
        assert_eq!(
            parse_reply("ERR No such field").unwrap_err(),
            WireError::Protocol("No such field".into())
        );
    }

    #[test]
    fn test_multiline_reply() {
        let reply = parse_reply("!PCAP 1\n!SEQ 1\n.").unwrap();
        assert_eq!(reply, Reply::Multi(vec!["PCAP 1".into(), "SEQ 1".into()]));
        assert_eq!(parse_reply(".").unwrap(), Reply::Multi(vec![]));
        assert!(matches!(
            parse_reply("!PCAP 1\n!SEQ 1"),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_changes() {
        let lines = [
            "PCAP.TRIG_EDGE=Falling",
            "*METADATA.LABEL_PCAP1=PcapMetadataLabel",
            "PCAP.GATE (error)",
            "SEQ1.TABLE<",
            "PULSE1.WIDTH=",
        ];
        let changes = parse_changes(&lines).unwrap();
        assert_eq!(changes.len(), 5);
        assert_eq!(
            changes[0],
            Change::Scalar {
                field: "PCAP.TRIG_EDGE".into(),
                value: WireValue::Text("Falling".into())
            }
        );
        assert_eq!(changes[1].field(), "*METADATA.LABEL_PCAP1");
        if let Change::Scalar { value, .. } = &changes[2] {
            assert!(value.is_in_error());
            assert_eq!(value.text(), None);
            assert_eq!(value.to_string(), ERROR_SENTINEL);
        }
        assert_eq!(
            changes[2],
            Change::Scalar {
                field: "PCAP.GATE".into(),
                value: WireValue::InError
            }
        );
        assert_eq!(
            changes[3],
            Change::Table {
                field: "SEQ1.TABLE".into()
            }
        );
        assert_eq!(
            changes[4],
            Change::Scalar {
                field: "PULSE1.WIDTH".into(),
                value: WireValue::Text(String::new())
            }
        );
        assert!(parse_changes(&["garbage"]).is_err());
    }

    #[test]
    fn test_table_field_line() {
        let f = parse_table_field_line("19:16 TRIGGER enum").unwrap();
        assert_eq!(f.name, "TRIGGER");
        assert_eq!((f.bit_low, f.bit_high), (16, 19));
        assert_eq!(f.subtype, "enum");
        assert!(parse_table_field_line("19-16 TRIGGER enum").is_err());
        assert!(parse_table_field_line("19:16 TRIGGER").is_err());
    }

    #[test]
    fn test_words_and_table_put() {
        let words = parse_words(&["2457862149", "4294967291"]).unwrap();
        assert_eq!(words, vec![2457862149, 4294967291]);
        assert!(parse_words(&["-1"]).is_err());
        assert_eq!(format_table_put("SEQ1.TABLE", &[1, 2]), "SEQ1.TABLE<\n1\n2\n\n");
        assert_eq!(format_put("PCAP.TRIG_EDGE", "Falling"), "PCAP.TRIG_EDGE=Falling");
        assert_eq!(format_get("SEQ1.TABLE"), "SEQ1.TABLE?");
    }
}
