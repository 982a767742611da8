//! Encodings of a transfer log.
//!
//! The text format is one transfer per line:
//! `id=1, debit_account_id=1, credit_account_id=3, amount=120, ledger=1, code=1`.
//! The JSON format is an array of [Transfer] objects. Both readers are strict: any
//! malformed record fails the whole load.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use log::info;
use rust_decimal::prelude::*;

use crate::error::LoadgenError;
use crate::transaction::Transfer;

pub trait TransferFormat {
    /// # Errors
    /// Errors when writing to `writer` fails
    fn encode(&self, transfers: &[Transfer], writer: &mut dyn Write) -> Result<(), LoadgenError>;

    /// # Errors
    /// Errors on the first record that cannot be parsed, or when reading fails
    fn decode(&self, reader: &mut dyn BufRead) -> Result<Vec<Transfer>, LoadgenError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextFormat;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonFormat;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    Json,
}

impl Format {
    #[must_use]
    pub fn codec(self) -> &'static dyn TransferFormat {
        match self {
            Format::Text => &TextFormat,
            Format::Json => &JsonFormat,
        }
    }

    /// `.json` files are JSON, anything else is text
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Text,
        }
    }
}

impl TransferFormat for TextFormat {
    fn encode(&self, transfers: &[Transfer], writer: &mut dyn Write) -> Result<(), LoadgenError> {
        for t in transfers {
            writeln!(
                writer,
                "id={}, debit_account_id={}, credit_account_id={}, amount={}, ledger={}, code={}",
                t.id, t.debit_account_id, t.credit_account_id, t.amount, t.ledger, t.code
            )?;
        }
        Ok(())
    }

    fn decode(&self, reader: &mut dyn BufRead) -> Result<Vec<Transfer>, LoadgenError> {
        let mut transfers = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let transfer = parse_line(&line).map_err(|reason| LoadgenError::Parse {
                line: index + 1,
                content: line.clone(),
                reason,
            })?;
            transfers.push(transfer);
        }
        Ok(transfers)
    }
}

impl TransferFormat for JsonFormat {
    fn encode(&self, transfers: &[Transfer], writer: &mut dyn Write) -> Result<(), LoadgenError> {
        serde_json::to_writer_pretty(&mut *writer, transfers)?;
        writeln!(writer)?;
        Ok(())
    }

    fn decode(&self, reader: &mut dyn BufRead) -> Result<Vec<Transfer>, LoadgenError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

fn parse_line(line: &str) -> Result<Transfer, String> {
    let mut id = None;
    let mut debit_account_id = None;
    let mut credit_account_id = None;
    let mut amount = None;
    let mut ledger = None;
    let mut code = None;

    for field in line.trim_end().split(", ") {
        let (key, value) = match field.split_once('=') {
            Some((key, value)) if !value.contains('=') => (key, value),
            _ => return Err(format!("invalid field format: {field}")),
        };
        match key {
            "id" => set_once(&mut id, key, parse_uint(key, value)?)?,
            "debit_account_id" => set_once(&mut debit_account_id, key, parse_uint(key, value)?)?,
            "credit_account_id" => {
                set_once(&mut credit_account_id, key, parse_uint(key, value)?)?;
            }
            "amount" => set_once(&mut amount, key, parse_amount(value)?)?,
            "ledger" => set_once(&mut ledger, key, parse_uint(key, value)?)?,
            "code" => set_once(&mut code, key, parse_uint(key, value)?)?,
            _ => return Err(format!("unknown field: {key}")),
        }
    }

    Ok(Transfer {
        id: required(id, "id")?,
        debit_account_id: required(debit_account_id, "debit_account_id")?,
        credit_account_id: required(credit_account_id, "credit_account_id")?,
        amount: required(amount, "amount")?,
        ledger: required(ledger, "ledger")?,
        code: required(code, "code")?,
    })
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<(), String> {
    if slot.replace(value).is_some() {
        return Err(format!("duplicate field: {key}"));
    }
    Ok(())
}

fn required<T>(slot: Option<T>, key: &str) -> Result<T, String> {
    slot.ok_or_else(|| format!("missing field: {key}"))
}

fn parse_uint<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("error parsing {key} from string: {value}"))
}

/// Whole amounts parse directly. Fractional amounts are rounded half away from zero.
fn parse_amount(value: &str) -> Result<u128, String> {
    if !value.contains('.') {
        return parse_uint("amount", value);
    }
    let decimal = Decimal::from_str(value)
        .map_err(|e| format!("error parsing amount from string: {value}: {e}"))?;
    if decimal.is_sign_negative() {
        return Err(format!("amount must not be negative: {value}"));
    }
    decimal
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u128()
        .ok_or_else(|| format!("amount out of range: {value}"))
}

/// # Errors
/// Errors when the file cannot be created or written
pub fn write_transfers(
    path: impl AsRef<Path>,
    transfers: &[Transfer],
    format: Format,
) -> Result<(), LoadgenError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    format.codec().encode(transfers, &mut writer)?;
    writer.flush()?;
    info!("Wrote {} transfers to {}", transfers.len(), path.display());
    Ok(())
}

/// # Errors
/// Errors when the file cannot be read or any record in it is malformed
pub fn load_transfers(
    path: impl AsRef<Path>,
    format: Format,
) -> Result<Vec<Transfer>, LoadgenError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let transfers = format.codec().decode(&mut reader)?;
    info!("Loaded {} transfers from {}", transfers.len(), path.display());
    Ok(transfers)
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode_text(input: &str) -> Result<Vec<Transfer>, LoadgenError> {
        TextFormat.decode(&mut input.as_bytes())
    }

    fn transfer(id: u128, debit: u128, credit: u128, amount: u128) -> Transfer {
        Transfer {
            id,
            debit_account_id: debit,
            credit_account_id: credit,
            amount,
            ledger: 1,
            code: 1,
        }
    }

    #[test]
    fn test_text_encode() {
        let mut out = Vec::new();
        TextFormat
            .encode(&[transfer(1, 1, 3, 120), transfer(2, 2, 4, 7)], &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id=1, debit_account_id=1, credit_account_id=3, amount=120, ledger=1, code=1\n\
             id=2, debit_account_id=2, credit_account_id=4, amount=7, ledger=1, code=1\n"
        );
    }

    #[test]
    fn test_text_decode_field_order_and_blank_lines() {
        let input = "code=1, ledger=1, amount=5, credit_account_id=2, debit_account_id=1, id=9\n\n\
                     id=10, debit_account_id=2, credit_account_id=1, amount=6, ledger=1, code=1\r\n";
        let transfers = decode_text(input).unwrap();
        assert_eq!(transfers, vec![transfer(9, 1, 2, 5), transfer(10, 2, 1, 6)]);
    }

    #[test]
    fn test_text_decode_fractional_amount() {
        let transfers = decode_text(
            "id=1, debit_account_id=1, credit_account_id=2, amount=2.50, ledger=1, code=1\n\
             id=2, debit_account_id=1, credit_account_id=2, amount=2.49, ledger=1, code=1\n",
        )
        .unwrap();
        assert_eq!(transfers[0].amount, 3);
        assert_eq!(transfers[1].amount, 2);
    }

    #[test]
    fn test_text_decode_malformed_decimal() {
        let line = "id=1, debit_account_id=1, credit_account_id=2, amount=1.2.3, ledger=1, code=1";
        match decode_text(line) {
            Err(LoadgenError::Parse { line: 1, reason, .. }) => {
                assert!(reason.starts_with("error parsing amount from string: 1.2.3: "));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_text_decode_errors() {
        let cases = [
            (
                "id=1, debit_account_id=1, credit_account_id=2, amount=5, ledger=1, code=1, flags=0",
                "unknown field: flags",
            ),
            (
                "id=1, debit_account_id=1, credit_account_id=2, amount=5, ledger=1",
                "missing field: code",
            ),
            (
                "id=1, id=2, debit_account_id=1, credit_account_id=2, amount=5, ledger=1, code=1",
                "duplicate field: id",
            ),
            (
                "id=x, debit_account_id=1, credit_account_id=2, amount=5, ledger=1, code=1",
                "error parsing id from string: x",
            ),
            (
                "id=1, debit_account_id=1, credit_account_id=2, amount=-5.0, ledger=1, code=1",
                "amount must not be negative: -5.0",
            ),
            (
                "id=1,debit_account_id=1, credit_account_id=2, amount=5, ledger=1, code=1",
                "invalid field format: id=1,debit_account_id=1",
            ),
            (
                "id=1, debit_account_id=1, credit_account_id=2, amount=5, ledger=70000, code=1",
                "error parsing ledger from string: 70000",
            ),
        ];
        for (line, expected) in cases {
            let input = format!(
                "id=1, debit_account_id=1, credit_account_id=2, amount=5, ledger=1, code=1\n{line}\n"
            );
            match decode_text(&input) {
                Err(LoadgenError::Parse {
                    line: 2,
                    content,
                    reason,
                }) => {
                    assert_eq!(content, line);
                    assert_eq!(reason, expected);
                }
                other => panic!("expected parse error for {line:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_json_encode_decode() {
        let transfers = vec![transfer(1, 1, 3, 120), transfer(2, 2, 4, 7)];
        let mut out = Vec::new();
        JsonFormat.encode(&transfers, &mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains(r#""amount": "120""#));
        assert!(text.contains(r#""ledger": 1"#));
        let decoded = JsonFormat.decode(&mut out.as_slice()).unwrap();
        assert_eq!(decoded, transfers);
    }

    #[test]
    fn test_json_decode_unknown_field() {
        let input = r#"[{"id":"1","debit_account_id":"1","credit_account_id":"2","amount":"1","ledger":1,"code":1,"timestamp":"0"}]"#;
        assert!(matches!(
            JsonFormat.decode(&mut input.as_bytes()),
            Err(LoadgenError::JsonError(_))
        ));
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(Format::from_path(Path::new("transfers.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("transfers.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("transfers.txt")), Format::Text);
        assert_eq!(Format::from_path(Path::new("transfers")), Format::Text);
    }
}
