//! Outpoint string and byte codecs.
//!
//! Collections are identified by their genesis outpoint rendered as
//! `<txid>_<vout>`; contract parameters embed the same outpoint as 36 raw
//! bytes (txid in consensus byte order followed by the little-endian output
//! index).

use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Txid};

/// Failure to parse an `<txid>_<vout>` outpoint string.
#[derive(Debug, thiserror::Error)]
pub enum OutpointParseError {
    #[error("Expected `<txid>_<vout>`, got {0:?}")]
    MalformedOutpoint(String),
    #[error("Invalid txid: {0}")]
    InvalidTxid(#[from] bitcoin::hashes::hex::HexToArrayError),
    #[error("Invalid output index: {0}")]
    InvalidVout(#[from] std::num::ParseIntError),
}

/// Parses an `<txid>_<vout>` identifier into an [`OutPoint`].
pub fn parse_outpoint(s: &str) -> Result<OutPoint, OutpointParseError> {
    let (txid, vout) = s
        .split_once('_')
        .ok_or_else(|| OutpointParseError::MalformedOutpoint(s.to_string()))?;
    let txid: Txid = txid.parse()?;
    let vout: u32 = vout.parse()?;
    Ok(OutPoint::new(txid, vout))
}

/// Renders an [`OutPoint`] as the `<txid>_<vout>` identifier form.
pub fn format_outpoint(outpoint: &OutPoint) -> String {
    format!("{}_{}", outpoint.txid, outpoint.vout)
}

/// Serializes an outpoint as the 36-byte form embedded in contract
/// parameters.
pub fn outpoint_bytes(outpoint: &OutPoint) -> [u8; 36] {
    let mut bytes = [0u8; 36];
    bytes[..32].copy_from_slice(outpoint.txid.as_byte_array());
    bytes[32..].copy_from_slice(&outpoint.vout.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outpoint_string_round_trip() {
        let s = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b_1";
        let outpoint = parse_outpoint(s).unwrap();
        assert_eq!(outpoint.vout, 1);
        assert_eq!(format_outpoint(&outpoint), s);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(matches!(
            parse_outpoint("deadbeef"),
            Err(OutpointParseError::MalformedOutpoint(_))
        ));
        assert!(parse_outpoint("zz_0").is_err());
        assert!(parse_outpoint(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b_x"
        )
        .is_err());
    }

    #[test]
    fn byte_form_embeds_vout_little_endian() {
        let outpoint = parse_outpoint(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b_258",
        )
        .unwrap();
        let bytes = outpoint_bytes(&outpoint);
        assert_eq!(&bytes[32..], &[2, 1, 0, 0]);
    }
}
