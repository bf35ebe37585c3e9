//! Parameterized minter tapscripts.
//!
//! A minter output's leaf script commits to the collection's genesis
//! outpoint and issuance parameters, so the script (and therefore the P2TR
//! output) is identical for every minter in the chain: each reveal
//! transaction recreates the successor minter output with the very same
//! locking script it was spent from. All parameters are plain data pushes
//! and can be read back from a revealed witness.

use crate::Error;
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::OP_DROP;
use bitcoin::opcodes::OP_TRUE;
use bitcoin::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::{OutPoint, Script, ScriptBuf, Txid};
use tapmint_primitives::{outpoint_bytes, MinterKind, TokenAddress};

const OPEN_TAG: [u8; 2] = *b"OM";
const CLOSED_TAG: [u8; 2] = *b"CM";
const PARALLEL_CLOSED_TAG: [u8; 2] = *b"PM";

/// Parameters fixed into a minter leaf script at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinterScriptParams {
    Open {
        genesis: OutPoint,
        max: u64,
        premine: u64,
        /// Recorded premine recipient; `None` when the collection has no
        /// premine.
        premine_addr: Option<TokenAddress>,
    },
    Closed {
        issuer: TokenAddress,
        genesis: OutPoint,
        max: u64,
    },
    ParallelClosed {
        issuer: TokenAddress,
        genesis: OutPoint,
        max: u64,
    },
}

impl MinterScriptParams {
    pub fn kind(&self) -> MinterKind {
        match self {
            Self::Open { .. } => MinterKind::Open,
            Self::Closed { .. } => MinterKind::Closed,
            Self::ParallelClosed { .. } => MinterKind::ParallelClosed,
        }
    }
}

/// Builds the minter leaf script for the given parameters.
pub fn minter_script(params: &MinterScriptParams) -> ScriptBuf {
    let (tag, genesis, max) = match params {
        MinterScriptParams::Open { genesis, max, .. } => (OPEN_TAG, genesis, *max),
        MinterScriptParams::Closed { genesis, max, .. } => (CLOSED_TAG, genesis, *max),
        MinterScriptParams::ParallelClosed { genesis, max, .. } => {
            (PARALLEL_CLOSED_TAG, genesis, *max)
        }
    };

    let mut builder = Builder::new()
        .push_slice(tag)
        .push_opcode(OP_DROP)
        .push_slice(outpoint_bytes(genesis))
        .push_opcode(OP_DROP)
        .push_slice(max.to_le_bytes())
        .push_opcode(OP_DROP);

    builder = match params {
        MinterScriptParams::Open {
            premine,
            premine_addr,
            ..
        } => {
            let addr_push = PushBytesBuf::try_from(
                premine_addr.map(|a| a.as_bytes().to_vec()).unwrap_or_default(),
            )
            .expect("20 bytes fit a push");
            builder
                .push_slice(premine.to_le_bytes())
                .push_opcode(OP_DROP)
                .push_slice(addr_push)
                .push_opcode(OP_DROP)
        }
        MinterScriptParams::Closed { issuer, .. }
        | MinterScriptParams::ParallelClosed { issuer, .. } => builder
            .push_slice(*issuer.as_bytes())
            .push_opcode(OP_DROP),
    };

    builder.push_opcode(OP_TRUE).into_script()
}

/// Parameters recovered from a revealed minter leaf script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMinterScript {
    pub kind: MinterKind,
    pub genesis: OutPoint,
    pub max: u64,
    pub premine: u64,
    pub premine_addr: Option<TokenAddress>,
    pub issuer: Option<TokenAddress>,
}

impl ParsedMinterScript {
    /// Reads the parameter pushes back out of a minter leaf script.
    ///
    /// Returns an error if the script does not follow the minter layout;
    /// callers use that to tell minter scripts apart from other witnesses.
    pub fn parse(script: &Script) -> Result<Self, Error> {
        let pushes: Vec<Vec<u8>> = script
            .instructions()
            .filter_map(|ins| match ins {
                Ok(Instruction::PushBytes(p)) => Some(p.as_bytes().to_vec()),
                _ => None,
            })
            .collect();

        let malformed = || Error::Verification("not a minter script".to_string());

        let tag: [u8; 2] = pushes
            .first()
            .and_then(|t| t.as_slice().try_into().ok())
            .ok_or_else(malformed)?;
        let kind = match tag {
            OPEN_TAG => MinterKind::Open,
            CLOSED_TAG => MinterKind::Closed,
            PARALLEL_CLOSED_TAG => MinterKind::ParallelClosed,
            _ => return Err(malformed()),
        };

        let genesis = parse_genesis(pushes.get(1).ok_or_else(malformed)?).ok_or_else(malformed)?;
        let max = parse_u64(pushes.get(2).ok_or_else(malformed)?).ok_or_else(malformed)?;

        match kind {
            MinterKind::Open => {
                let premine =
                    parse_u64(pushes.get(3).ok_or_else(malformed)?).ok_or_else(malformed)?;
                let addr_bytes = pushes.get(4).ok_or_else(malformed)?;
                let premine_addr = if addr_bytes.is_empty() {
                    None
                } else {
                    let bytes: [u8; 20] =
                        addr_bytes.as_slice().try_into().map_err(|_| malformed())?;
                    Some(TokenAddress::from_bytes(bytes))
                };
                Ok(Self {
                    kind,
                    genesis,
                    max,
                    premine,
                    premine_addr,
                    issuer: None,
                })
            }
            MinterKind::Closed | MinterKind::ParallelClosed => {
                let issuer_bytes: [u8; 20] = pushes
                    .get(3)
                    .ok_or_else(malformed)?
                    .as_slice()
                    .try_into()
                    .map_err(|_| malformed())?;
                Ok(Self {
                    kind,
                    genesis,
                    max,
                    premine: 0,
                    premine_addr: None,
                    issuer: Some(TokenAddress::from_bytes(issuer_bytes)),
                })
            }
        }
    }
}

fn parse_genesis(bytes: &[u8]) -> Option<OutPoint> {
    let bytes: &[u8; 36] = bytes.try_into().ok()?;
    let txid = Txid::from_byte_array(bytes[..32].try_into().expect("sliced to 32"));
    let vout = u32::from_le_bytes(bytes[32..].try_into().expect("sliced to 4"));
    Some(OutPoint::new(txid, vout))
}

fn parse_u64(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> OutPoint {
        OutPoint::new(Txid::from_byte_array([9u8; 32]), 0)
    }

    #[test]
    fn open_params_round_trip() {
        let params = MinterScriptParams::Open {
            genesis: genesis(),
            max: 10_000,
            premine: 50,
            premine_addr: Some(TokenAddress::from_bytes([3u8; 20])),
        };
        let script = minter_script(&params);
        let parsed = ParsedMinterScript::parse(&script).unwrap();

        assert_eq!(parsed.kind, MinterKind::Open);
        assert_eq!(parsed.genesis, genesis());
        assert_eq!(parsed.max, 10_000);
        assert_eq!(parsed.premine, 50);
        assert_eq!(parsed.premine_addr, Some(TokenAddress::from_bytes([3u8; 20])));
    }

    #[test]
    fn closed_params_round_trip() {
        let params = MinterScriptParams::Closed {
            issuer: TokenAddress::from_bytes([7u8; 20]),
            genesis: genesis(),
            max: 100,
        };
        let parsed = ParsedMinterScript::parse(&minter_script(&params)).unwrap();
        assert_eq!(parsed.kind, MinterKind::Closed);
        assert_eq!(parsed.issuer, Some(TokenAddress::from_bytes([7u8; 20])));
        assert_eq!(parsed.premine_addr, None);
    }

    #[test]
    fn script_is_stable_across_mints() {
        let params = MinterScriptParams::ParallelClosed {
            issuer: TokenAddress::from_bytes([1u8; 20]),
            genesis: genesis(),
            max: 31,
        };
        assert_eq!(minter_script(&params), minter_script(&params));
    }

    #[test]
    fn foreign_scripts_are_rejected() {
        let script = Builder::new()
            .push_slice(*b"hello world")
            .push_opcode(OP_DROP)
            .push_opcode(OP_TRUE)
            .into_script();
        assert!(ParsedMinterScript::parse(&script).is_err());
    }
}
