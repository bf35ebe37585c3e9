//! NFT content commit envelope.
//!
//! The commit transaction locks the to-be-minted NFT's content behind a
//! tapscript that checks the owner's signature and then carries the content
//! inside an unexecuted `OP_FALSE OP_IF .. OP_ENDIF` branch: protocol tag,
//! metadata JSON, content type, and the body split into push-sized chunks.

use crate::Error;
use bitcoin::opcodes::all::{OP_ENDIF, OP_IF};
use bitcoin::opcodes::OP_FALSE;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::{ScriptBuf, XOnlyPublicKey};

/// Protocol tag opening the envelope.
const ENVELOPE_TAG: [u8; 7] = *b"tapmint";

/// Maximum size of a single data push inside the envelope.
const MAX_PUSH_SIZE: usize = 520;

/// Builds the content commit tapscript for one NFT.
pub fn commit_script(
    owner: &XOnlyPublicKey,
    metadata: &serde_json::Value,
    content_type: &str,
    content_body: &[u8],
) -> Result<ScriptBuf, Error> {
    let metadata_bytes =
        serde_json::to_vec(metadata).expect("JSON values always serialize");

    let mut builder = Builder::new()
        .push_slice(owner.serialize())
        .push_opcode(bitcoin::opcodes::all::OP_CHECKSIG)
        .push_opcode(OP_FALSE)
        .push_opcode(OP_IF)
        .push_slice(ENVELOPE_TAG);

    builder = push_chunked(builder, &metadata_bytes)?;
    builder = push_chunked(builder, content_type.as_bytes())?;
    builder = push_chunked(builder, content_body)?;

    Ok(builder.push_opcode(OP_ENDIF).into_script())
}

fn push_chunked(mut builder: Builder, data: &[u8]) -> Result<Builder, Error> {
    for chunk in data.chunks(MAX_PUSH_SIZE) {
        let push = PushBytesBuf::try_from(chunk.to_vec())
            .map_err(|_| Error::OversizedPush(chunk.len()))?;
        builder = builder.push_slice(push);
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::script::Instruction;

    fn owner_key() -> XOnlyPublicKey {
        // Generator point x-coordinate, a valid x-only key.
        "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
            .parse()
            .unwrap()
    }

    #[test]
    fn envelope_opens_with_owner_checksig() {
        let script = commit_script(
            &owner_key(),
            &serde_json::json!({ "localId": 0 }),
            "image/png",
            b"pixels",
        )
        .unwrap();

        let mut instructions = script.instructions();
        let first = instructions.next().unwrap().unwrap();
        assert!(matches!(first, Instruction::PushBytes(p) if p.len() == 32));
    }

    #[test]
    fn large_bodies_are_chunked() {
        let body = vec![0xabu8; MAX_PUSH_SIZE * 2 + 10];
        let script = commit_script(
            &owner_key(),
            &serde_json::json!({}),
            "application/octet-stream",
            &body,
        )
        .unwrap();

        let body_chunks = script
            .instructions()
            .filter_map(|ins| match ins.unwrap() {
                Instruction::PushBytes(p) if !p.is_empty() && p.as_bytes()[0] == 0xab => {
                    Some(p.len())
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(body_chunks, vec![MAX_PUSH_SIZE, MAX_PUSH_SIZE, 10]);
    }

    #[test]
    fn distinct_content_commits_differently() {
        let meta = serde_json::json!({ "localId": 1 });
        let a = commit_script(&owner_key(), &meta, "image/png", b"a").unwrap();
        let b = commit_script(&owner_key(), &meta, "image/png", b"b").unwrap();
        assert_ne!(a, b);
    }
}
