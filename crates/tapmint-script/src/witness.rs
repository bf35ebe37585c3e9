//! Witness stack assembly.
//!
//! The spending contracts fix the witness layout for every contract input:
//! state-hash pushes (one per carried output, in output order), then the
//! Schnorr signature, then the revealed leaf script, then the control
//! block. The verifying script engine rejects any deviation, so this is the
//! single place the stack is put together.

use bitcoin::hashes::Hash;
use bitcoin::taproot::{ControlBlock, Signature};
use bitcoin::{Script, Witness};
use tapmint_primitives::StateHash;

/// Assembles the witness stack for a contract input spend.
pub fn mint_witness(
    state_hashes: &[StateHash],
    signature: &Signature,
    tapscript: &Script,
    control_block: &ControlBlock,
) -> Witness {
    let mut witness = Witness::new();
    for hash in state_hashes {
        witness.push(hash.as_byte_array());
    }
    witness.push(signature.to_vec());
    witness.push(tapscript.as_bytes());
    witness.push(control_block.serialize());
    witness
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaprootSpend;
    use bitcoin::script::Builder;
    use bitcoin::taproot::Signature;
    use bitcoin::TapSighashType;
    use tapmint_primitives::hash_state;

    #[test]
    fn stack_layout_is_hashes_sig_script_control_block() {
        let hashes = vec![
            hash_state(b"minter").unwrap(),
            hash_state(b"token").unwrap(),
        ];
        let spend = TaprootSpend::wrap(
            Builder::new()
                .push_opcode(bitcoin::opcodes::OP_TRUE)
                .into_script(),
        )
        .unwrap();
        let signature = Signature {
            signature: bitcoin::secp256k1::schnorr::Signature::from_slice(&[1u8; 64]).unwrap(),
            sighash_type: TapSighashType::Default,
        };

        let witness = mint_witness(&hashes, &signature, &spend.tapscript, &spend.control_block);

        assert_eq!(witness.len(), 5);
        let elements: Vec<_> = witness.iter().collect();
        assert_eq!(elements[0], hashes[0].as_byte_array());
        assert_eq!(elements[1], hashes[1].as_byte_array());
        assert_eq!(elements[2].len(), 64);
        assert_eq!(elements[3], spend.tapscript.as_bytes());
        assert_eq!(elements[4], spend.control_block.serialize());
    }
}
