use crate::Error;
use bitcoin::key::Secp256k1;
use bitcoin::taproot::{ControlBlock, LeafVersion, TaprootBuilder};
use bitcoin::{Address, Network, Script, ScriptBuf, XOnlyPublicKey};

/// The BIP-341 "nothing up my sleeve" point. Using it as the internal key
/// makes the key-path spend provably unavailable, so the script path is the
/// only way to spend the output.
const UNSPENDABLE_INTERNAL_KEY: [u8; 32] = [
    0x50, 0x92, 0x9b, 0x74, 0xc1, 0xa0, 0x49, 0x54, 0xb7, 0x8b, 0x4b, 0x60, 0x35, 0xe9, 0x7a,
    0x5e, 0x07, 0x8a, 0x5a, 0x0f, 0x28, 0xec, 0x96, 0xd5, 0x47, 0xbf, 0xee, 0x9a, 0xce, 0x80,
    0x3a, 0xc0,
];

/// A tapscript wrapped into a spendable taproot output.
#[derive(Debug, Clone)]
pub struct TaprootSpend {
    /// The P2TR output script locking the commitment.
    pub output_script: ScriptBuf,
    /// The revealed leaf script.
    pub tapscript: ScriptBuf,
    /// Control block proving the leaf belongs to the output key.
    pub control_block: ControlBlock,
}

impl TaprootSpend {
    /// Wraps a single leaf script into a P2TR output with the unspendable
    /// internal key.
    pub fn wrap(tapscript: ScriptBuf) -> Result<Self, Error> {
        let secp = Secp256k1::verification_only();
        let internal_key = XOnlyPublicKey::from_slice(&UNSPENDABLE_INTERNAL_KEY)
            .expect("the BIP-341 constant is a valid x-only key");

        let spend_info = TaprootBuilder::new()
            .add_leaf(0, tapscript.clone())?
            .finalize(&secp, internal_key)
            .map_err(|_| Error::TaprootFinalize)?;

        let control_block = spend_info
            .control_block(&(tapscript.clone(), LeafVersion::TapScript))
            .ok_or(Error::MissingControlBlock)?;

        Ok(Self {
            output_script: ScriptBuf::new_p2tr_tweaked(spend_info.output_key()),
            tapscript,
            control_block,
        })
    }
}

/// Renders a P2TR output script as an address string for the given network.
pub fn p2tr_address(script: &Script, network: Network) -> Result<String, Error> {
    Address::from_script(script, network)
        .map(|addr| addr.to_string())
        .map_err(|err| Error::Address(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::script::Builder;

    #[test]
    fn wrapped_script_yields_p2tr_output() {
        let leaf = Builder::new()
            .push_slice(*b"leaf")
            .push_opcode(bitcoin::opcodes::all::OP_DROP)
            .push_opcode(bitcoin::opcodes::OP_TRUE)
            .into_script();
        let spend = TaprootSpend::wrap(leaf.clone()).unwrap();

        assert!(spend.output_script.is_p2tr());
        assert_eq!(spend.tapscript, leaf);
    }

    #[test]
    fn wrapping_is_deterministic() {
        let leaf = Builder::new()
            .push_opcode(bitcoin::opcodes::OP_TRUE)
            .into_script();
        let a = TaprootSpend::wrap(leaf.clone()).unwrap();
        let b = TaprootSpend::wrap(leaf).unwrap();
        assert_eq!(a.output_script, b.output_script);
        assert_eq!(a.control_block.serialize(), b.control_block.serialize());
    }

    #[test]
    fn different_leaves_lock_to_different_outputs() {
        let a = TaprootSpend::wrap(
            Builder::new()
                .push_slice(*b"a")
                .push_opcode(bitcoin::opcodes::all::OP_DROP)
                .push_opcode(bitcoin::opcodes::OP_TRUE)
                .into_script(),
        )
        .unwrap();
        let b = TaprootSpend::wrap(
            Builder::new()
                .push_slice(*b"b")
                .push_opcode(bitcoin::opcodes::all::OP_DROP)
                .push_opcode(bitcoin::opcodes::OP_TRUE)
                .into_script(),
        )
        .unwrap();
        assert_ne!(a.output_script, b.output_script);
    }
}
