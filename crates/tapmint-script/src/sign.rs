//! BIP-341 sighash computation and Schnorr signing.
//!
//! All signatures use the default sighash type, so every signature is a
//! fixed 64-byte witness element. Fee sizing relies on this: a transaction
//! signed in the estimation pass has exactly the size of the final one.

use crate::Error;
use bitcoin::hashes::Hash;
use bitcoin::key::{Keypair, Secp256k1, TapTweak};
use bitcoin::secp256k1::{Message, Signing};
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::taproot::{LeafVersion, Signature, TapLeafHash};
use bitcoin::{Script, TapSighashType, Transaction, TxOut};

/// Signs a script-path spend of `input_index` with the given keypair.
///
/// `prevouts` must list the outputs spent by every input of `tx`, in input
/// order.
pub fn sign_script_spend<C: Signing>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    tapscript: &Script,
    keypair: &Keypair,
) -> Result<Signature, Error> {
    let leaf_hash = TapLeafHash::from_script(tapscript, LeafVersion::TapScript);
    let mut cache = SighashCache::new(tx);
    let sighash = cache.taproot_script_spend_signature_hash(
        input_index,
        &Prevouts::All(prevouts),
        leaf_hash,
        TapSighashType::Default,
    )?;

    let signature = secp.sign_schnorr(&Message::from_digest(sighash.to_byte_array()), keypair);
    Ok(Signature {
        signature,
        sighash_type: TapSighashType::Default,
    })
}

/// Signs a key-path spend of `input_index`, applying the taproot tweak to
/// the keypair first.
pub fn sign_key_spend_input<C: Signing + bitcoin::secp256k1::Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    keypair: &Keypair,
) -> Result<Signature, Error> {
    let mut cache = SighashCache::new(tx);
    let sighash = cache.taproot_key_spend_signature_hash(
        input_index,
        &Prevouts::All(prevouts),
        TapSighashType::Default,
    )?;

    let tweaked = keypair.tap_tweak(secp, None);
    let signature = secp.sign_schnorr(
        &Message::from_digest(sighash.to_byte_array()),
        &tweaked.to_inner(),
    );
    Ok(Signature {
        signature,
        sighash_type: TapSighashType::Default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, Witness};

    fn keypair() -> Keypair {
        let secp = Secp256k1::new();
        Keypair::from_seckey_slice(&secp, &[0x42u8; 32]).unwrap()
    }

    fn dummy_tx() -> (Transaction, Vec<TxOut>) {
        let prevout = TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::new(),
        };
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(900),
                script_pubkey: ScriptBuf::new(),
            }],
        };
        (tx, vec![prevout])
    }

    #[test]
    fn signatures_are_fixed_length() {
        let secp = Secp256k1::new();
        let (tx, prevouts) = dummy_tx();
        let script = ScriptBuf::new();

        let script_sig =
            sign_script_spend(&secp, &tx, 0, &prevouts, &script, &keypair()).unwrap();
        let key_sig = sign_key_spend_input(&secp, &tx, 0, &prevouts, &keypair()).unwrap();

        assert_eq!(script_sig.to_vec().len(), 64);
        assert_eq!(key_sig.to_vec().len(), 64);
    }

    #[test]
    fn signing_is_deterministic_in_size_not_value() {
        let secp = Secp256k1::new();
        let (mut tx, prevouts) = dummy_tx();
        let script = ScriptBuf::new();

        let a = sign_script_spend(&secp, &tx, 0, &prevouts, &script, &keypair()).unwrap();
        tx.output[0].value = Amount::from_sat(800);
        let b = sign_script_spend(&secp, &tx, 0, &prevouts, &script, &keypair()).unwrap();

        assert_eq!(a.to_vec().len(), b.to_vec().len());
        assert_ne!(a.to_vec(), b.to_vec());
    }
}
