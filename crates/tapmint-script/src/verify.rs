//! Optional local script verification.
//!
//! Delegates to the consensus interpreter (`bitcoinconsensus`); the engine
//! invokes it opaquely when the verification flag is set and maps a
//! rejection to a fatal error before anything is broadcast.

use crate::Error;
use bitcoin::consensus::encode::serialize;
use bitcoin::{Transaction, TxOut};

/// Verifies that `tx`'s input at `input_index` satisfies the output it
/// spends, under full consensus rules including taproot.
///
/// `prevouts` must list the outputs spent by every input of `tx`, in input
/// order.
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
) -> Result<(), Error> {
    let spent = prevouts
        .iter()
        .map(|txout| bitcoinconsensus::Utxo {
            script_pubkey: txout.script_pubkey.as_bytes().as_ptr(),
            script_pubkey_len: txout.script_pubkey.len() as u32,
            value: txout.value.to_sat() as i64,
        })
        .collect::<Vec<_>>();

    let spent_output = prevouts
        .get(input_index)
        .ok_or_else(|| Error::Verification(format!("no prevout for input {input_index}")))?;

    bitcoinconsensus::verify_with_flags(
        spent_output.script_pubkey.as_bytes(),
        spent_output.value.to_sat(),
        &serialize(tx),
        Some(&spent),
        input_index,
        bitcoinconsensus::VERIFY_ALL_PRE_TAPROOT | bitcoinconsensus::VERIFY_TAPROOT,
    )
    .map_err(|err| Error::Verification(format!("{err:?}")))
}
