//! Single-key signer.
//!
//! Key storage and derivation are outside the engine; this is the minimal
//! signing capability its call sites need: a taproot key-path address for
//! fee and change outputs, the protocol-level token address, and signatures
//! for both key-path and script-path inputs.

use crate::Error;
use bitcoin::key::{Keypair, Secp256k1};
use bitcoin::secp256k1::All;
use bitcoin::{Address, Network, PrivateKey, ScriptBuf, Transaction, TxOut, Witness, XOnlyPublicKey};
use tapmint_primitives::TokenAddress;
use tapmint_script::sign_key_spend_input;

pub struct Wallet {
    secp: Secp256k1<All>,
    keypair: Keypair,
    network: Network,
}

impl Wallet {
    pub fn new(keypair: Keypair, network: Network) -> Self {
        Self {
            secp: Secp256k1::new(),
            keypair,
            network,
        }
    }

    /// Imports a WIF-encoded private key.
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, Error> {
        let key = PrivateKey::from_wif(wif)
            .map_err(|err| Error::Wallet(format!("invalid wallet key: {err}")))?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &key.inner);
        Ok(Self {
            secp,
            keypair,
            network,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn xonly_public_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    /// The protocol-level owner identifier of this wallet.
    pub fn token_address(&self) -> TokenAddress {
        TokenAddress::from_xonly(&self.xonly_public_key())
    }

    /// Key-path taproot address receiving fee UTXOs and change.
    pub fn address(&self) -> Address {
        Address::p2tr(&self.secp, self.xonly_public_key(), None, self.network)
    }

    /// Locking script of [`Wallet::address`].
    pub fn change_script(&self) -> ScriptBuf {
        self.address().script_pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Signs every input of `tx` whose prevout pays this wallet's key-path
    /// address, filling in the single-element key-spend witness.
    ///
    /// `prevouts` must list the outputs spent by every input, in input
    /// order. Inputs locked by other scripts are left untouched.
    pub fn sign_own_inputs(
        &self,
        tx: &mut Transaction,
        prevouts: &[TxOut],
    ) -> Result<(), Error> {
        let own_script = self.change_script();
        let own_inputs = prevouts
            .iter()
            .enumerate()
            .filter(|(_, prevout)| prevout.script_pubkey == own_script)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        for index in own_inputs {
            let signature =
                sign_key_spend_input(&self.secp, tx, index, prevouts, &self.keypair)?;
            tx.input[index].witness = Witness::p2tr_key_spend(&signature);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, Sequence, TxIn};

    pub(crate) fn test_wallet() -> Wallet {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, &[0x37u8; 32]).unwrap();
        Wallet::new(keypair, Network::Regtest)
    }

    #[test]
    fn address_is_key_path_taproot() {
        let wallet = test_wallet();
        assert!(wallet.change_script().is_p2tr());
    }

    #[test]
    fn signs_only_own_inputs() {
        let wallet = test_wallet();
        let foreign_script = ScriptBuf::from_bytes(vec![0x51]);
        let prevouts = vec![
            TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: wallet.change_script(),
            },
            TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: foreign_script,
            },
        ];
        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![
                TxIn {
                    previous_output: OutPoint::null(),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                },
                TxIn {
                    previous_output: OutPoint::null(),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                },
            ],
            output: vec![],
        };

        wallet.sign_own_inputs(&mut tx, &prevouts).unwrap();

        assert_eq!(tx.input[0].witness.len(), 1);
        assert_eq!(tx.input[0].witness.iter().next().unwrap().len(), 64);
        assert!(tx.input[1].witness.is_empty());
    }
}
