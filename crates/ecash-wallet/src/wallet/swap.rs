//! Swap engine
//!
//! The shared machinery of send and receive: plan outputs, post the swap
//! and unblind the reply in planning order, so the first outputs of the
//! plan come back as the first proofs.

use ecash::dhke::construct_proofs;
use ecash::nuts::{KeySet, PreMintSecrets, Proofs, SwapRequest};
use ecash::{Amount, MintUrl};

use super::Wallet;
use crate::error::Error;

/// A planned swap with its retained secrets
#[derive(Debug)]
pub(crate) struct PreSwap {
    /// Secrets and blinding factors, in planning order
    pub premint: PreMintSecrets,
    /// The request to post
    pub request: SwapRequest,
    /// How many leading outputs belong to the send part of the plan
    pub send_count: usize,
}

/// Fail unless the keyset carries a key for every planned denomination
pub(crate) fn ensure_denomination_keys(keyset: &KeySet, parts: &[Amount]) -> Result<(), Error> {
    for amount in parts {
        if keyset.keys.amount_key(*amount).is_none() {
            return Err(Error::Protocol(format!(
                "Keyset {} has no key for denomination {amount}",
                keyset.id
            )));
        }
    }
    Ok(())
}

impl Wallet {
    /// Plan a swap of `inputs` into a send part and a change part
    ///
    /// Send outputs are planned first; the order is preserved through
    /// blind and unblind so the proofs can be split again afterwards.
    pub(crate) fn plan_swap(
        keyset: &KeySet,
        inputs: Proofs,
        send_amount: Amount,
        change_amount: Amount,
    ) -> Result<PreSwap, Error> {
        ensure_denomination_keys(keyset, &send_amount.split())?;
        ensure_denomination_keys(keyset, &change_amount.split())?;

        let mut premint = PreMintSecrets::random(keyset.id.clone(), send_amount)?;
        let send_count = premint.len();
        premint.combine(PreMintSecrets::random(keyset.id.clone(), change_amount)?);

        let request = SwapRequest::new(inputs, premint.blinded_messages());

        Ok(PreSwap {
            premint,
            request,
            send_count,
        })
    }

    /// Post a planned swap and unblind the reply
    pub(crate) async fn execute_swap(
        &self,
        mint_url: &MintUrl,
        keyset: &KeySet,
        pre_swap: &PreSwap,
    ) -> Result<Proofs, Error> {
        let response = self
            .connector
            .post_swap(mint_url, pre_swap.request.clone())
            .await?;

        Ok(construct_proofs(
            response.signatures,
            &pre_swap.premint,
            &keyset.keys,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use ecash::nuts::{Keys, KeysetId, SecretKey};

    use super::*;

    fn keyset(max_bit: u32) -> KeySet {
        KeySet {
            id: KeysetId::new("00ad268c4d1f5826"),
            keys: Keys::new(
                (0..max_bit)
                    .map(|bit| {
                        (
                            Amount::from(1u64 << bit),
                            SecretKey::generate().public_key(),
                        )
                    })
                    .collect(),
            ),
            input_fee_ppk: 0,
        }
    }

    #[test]
    fn test_plan_orders_send_before_change() {
        let keyset = keyset(8);

        let pre_swap =
            Wallet::plan_swap(&keyset, vec![], Amount::from(50), Amount::from(14)).unwrap();

        assert_eq!(pre_swap.send_count, 3);
        let amounts: Vec<u64> = pre_swap
            .request
            .outputs
            .iter()
            .map(|output| output.amount.into())
            .collect();
        // Send split first, change split after
        assert_eq!(amounts, vec![2, 16, 32, 2, 4, 8]);

        // The retained secrets line up with the posted outputs
        let planned: Vec<_> = pre_swap
            .premint
            .iter()
            .map(|pre| pre.blinded_message.clone())
            .collect();
        assert_eq!(planned, pre_swap.request.outputs);
    }

    #[test]
    fn test_plan_rejects_missing_denomination() {
        // Keyset only goes up to 8
        let keyset = keyset(4);

        let err = Wallet::plan_swap(&keyset, vec![], Amount::from(50), Amount::ZERO).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
