//! A scripted in-process mint
//!
//! Implements [`MintConnector`] with a real secp256k1 keyset, so the
//! engine's blinding round-trips against genuine signatures. Quote
//! payment, lightning fees and the "outputs already signed" failure are
//! scripted per test.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ecash::derivation::derive_restore_secrets;
use ecash::dhke::{blind_message, hash_to_curve, sign_message, verify_message};
use ecash::nuts::{
    BlindSignature, BlindedMessage, CheckStateRequest, CheckStateResponse, KeySet, KeySetInfo,
    Keys, KeysetId, KeysetResponse, MeltBolt11Request, MeltBolt11Response,
    MeltQuoteBolt11Request, MeltQuoteBolt11Response, MintBolt11Request, MintBolt11Response,
    MintInfo, MintQuoteBolt11Request, MintQuoteBolt11Response, ProofState, Proofs, PublicKey,
    RestoreRequest, RestoreResponse, SecretKey, State, SwapRequest, SwapResponse,
    fee_for_inputs,
};
use ecash::{Amount, MintUrl};
use ecash_wallet::error::{Error, ErrorCode, ErrorResponse};
use ecash_wallet::MintConnector;

pub const MINT_URL: &str = "https://mint.example";

fn mint_error(code: ErrorCode, message: &str) -> Error {
    Error::Mint(ErrorResponse {
        code,
        error: Some(message.to_string()),
        detail: None,
    })
}

#[derive(Debug, Default)]
struct MintState {
    next_quote: u32,
    mint_quotes: HashMap<String, Amount>,
    melt_quotes: HashMap<String, Amount>,
    /// Signature log: every blinded point ever signed, by `B_`
    signed: HashMap<PublicKey, BlindSignature>,
    /// Spent proofs by `Y`
    spent: HashSet<PublicKey>,
    /// When set, the next mint execute signs but reports code 10002
    zombie_next_mint: bool,
    /// Sats the lightning network eats out of melt change
    lightning_fee: u64,
    fee_reserve: u64,
}

#[derive(Debug)]
pub struct FakeMint {
    keyset_id: KeysetId,
    secret_keys: BTreeMap<Amount, SecretKey>,
    keys: Keys,
    input_fee_ppk: u64,
    state: Mutex<MintState>,
}

impl FakeMint {
    pub fn new(input_fee_ppk: u64) -> Self {
        let keyset_id = KeysetId::new("00fade2abc154875");
        let secret_keys: BTreeMap<Amount, SecretKey> = (0..14)
            .map(|bit| (Amount::from(1u64 << bit), SecretKey::generate()))
            .collect();
        let keys = Keys::new(
            secret_keys
                .iter()
                .map(|(amount, key)| (*amount, key.public_key()))
                .collect(),
        );

        Self {
            keyset_id,
            secret_keys,
            keys,
            input_fee_ppk,
            state: Mutex::new(MintState::default()),
        }
    }

    pub fn url() -> MintUrl {
        MintUrl::new(MINT_URL)
    }

    /// Make the next mint execute fail with "outputs already signed"
    /// after recording the signatures, simulating a lost response
    pub fn fail_next_mint_execute(&self) {
        self.lock().zombie_next_mint = true;
    }

    pub fn set_lightning_fee(&self, sats: u64) {
        self.lock().lightning_fee = sats;
    }

    pub fn set_fee_reserve(&self, sats: u64) {
        self.lock().fee_reserve = sats;
    }

    /// Seed the signature log as if a wallet with `seed` had minted the
    /// given (derivation index, amount) outputs in a previous life
    pub fn seed_restore_signatures(&self, seed: &[u8], issued: &[(u32, u64)]) {
        for (index, amount) in issued {
            let (secret, r) = derive_restore_secrets(seed, &self.keyset_id, *index);
            let (blinded, _) = blind_message(secret.as_bytes(), Some(r)).unwrap();
            self.sign_output(Amount::from(*amount), blinded);
        }
    }

    /// Mark a previously seeded derivation as spent at the mint
    pub fn mark_restore_seed_spent(&self, seed: &[u8], index: u32) {
        let (secret, _) = derive_restore_secrets(seed, &self.keyset_id, index);
        let y = hash_to_curve(secret.as_bytes()).unwrap();
        self.lock().spent.insert(y);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MintState> {
        self.state.lock().expect("mint state lock")
    }

    fn sign_output(&self, amount: Amount, blinded_secret: PublicKey) -> BlindSignature {
        let k = self
            .secret_keys
            .get(&amount)
            .unwrap_or_else(|| panic!("no mint key for {amount}"));
        let c = sign_message(k, &blinded_secret).unwrap();
        let signature = BlindSignature {
            amount,
            keyset_id: self.keyset_id.clone(),
            c,
        };
        self.lock().signed.insert(blinded_secret, signature.clone());
        signature
    }

    fn sign_outputs(&self, outputs: &[BlindedMessage]) -> Vec<BlindSignature> {
        outputs
            .iter()
            .map(|output| self.sign_output(output.amount, output.blinded_secret))
            .collect()
    }

    /// Verify proofs and mark them spent; errors if any is a double spend
    fn spend_inputs(&self, inputs: &Proofs) -> Result<(), Error> {
        let mut ys = Vec::with_capacity(inputs.len());
        for proof in inputs {
            let k = self
                .secret_keys
                .get(&proof.amount)
                .ok_or_else(|| mint_error(ErrorCode::KeysetNotFound, "unknown amount"))?;
            verify_message(k, proof.c, proof.secret.as_bytes())
                .map_err(|_| mint_error(ErrorCode::Unknown(10003), "invalid proof"))?;
            ys.push(hash_to_curve(proof.secret.as_bytes()).unwrap());
        }

        let mut state = self.lock();
        if ys.iter().any(|y| state.spent.contains(y)) {
            return Err(mint_error(ErrorCode::TokenAlreadySpent, "token already spent"));
        }
        state.spent.extend(ys);
        Ok(())
    }
}

#[async_trait]
impl MintConnector for FakeMint {
    async fn get_mint_info(&self, _mint_url: &MintUrl) -> Result<MintInfo, Error> {
        Ok(MintInfo {
            name: Some("fake mint".to_string()),
            ..Default::default()
        })
    }

    async fn get_keys(&self, _mint_url: &MintUrl) -> Result<Vec<KeySet>, Error> {
        Ok(vec![KeySet {
            id: self.keyset_id.clone(),
            keys: self.keys.clone(),
            input_fee_ppk: self.input_fee_ppk,
        }])
    }

    async fn get_keyset_keys(
        &self,
        mint_url: &MintUrl,
        keyset_id: &KeysetId,
    ) -> Result<KeySet, Error> {
        if keyset_id != &self.keyset_id {
            return Err(mint_error(ErrorCode::KeysetNotFound, "unknown keyset"));
        }
        Ok(self.get_keys(mint_url).await?.remove(0))
    }

    async fn get_keyset_ids(&self, _mint_url: &MintUrl) -> Result<KeysetResponse, Error> {
        Ok(KeysetResponse {
            keysets: vec![KeySetInfo {
                id: self.keyset_id.clone(),
                active: true,
                input_fee_ppk: self.input_fee_ppk,
            }],
        })
    }

    async fn post_mint_quote(
        &self,
        _mint_url: &MintUrl,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let mut state = self.lock();
        state.next_quote += 1;
        let quote = format!("quote-{}", state.next_quote);
        state.mint_quotes.insert(quote.clone(), request.amount);

        Ok(MintQuoteBolt11Response {
            quote,
            request: format!("lnbc{}n1fake", u64::from(request.amount)),
            paid: false,
            expiry: None,
        })
    }

    async fn get_mint_quote_status(
        &self,
        _mint_url: &MintUrl,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let state = self.lock();
        let amount = state
            .mint_quotes
            .get(quote_id)
            .ok_or_else(|| mint_error(ErrorCode::Unknown(20008), "unknown quote"))?;

        // The invoice settles as soon as anyone asks
        Ok(MintQuoteBolt11Response {
            quote: quote_id.to_string(),
            request: format!("lnbc{}n1fake", u64::from(*amount)),
            paid: true,
            expiry: None,
        })
    }

    async fn post_mint(
        &self,
        _mint_url: &MintUrl,
        request: MintBolt11Request,
    ) -> Result<MintBolt11Response, Error> {
        let quote_amount = {
            let state = self.lock();
            *state
                .mint_quotes
                .get(&request.quote)
                .ok_or_else(|| mint_error(ErrorCode::Unknown(20008), "unknown quote"))?
        };

        let requested = Amount::try_sum(request.outputs.iter().map(|o| o.amount)).unwrap();
        if requested != quote_amount {
            return Err(mint_error(
                ErrorCode::TransactionUnbalanced,
                "outputs do not match quote amount",
            ));
        }

        let signatures = self.sign_outputs(&request.outputs);

        if std::mem::take(&mut self.lock().zombie_next_mint) {
            // Signed, but the response "gets lost": the wallet only sees
            // the already-signed error and must recover via /restore
            return Err(mint_error(
                ErrorCode::BlindedMessageAlreadySigned,
                "outputs have already been signed before",
            ));
        }

        Ok(MintBolt11Response { signatures })
    }

    async fn post_melt_quote(
        &self,
        _mint_url: &MintUrl,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        // Scripted invoices look like "fakeinvoice:<amount>"
        let amount: u64 = request
            .request
            .strip_prefix("fakeinvoice:")
            .and_then(|rest| rest.parse().ok())
            .ok_or_else(|| mint_error(ErrorCode::Unknown(20009), "bad invoice"))?;

        let mut state = self.lock();
        state.next_quote += 1;
        let quote = format!("melt-{}", state.next_quote);
        state.melt_quotes.insert(quote.clone(), Amount::from(amount));

        Ok(MeltQuoteBolt11Response {
            quote,
            amount: Amount::from(amount),
            fee_reserve: Amount::from(state.fee_reserve),
            paid: false,
            expiry: None,
        })
    }

    async fn post_melt(
        &self,
        _mint_url: &MintUrl,
        request: MeltBolt11Request,
    ) -> Result<MeltBolt11Response, Error> {
        let (amount, lightning_fee) = {
            let state = self.lock();
            let amount = *state
                .melt_quotes
                .get(&request.quote)
                .ok_or_else(|| mint_error(ErrorCode::Unknown(20008), "unknown quote"))?;
            (amount, state.lightning_fee)
        };

        self.spend_inputs(&request.inputs)?;

        let inputs_total: Amount = request.inputs.iter().map(|p| p.amount).sum();
        let mut owed = u64::from(inputs_total) - u64::from(amount) - lightning_fee;

        // Sign the subset of the offered change outputs summing to what
        // is owed, largest denominations first
        let mut change = Vec::new();
        if let Some(outputs) = request.outputs {
            let mut outputs = outputs;
            outputs.sort_by(|a, b| b.amount.cmp(&a.amount));
            for output in outputs {
                if u64::from(output.amount) <= owed {
                    owed -= u64::from(output.amount);
                    change.push(self.sign_output(output.amount, output.blinded_secret));
                }
            }
        }

        Ok(MeltBolt11Response {
            paid: true,
            payment_preimage: Some("00".repeat(32)),
            change: Some(change),
        })
    }

    async fn post_swap(
        &self,
        _mint_url: &MintUrl,
        request: SwapRequest,
    ) -> Result<SwapResponse, Error> {
        let inputs_total: Amount = request.inputs.iter().map(|p| p.amount).sum();
        let outputs_total = Amount::try_sum(request.outputs.iter().map(|o| o.amount)).unwrap();
        let fee = fee_for_inputs(request.inputs.len() as u64, self.input_fee_ppk);

        if inputs_total != outputs_total + fee {
            return Err(mint_error(
                ErrorCode::TransactionUnbalanced,
                "inputs do not equal outputs plus fee",
            ));
        }

        self.spend_inputs(&request.inputs)?;

        Ok(SwapResponse {
            signatures: self.sign_outputs(&request.outputs),
        })
    }

    async fn post_restore(
        &self,
        _mint_url: &MintUrl,
        request: RestoreRequest,
    ) -> Result<RestoreResponse, Error> {
        let state = self.lock();
        let mut response = RestoreResponse::default();

        for output in request.outputs {
            if let Some(signature) = state.signed.get(&output.blinded_secret) {
                response.outputs.push(output);
                response.signatures.push(signature.clone());
            }
        }

        Ok(response)
    }

    async fn post_check_state(
        &self,
        _mint_url: &MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let state = self.lock();

        Ok(CheckStateResponse {
            states: request
                .ys
                .into_iter()
                .map(|y| ProofState {
                    y,
                    state: if state.spent.contains(&y) {
                        State::Spent
                    } else {
                        State::Unspent
                    },
                })
                .collect(),
        })
    }
}
