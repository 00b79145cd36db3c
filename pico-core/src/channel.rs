use core::fmt;

use bitcoin::hashes::hash160;
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, LegacySighash};
use bitcoin::{Script, ScriptBuf, Transaction};
use serde_derive::{Deserialize, Serialize};
use tracing::*;

use crate::chain::oracle::ConfirmationOracle;
use crate::persist::model::ChannelSnapshot;
use crate::policy::error::{undefined_role_error, ValidationError};
use crate::prelude::*;
use crate::tx::script::{
    get_commit_revoke_secret_hash, get_deposit_expire_time, get_deposit_spend_secret_hash,
    CommitScriptParams, DepositScriptParams, Secret,
};
use crate::tx::solve::{
    ChangeSpend, CreateCommitSpend, FinalizeCommitSpend, PayoutSpend, RevokeSpend, SigningInput,
    SpendType, TimeoutSpend,
};
use crate::Arc;
use crate::{mismatch_err, missing_state_err, transfer_quantity_err};

/// Default relative timelock of the deposit reclaim path, in blocks
pub const DEFAULT_EXPIRE_TIME: u16 = 5;
/// Default relative timelock of the commit payout path, in blocks
pub const DEFAULT_DELAY_TIME: u16 = 5;

/// Timelocks used when this channel compiles new scripts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Blocks after deposit confirmation until the payer may reclaim
    pub expire_time: u16,
    /// Blocks after commit confirmation until the payee may claim
    pub delay_time: u16,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig { expire_time: DEFAULT_EXPIRE_TIME, delay_time: DEFAULT_DELAY_TIME }
    }
}

/// A signed commitment and its script
#[derive(Clone, Debug, PartialEq)]
pub struct CommitEntry {
    /// The commit transaction
    pub transaction: Transaction,
    /// The commit script the transaction pays to
    pub script: ScriptBuf,
    /// Present once the commitment has been revoked
    pub revoke_secret: Option<Secret>,
}

impl CommitEntry {
    /// A new, unrevoked entry
    pub fn new(transaction: Transaction, script: ScriptBuf) -> Self {
        CommitEntry { transaction, script, revoke_secret: None }
    }

    /// The revoke secret hash embedded in the script
    pub fn revoke_secret_hash(&self) -> Result<hash160::Hash, ValidationError> {
        get_commit_revoke_secret_hash(&self.script)
    }
}

/// The mutable state of a channel.
///
/// Every instance owns its own containers.  `commits_active` is kept in
/// ascending order of the quantity each commit pays to the payee, as
/// reported by the oracle.
#[derive(Clone, Debug, Default)]
pub struct ChannelState {
    /// The payer's key, if we are the payer
    pub payer_key: Option<SecretKey>,
    /// The payee's key, if we are the payee
    pub payee_key: Option<SecretKey>,
    /// The payee's spend secret, known to the payer only after close
    pub spend_secret: Option<Secret>,
    /// The funding script
    pub deposit_script: Option<ScriptBuf>,
    /// The funding transaction
    pub deposit_tx: Option<Transaction>,
    /// Payer reclaim after expiry
    pub timeout_tx: Option<Transaction>,
    /// Payer reclaim of the remainder with the spend secret
    pub change_tx: Option<Transaction>,
    /// Revoke secrets of commits requested but not yet received
    pub commits_requested: Vec<Secret>,
    /// Signed, unrevoked commits
    pub commits_active: Vec<CommitEntry>,
    /// Commits whose revoke secret is known
    pub commits_revoked: Vec<CommitEntry>,
}

fn confirms(oracle: &dyn ConfirmationOracle, tx: &Transaction) -> Result<u32, ValidationError> {
    let txid = tx.compute_txid();
    let confirms = oracle.confirmations(&txid)?;
    trace!("oracle: {} has {} confirmations", txid, confirms);
    Ok(confirms)
}

fn quantity(oracle: &dyn ConfirmationOracle, tx: &Transaction) -> Result<u64, ValidationError> {
    let quantity = oracle.output_quantity(tx)?;
    trace!("oracle: {} carries {}", tx.compute_txid(), quantity);
    Ok(quantity)
}

impl ChannelState {
    fn deposit_script(&self) -> Result<&ScriptBuf, ValidationError> {
        match &self.deposit_script {
            Some(script) => Ok(script),
            None => missing_state_err!("no deposit script"),
        }
    }

    fn deposit_tx(&self) -> Result<&Transaction, ValidationError> {
        match &self.deposit_tx {
            Some(tx) => Ok(tx),
            None => missing_state_err!("no deposit transaction"),
        }
    }

    fn deposit_params(&self) -> Result<DepositScriptParams, ValidationError> {
        DepositScriptParams::from_script(self.deposit_script()?)
    }

    fn spend_secret(&self) -> Result<&Secret, ValidationError> {
        match &self.spend_secret {
            Some(secret) => Ok(secret),
            None => missing_state_err!("spend secret not known"),
        }
    }

    fn keys(&self) -> Vec<SecretKey> {
        self.payer_key.iter().chain(self.payee_key.iter()).cloned().collect()
    }

    fn deposit_confirms(&self, oracle: &dyn ConfirmationOracle) -> Result<u32, ValidationError> {
        self.deposit_script()?;
        confirms(oracle, self.deposit_tx()?)
    }

    fn timeout_confirms(&self, oracle: &dyn ConfirmationOracle) -> Result<u32, ValidationError> {
        match &self.timeout_tx {
            Some(tx) => confirms(oracle, tx),
            None => missing_state_err!("no timeout transaction"),
        }
    }

    fn change_confirms(&self, oracle: &dyn ConfirmationOracle) -> Result<u32, ValidationError> {
        match &self.change_tx {
            Some(tx) => confirms(oracle, tx),
            None => missing_state_err!("no change transaction"),
        }
    }

    fn expire_time(&self) -> Result<u16, ValidationError> {
        get_deposit_expire_time(self.deposit_script()?)
    }

    fn spend_secret_hash(&self) -> Result<hash160::Hash, ValidationError> {
        if let Some(secret) = &self.spend_secret {
            // payee
            Ok(secret.hash160())
        } else if let Some(script) = &self.deposit_script {
            // payer
            get_deposit_spend_secret_hash(script)
        } else {
            error!("neither spend secret nor deposit script is set");
            Err(undefined_role_error("spend_secret_hash: not payee or payer"))
        }
    }

    fn is_closing(&self, oracle: &dyn ConfirmationOracle) -> Result<bool, ValidationError> {
        let unconfirmed_change = match &self.change_tx {
            Some(tx) => confirms(oracle, tx)? == 0,
            None => false,
        };
        let unconfirmed_timeout = match &self.timeout_tx {
            Some(tx) => confirms(oracle, tx)? == 0,
            None => false,
        };
        Ok(unconfirmed_change || unconfirmed_timeout)
    }

    fn is_closed(&self, oracle: &dyn ConfirmationOracle) -> Result<bool, ValidationError> {
        let confirmed_change = match &self.change_tx {
            Some(tx) => confirms(oracle, tx)? > 0,
            None => false,
        };
        let confirmed_timeout = match &self.timeout_tx {
            Some(tx) => confirms(oracle, tx)? > 0,
            None => false,
        };
        Ok(confirmed_change || confirmed_timeout)
    }

    /// Sort the active commits by quantity, returning the sorted quantities.
    ///
    /// All quantities are fetched before the entries are touched.
    pub(crate) fn order_active(
        &mut self,
        oracle: &dyn ConfirmationOracle,
    ) -> Result<Vec<u64>, ValidationError> {
        let quantities = self
            .commits_active
            .iter()
            .map(|entry| quantity(oracle, &entry.transaction))
            .collect::<Result<Vec<_>, _>>()?;
        let mut keyed: Vec<(u64, CommitEntry)> =
            quantities.into_iter().zip(self.commits_active.drain(..)).collect();
        keyed.sort_by_key(|(quantity, _)| *quantity);
        let (quantities, entries) = keyed.into_iter().unzip();
        self.commits_active = entries;
        Ok(quantities)
    }

    fn transferred_amount(
        &mut self,
        oracle: &dyn ConfirmationOracle,
    ) -> Result<u64, ValidationError> {
        Ok(self.order_active(oracle)?.last().copied().unwrap_or(0))
    }

    fn deposit_total(&self, oracle: &dyn ConfirmationOracle) -> Result<u64, ValidationError> {
        quantity(oracle, self.deposit_tx()?)
    }

    fn validate_transfer_quantity(
        &mut self,
        oracle: &dyn ConfirmationOracle,
        quantity: u64,
    ) -> Result<(), ValidationError> {
        let transferred = self.transferred_amount(oracle)?;
        if quantity <= transferred {
            transfer_quantity_err!(
                "amount not greater transferred: {} <= {}",
                quantity,
                transferred
            );
        }
        let total = self.deposit_total(oracle)?;
        if quantity > total {
            transfer_quantity_err!("amount greater total: {} > {}", quantity, total);
        }
        Ok(())
    }

    fn revoke(&mut self, secret: &Secret) -> Result<Option<CommitEntry>, ValidationError> {
        let secret_hash = secret.hash160();
        let mut found = None;
        for (index, entry) in self.commits_active.iter().enumerate() {
            if entry.revoke_secret_hash()? == secret_hash {
                found = Some(index);
                break;
            }
        }
        let index = match found {
            Some(index) => index,
            None => return Ok(None),
        };
        let mut entry = self.commits_active.remove(index);
        entry.revoke_secret = Some(secret.clone());
        debug!("revoked commit {}", entry.transaction.compute_txid());
        self.commits_revoked.push(entry.clone());
        Ok(Some(entry))
    }

    fn has_revoke_secret_hash(&self, hash: &hash160::Hash) -> Result<bool, ValidationError> {
        for entry in self.commits_active.iter().chain(self.commits_revoked.iter()) {
            if entry.revoke_secret_hash()? == *hash {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// A unidirectional payment channel.
///
/// Every public method takes the channel lock exactly once.  Oracle calls
/// happen while the lock is held.
pub struct Channel {
    config: ChannelConfig,
    oracle: Arc<dyn ConfirmationOracle>,
    secp_ctx: Secp256k1<All>,
    state: Mutex<ChannelState>,
}

impl SendSync for Channel {}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Channel {
    /// An empty channel with the default configuration
    pub fn new(oracle: Arc<dyn ConfirmationOracle>) -> Self {
        Self::with_config(ChannelConfig::default(), oracle)
    }

    /// An empty channel
    pub fn with_config(config: ChannelConfig, oracle: Arc<dyn ConfirmationOracle>) -> Self {
        Channel {
            config,
            oracle,
            secp_ctx: Secp256k1::new(),
            state: Mutex::new(ChannelState::default()),
        }
    }

    /// The configuration
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn oracle(&self) -> &dyn ConfirmationOracle {
        self.oracle.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap()
    }

    /// Snapshot the state, with the active commits in order
    pub fn save(&self) -> Result<ChannelSnapshot, ValidationError> {
        let mut state = self.lock();
        state.order_active(self.oracle())?;
        Ok(ChannelSnapshot::from(&*state))
    }

    /// Replace the state with a snapshot.
    ///
    /// Active quantities must be distinct, non-zero and within the deposit.
    /// On error the current state is kept.
    #[instrument(skip_all)]
    pub fn load(&self, snapshot: ChannelSnapshot) -> Result<(), ValidationError> {
        let mut loaded = ChannelState::try_from(snapshot)?;
        let mut state = self.lock();
        let quantities = loaded.order_active(self.oracle())?;
        if let Some(dup) = quantities.windows(2).find(|w| w[0] == w[1]) {
            transfer_quantity_err!("duplicate active quantity {}", dup[0]);
        }
        if quantities.first() == Some(&0) {
            transfer_quantity_err!("zero active quantity");
        }
        if let (Some(highest), Some(_)) = (quantities.last(), &loaded.deposit_tx) {
            let total = loaded.deposit_total(self.oracle())?;
            if *highest > total {
                transfer_quantity_err!("active quantity greater total: {} > {}", highest, total);
            }
        }
        *state = loaded;
        trace_channel_state!(&*state);
        Ok(())
    }

    /// Reset to an empty state
    pub fn clear(&self) {
        *self.lock() = ChannelState::default();
        debug!("channel cleared");
    }

    /// Set the payer key, which must match the deposit script if already set
    pub fn set_payer_key(&self, key: SecretKey) -> Result<(), ValidationError> {
        let mut state = self.lock();
        if state.deposit_script.is_some() {
            let expected = state.deposit_params()?.payer_pubkey;
            self.check_key(&key, &expected)?;
        }
        state.payer_key = Some(key);
        Ok(())
    }

    /// Set the payee key, which must match the deposit script if already set
    pub fn set_payee_key(&self, key: SecretKey) -> Result<(), ValidationError> {
        let mut state = self.lock();
        if state.deposit_script.is_some() {
            let expected = state.deposit_params()?.payee_pubkey;
            self.check_key(&key, &expected)?;
        }
        state.payee_key = Some(key);
        Ok(())
    }

    fn check_key(&self, key: &SecretKey, expected: &PublicKey) -> Result<(), ValidationError> {
        let pubkey = key.public_key(&self.secp_ctx);
        if pubkey != *expected {
            error!("key {} does not match deposit key {}", pubkey, expected);
            mismatch_err!("key {} does not match deposit key {}", pubkey, expected);
        }
        Ok(())
    }

    /// Set the funding script and transaction.
    ///
    /// The script must be a deposit script matching any keys and spend
    /// secret already set.  Once set, the deposit can only be set again to
    /// the same values.
    #[instrument(skip_all)]
    pub fn set_deposit(
        &self,
        script: ScriptBuf,
        transaction: Transaction,
    ) -> Result<(), ValidationError> {
        let params = DepositScriptParams::from_script(&script)?;
        let mut state = self.lock();
        if state.deposit_script.as_ref().map_or(false, |s| *s != script)
            || state.deposit_tx.as_ref().map_or(false, |tx| *tx != transaction)
        {
            error!("deposit already set");
            mismatch_err!("deposit already set to a different value");
        }
        if let Some(key) = &state.payer_key {
            self.check_key(key, &params.payer_pubkey)?;
        }
        if let Some(key) = &state.payee_key {
            self.check_key(key, &params.payee_pubkey)?;
        }
        if let Some(secret) = &state.spend_secret {
            if secret.hash160() != params.spend_secret_hash {
                error!("spend secret does not match deposit");
                mismatch_err!("spend secret does not hash to {}", params.spend_secret_hash);
            }
        }
        let txid = transaction.compute_txid();
        debug!("deposit set: txid {} expire_time {}", txid, params.expire_time);
        state.deposit_script = Some(script);
        state.deposit_tx = Some(transaction);
        Ok(())
    }

    /// Set the payer's timeout transaction
    pub fn set_timeout_tx(&self, transaction: Transaction) {
        debug!("timeout set: txid {}", transaction.compute_txid());
        self.lock().timeout_tx = Some(transaction);
    }

    /// Set the payer's change transaction
    pub fn set_change_tx(&self, transaction: Transaction) {
        debug!("change set: txid {}", transaction.compute_txid());
        self.lock().change_tx = Some(transaction);
    }

    /// Set the spend secret
    pub fn set_spend_secret(&self, secret: Secret) {
        debug!("spend secret set: {:?}", secret);
        self.lock().spend_secret = Some(secret);
    }

    /// Confirmations of the deposit, which requires both the deposit script
    /// and transaction
    pub fn get_deposit_confirms(&self) -> Result<u32, ValidationError> {
        self.lock().deposit_confirms(self.oracle())
    }

    /// Confirmations of the timeout transaction
    pub fn get_timeout_confirms(&self) -> Result<u32, ValidationError> {
        self.lock().timeout_confirms(self.oracle())
    }

    /// Confirmations of the change transaction
    pub fn get_change_confirms(&self) -> Result<u32, ValidationError> {
        self.lock().change_confirms(self.oracle())
    }

    /// The expire time of the deposit script
    pub fn get_expire_time(&self) -> Result<u16, ValidationError> {
        self.lock().expire_time()
    }

    /// The spend secret hash, from the secret if known, else from the
    /// deposit script
    pub fn get_spend_secret_hash(&self) -> Result<hash160::Hash, ValidationError> {
        self.lock().spend_secret_hash()
    }

    /// The deposit has at least one confirmation
    pub fn is_deposit_confirmed(&self) -> Result<bool, ValidationError> {
        Ok(self.lock().deposit_confirms(self.oracle())? > 0)
    }

    /// Whether the payer may reclaim the deposit through the timeout path
    pub fn is_deposit_expired(&self) -> Result<bool, ValidationError> {
        let state = self.lock();
        let expire_time = state.expire_time()?;
        Ok(state.deposit_confirms(self.oracle())? >= expire_time as u32)
    }

    /// The timeout transaction has at least one confirmation
    pub fn is_timeout_confirmed(&self) -> Result<bool, ValidationError> {
        Ok(self.lock().timeout_confirms(self.oracle())? > 0)
    }

    /// The change transaction has at least one confirmation
    pub fn is_change_confirmed(&self) -> Result<bool, ValidationError> {
        Ok(self.lock().change_confirms(self.oracle())? > 0)
    }

    /// A closing transaction is set but not yet confirmed
    pub fn is_closing(&self) -> Result<bool, ValidationError> {
        self.lock().is_closing(self.oracle())
    }

    /// A closing transaction is confirmed
    pub fn is_closed(&self) -> Result<bool, ValidationError> {
        self.lock().is_closed(self.oracle())
    }

    /// The quantity of the current commit, zero if there is none
    pub fn get_transferred_amount(&self) -> Result<u64, ValidationError> {
        self.lock().transferred_amount(self.oracle())
    }

    /// The quantity of the deposit
    pub fn get_deposit_total(&self) -> Result<u64, ValidationError> {
        self.lock().deposit_total(self.oracle())
    }

    /// The deposit not yet transferred
    pub fn get_deposit_remaining(&self) -> Result<u64, ValidationError> {
        let mut state = self.lock();
        let total = state.deposit_total(self.oracle())?;
        let transferred = state.transferred_amount(self.oracle())?;
        match total.checked_sub(transferred) {
            Some(remaining) => Ok(remaining),
            None => {
                transfer_quantity_err!("transferred greater total: {} > {}", transferred, total)
            }
        }
    }

    /// Check that a new commit for `quantity` is strictly greater than the
    /// current commit and within the deposit
    pub fn validate_transfer_quantity(&self, quantity: u64) -> Result<(), ValidationError> {
        self.lock().validate_transfer_quantity(self.oracle(), quantity)
    }

    /// Record a revoke secret for a commit the payer is asked to create
    pub fn request_commit(&self, revoke_secret: Secret) {
        debug!("commit requested: {:?}", revoke_secret);
        self.lock().commits_requested.push(revoke_secret);
    }

    /// Revoke secrets of pending requests
    pub fn get_commits_requested(&self) -> Vec<Secret> {
        self.lock().commits_requested.clone()
    }

    /// The active commits, in ascending order of quantity
    pub fn get_commits_active(&self) -> Result<Vec<CommitEntry>, ValidationError> {
        let mut state = self.lock();
        state.order_active(self.oracle())?;
        Ok(state.commits_active.clone())
    }

    /// Revoked commits, in order of revocation
    pub fn get_commits_revoked(&self) -> Vec<CommitEntry> {
        self.lock().commits_revoked.clone()
    }

    /// Add a signed commit, which becomes the current commit.
    ///
    /// The script must be a commit script for this channel's keys and spend
    /// secret hash, with an unused revoke secret hash.  A matching request
    /// is consumed.
    #[instrument(skip(self, transaction))]
    pub fn add_active_commit(
        &self,
        transaction: Transaction,
        script: ScriptBuf,
    ) -> Result<(), ValidationError> {
        let params = CommitScriptParams::from_script(&script)?;
        let mut state = self.lock();
        let deposit = state.deposit_params()?;
        if params.payer_pubkey != deposit.payer_pubkey
            || params.payee_pubkey != deposit.payee_pubkey
        {
            error!("commit keys do not match the deposit");
            mismatch_err!("commit keys do not match the deposit");
        }
        if params.spend_secret_hash != deposit.spend_secret_hash {
            error!("commit spend secret hash does not match the deposit");
            mismatch_err!(
                "commit spend secret hash {} != {}",
                params.spend_secret_hash,
                deposit.spend_secret_hash
            );
        }
        if state.has_revoke_secret_hash(&params.revoke_secret_hash)? {
            error!("revoke secret hash {} already used", params.revoke_secret_hash);
            mismatch_err!("revoke secret hash {} already used", params.revoke_secret_hash);
        }
        let quantity = quantity(self.oracle(), &transaction)?;
        state.validate_transfer_quantity(self.oracle(), quantity)?;

        if let Some(index) =
            state.commits_requested.iter().position(|s| s.hash160() == params.revoke_secret_hash)
        {
            state.commits_requested.remove(index);
        }
        let txid = transaction.compute_txid();
        debug!("commit added: {}", vals_str!(txid, quantity, params.delay_time));
        // strictly greater than every active quantity, so the order holds
        state.commits_active.push(CommitEntry::new(transaction, script));
        trace_channel_state!(&*state);
        Ok(())
    }

    /// Revoke the active commit whose revoke hash matches `secret`.
    ///
    /// Returns the revoked entry, or `None` if no active commit matches.
    #[instrument(skip(self))]
    pub fn revoke(&self, secret: &Secret) -> Result<Option<CommitEntry>, ValidationError> {
        self.lock().revoke(secret)
    }

    /// Revoke each secret in turn
    pub fn revoke_all(
        &self,
        secrets: &[Secret],
    ) -> Result<Vec<Option<CommitEntry>>, ValidationError> {
        let mut state = self.lock();
        secrets.iter().map(|secret| state.revoke(secret)).collect()
    }

    /// Compile a deposit script paying from our payer key.
    ///
    /// `expire_time` defaults to the configured expire time.
    pub fn make_deposit_script(
        &self,
        payee_pubkey: PublicKey,
        spend_secret_hash: hash160::Hash,
        expire_time: Option<u16>,
    ) -> Result<ScriptBuf, ValidationError> {
        let state = self.lock();
        let payer_key = state
            .payer_key
            .as_ref()
            .ok_or_else(|| undefined_role_error("make_deposit_script: not payer"))?;
        let params = DepositScriptParams {
            payer_pubkey: payer_key.public_key(&self.secp_ctx),
            payee_pubkey,
            spend_secret_hash,
            expire_time: expire_time.unwrap_or(self.config.expire_time),
        };
        Ok(params.to_script())
    }

    /// Compile a commit script for this channel's deposit.
    ///
    /// `delay_time` defaults to the configured delay time.
    pub fn make_commit_script(
        &self,
        revoke_secret_hash: hash160::Hash,
        delay_time: Option<u16>,
    ) -> Result<ScriptBuf, ValidationError> {
        let deposit = self.lock().deposit_params()?;
        let params = CommitScriptParams {
            payer_pubkey: deposit.payer_pubkey,
            payee_pubkey: deposit.payee_pubkey,
            spend_secret_hash: deposit.spend_secret_hash,
            revoke_secret_hash,
            delay_time: delay_time.unwrap_or(self.config.delay_time),
        };
        Ok(params.to_script())
    }

    fn solve_deposit(
        &self,
        state: &ChannelState,
        spend: SpendType,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let params = state.deposit_params()?;
        let keys = state.keys();
        let input = SigningInput { secp_ctx: &self.secp_ctx, keys: &keys, sighash, sighash_type };
        params.solve(&input, &spend)
    }

    fn solve_commit(
        &self,
        state: &ChannelState,
        script: &Script,
        spend: SpendType,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let params = CommitScriptParams::from_script(script)?;
        let keys = state.keys();
        let input = SigningInput { secp_ctx: &self.secp_ctx, keys: &keys, sighash, sighash_type };
        params.solve(&input, &spend)
    }

    /// Payer witness reclaiming an expired deposit
    pub fn sign_timeout(
        &self,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let state = self.lock();
        self.solve_deposit(&state, SpendType::Timeout(TimeoutSpend), sighash, sighash_type)
    }

    /// Payer witness reclaiming the deposit remainder with the spend secret
    pub fn sign_change(
        &self,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let state = self.lock();
        let spend = SpendType::Change(ChangeSpend { spend_secret: state.spend_secret()?.clone() });
        self.solve_deposit(&state, spend, sighash, sighash_type)
    }

    /// Payer half of a new commit's deposit witness
    pub fn sign_create_commit(
        &self,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let state = self.lock();
        let spend = SpendType::CreateCommit(CreateCommitSpend::default());
        self.solve_deposit(&state, spend, sighash, sighash_type)
    }

    /// Payee completion of a commit's deposit witness, after checking the
    /// payer signature in `existing_witness`
    pub fn sign_finalize_commit(
        &self,
        existing_witness: ScriptBuf,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let state = self.lock();
        let spend = SpendType::FinalizeCommit(FinalizeCommitSpend { existing_witness });
        self.solve_deposit(&state, spend, sighash, sighash_type)
    }

    /// Payee witness claiming a commit output after its delay
    pub fn sign_payout(
        &self,
        commit_script: &Script,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let state = self.lock();
        let spend = SpendType::Payout(PayoutSpend { spend_secret: state.spend_secret()?.clone() });
        self.solve_commit(&state, commit_script, spend, sighash, sighash_type)
    }

    /// Payer witness claiming the output of a revoked commit
    pub fn sign_revoke(
        &self,
        entry: &CommitEntry,
        sighash: LegacySighash,
        sighash_type: EcdsaSighashType,
    ) -> Result<ScriptBuf, ValidationError> {
        let revoke_secret = match &entry.revoke_secret {
            Some(secret) => secret.clone(),
            None => missing_state_err!("commit {} not revoked", entry.transaction.compute_txid()),
        };
        let state = self.lock();
        let spend = SpendType::Revoke(RevokeSpend { revoke_secret });
        self.solve_commit(&state, &entry.script, spend, sighash, sighash_type)
    }
}
