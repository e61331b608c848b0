//! The pool key hierarchy.
//!
//! A pool's content key is reachable only through this chain:
//!
//! ```text
//! personal private key            (rebuilt from session fragments)
//!   -> share key + share IV       (ShareConfig.key / .iv, sealed to the member)
//!   -> pool private key           (ShareConfig.private_key, AES-GCM under the share key)
//!   -> content key                (PoolShare.pool_key, sealed to the pool)
//! ```
//!
//! Every link is opened into a [`SecretBytes`] scoped to the operation that
//! needs it, so it is wiped on success, error and early return alike.
//! Nothing decrypted is ever stored back into a record.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::audit::{AuditEvent, AuditLog, AuditRecord, AuditSink};
use crate::chat;
use crate::config::PoolParameters;
use crate::credentials::{CredentialExtractor, SessionFragments};
use crate::crypto::{self, SymmetricCipher};
use crate::error::PoolError;
use crate::keys::{self, KeyPair, ASYMMETRIC_KEY_BITS};
use crate::model::{
    Account, AccountId, DecryptedMessage, Message, Pool, PoolConfig, PoolShare, Rights,
    ShareConfig, OWNER_RIGHTS,
};
use crate::secret::SecretBytes;
use crate::signature;
use crate::store::{Changeset, PoolStore};

/// Operates on one pool on behalf of one account.
///
/// Inert until [`PoolHandler::initialize`] has been called once with the
/// caller's session fragments. Mutations are applied to the handler's copy
/// of the records and staged for [`PoolHandler::commit_to`]; a failed
/// operation changes nothing, and a failed commit restores the records as
/// they were at the last successful commit.
pub struct PoolHandler<X: CredentialExtractor> {
    account: Account,
    pool: Pool,
    share: Option<PoolShare>,
    members: Vec<AccountId>,
    session: Option<SessionFragments>,
    extractor: X,
    pending: Changeset,
    checkpoint: Option<Checkpoint>,
    audit: AuditLog,
}

/// Local records as last loaded or committed.
struct Checkpoint {
    pool: Pool,
    share: Option<PoolShare>,
    members: Vec<AccountId>,
}

impl<X: CredentialExtractor> PoolHandler<X> {
    /// Bind `account` to `pool`. The caller's share is looked up among
    /// `shares` by pool identifier; the other entries for this pool are
    /// remembered as existing members.
    pub fn new(account: Account, pool: Pool, shares: &[PoolShare], extractor: X) -> Self {
        let in_pool = |s: &&PoolShare| {
            !pool.unique_identifier.is_empty() && s.pool_uid == pool.unique_identifier
        };
        let share = shares
            .iter()
            .filter(in_pool)
            .find(|s| s.account_id == account.id)
            .cloned();
        let members = shares
            .iter()
            .filter(in_pool)
            .map(|s| s.account_id.clone())
            .collect();

        Self {
            account,
            pool,
            share,
            members,
            session: None,
            extractor,
            pending: Changeset::default(),
            checkpoint: None,
            audit: AuditLog::new(),
        }
    }

    /// Resolve the account, the pool and its participants through `store`.
    pub fn open<S>(store: &S, account_id: &str, pool_uid: &str, extractor: X) -> Result<Self, PoolError>
    where
        S: PoolStore + ?Sized,
    {
        let account = store.account(account_id)?;
        let pool = store.pool(pool_uid)?;
        let participants = store.participants(pool_uid)?;
        Ok(Self::new(account, pool, &participants, extractor))
    }

    /// Hand the handler its session fragments. Allowed exactly once.
    ///
    /// The fragments are copied; the caller keeps ownership of (and
    /// responsibility for) its own buffers.
    pub fn initialize(
        &mut self,
        stored_key_part: &[u8],
        session_key: &[u8],
        session_iv: &[u8],
        session_stored_key_part: &[u8],
    ) -> Result<(), PoolError> {
        if self.session.is_some() {
            return Err(PoolError::AlreadyInitialized);
        }
        self.session = Some(SessionFragments::new(
            stored_key_part,
            session_key,
            session_iv,
            session_stored_key_part,
        ));
        Ok(())
    }

    /// [`PoolHandler::initialize`] from a set of fragments.
    pub fn initialize_with(&mut self, fragments: &SessionFragments) -> Result<(), PoolError> {
        self.initialize(
            fragments.stored_key_part(),
            fragments.session_key(),
            fragments.session_iv(),
            fragments.session_stored_key_part(),
        )
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The caller's own share, if it has one.
    pub fn share(&self) -> Option<&PoolShare> {
        self.share.as_ref()
    }

    /// True iff the bound account has an active share for the bound pool.
    /// No decryption is performed.
    pub fn can_access_pool(&self) -> bool {
        self.share
            .as_ref()
            .is_some_and(|s| s.is_active && s.pool_uid == self.pool.unique_identifier)
    }

    /// Active share with at least `level` rights.
    pub fn has_rights(&self, level: Rights) -> bool {
        self.can_access_pool() && self.share.as_ref().is_some_and(|s| s.rights >= level)
    }

    pub fn is_owner(&self) -> bool {
        self.has_rights(OWNER_RIGHTS)
    }

    pub fn add_audit_sink(&mut self, sink: Box<dyn AuditSink>) {
        self.audit.add_forward_sink(sink);
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Records staged since the last commit.
    pub fn pending_changes(&self) -> &Changeset {
        &self.pending
    }

    /// Take the staged records, leaving nothing pending. The caller becomes
    /// responsible for committing them as one unit; the handler keeps its
    /// local records as staged.
    pub fn take_changes(&mut self) -> Changeset {
        self.checkpoint = None;
        std::mem::take(&mut self.pending)
    }

    /// Drop the staged records and restore the local records to the last
    /// load or successful commit.
    pub fn discard_changes(&mut self) {
        self.pending = Changeset::default();
        if let Some(checkpoint) = self.checkpoint.take() {
            self.pool = checkpoint.pool;
            self.share = checkpoint.share;
            self.members = checkpoint.members;
        }
    }

    /// Commit the staged records to `store` in one transaction.
    ///
    /// Store failures (conflicts, constraint violations) are returned as-is,
    /// after the handler has rolled back to its last committed records. A
    /// conflicting handler stays at its old version; reopen it to retry.
    pub fn commit_to<S>(&mut self, store: &mut S) -> Result<(), PoolError>
    where
        S: PoolStore + ?Sized,
    {
        if self.pending.is_empty() {
            return Ok(());
        }
        let bumps_pool = self.pending.pool.is_some();
        let changes = std::mem::take(&mut self.pending);

        match store.commit(changes) {
            Ok(()) => {
                self.checkpoint = None;
                if bumps_pool {
                    self.pool.version += 1;
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(pool = %self.pool.unique_identifier, error = %err, "commit refused, rolling back");
                self.discard_changes();
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pool creation
    // -----------------------------------------------------------------------

    /// Mint a new pool owned by the bound account and return the owner's
    /// share.
    pub fn create_pool(&mut self, params: &PoolParameters) -> Result<PoolShare, PoolError> {
        self.session()?;
        if self.pool.is_created() {
            return Err(PoolError::PoolAlreadyCreated(self.pool.unique_identifier.clone()));
        }
        params.validate()?;

        let unique_identifier =
            URL_SAFE_NO_PAD.encode(crypto::random_bytes(params.identifier_length)?);
        let salt = crypto::random_bytes(params.salt_length)?;

        let pool_pair = KeyPair::generate(params.pool_asymmetric_key_size)?;
        let content = SymmetricCipher::generate(params.pool_symmetric_key_size)?;
        let share_cipher = SymmetricCipher::generate(params.share_key_size)?;

        let envelope = ShareConfig {
            key: keys::seal(&self.account.public_key, share_cipher.key().expose())?,
            iv: keys::seal(&self.account.public_key, share_cipher.iv().expose())?,
            private_key: share_cipher.encrypt(pool_pair.private_key().expose())?,
            key_size: params.share_key_size,
            asymmetric_key_size: params.share_asymmetric_key_size,
        };
        let pool_key = keys::seal(pool_pair.public_key(), content.key().expose())?;
        let config = PoolConfig {
            public_key: pool_pair.public_key().clone(),
            public_key_signature: signature::sign_public_key(&pool_pair)?,
            iv: content.iv().expose().to_vec(),
        };

        let share = PoolShare {
            account_id: self.account.id.clone(),
            pool_uid: unique_identifier.clone(),
            rights: OWNER_RIGHTS,
            is_active: true,
            show_since: None,
            config: envelope,
            pool_key,
        };

        self.save_checkpoint();
        self.pool.unique_identifier = unique_identifier;
        self.pool.owner = Some(self.account.id.clone());
        self.pool.salt = salt;
        self.pool.config = Some(config);
        self.pool.default_rights = params.default_rights;

        self.share = Some(share.clone());
        self.members.push(self.account.id.clone());
        self.pending.pool = Some(self.pool.clone());
        self.pending.new_shares.push(share.clone());

        tracing::debug!(pool = %self.pool.unique_identifier, owner = %self.account.id, "pool created");
        self.record(None, AuditEvent::PoolCreated);
        Ok(share)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Give `target` access to the pool with the pool's default rights.
    pub fn add_member(&mut self, target: &Account, share_key_size: usize) -> Result<PoolShare, PoolError> {
        self.add_member_since(target, share_key_size, None)
    }

    /// Like [`PoolHandler::add_member`], hiding history sent at or before
    /// `show_since` from the new member.
    pub fn add_member_since(
        &mut self,
        target: &Account,
        share_key_size: usize,
        show_since: Option<DateTime<Utc>>,
    ) -> Result<PoolShare, PoolError> {
        let session = self.session()?;
        let own = self.active_share()?;
        if target.id == self.account.id || self.members.contains(&target.id) {
            tracing::warn!(pool = %self.pool.unique_identifier, target = %target.id, "refused duplicate membership");
            return Err(PoolError::AlreadyMember(target.id.clone()));
        }
        let new_cipher = SymmetricCipher::generate(share_key_size)?;

        let pool_pair = {
            let personal = self.personal_keypair(session)?;
            self.open_pool_keypair(own, &personal)?
        };

        let config = ShareConfig {
            key: keys::seal(&target.public_key, new_cipher.key().expose())?,
            iv: keys::seal(&target.public_key, new_cipher.iv().expose())?,
            private_key: new_cipher.encrypt(pool_pair.private_key().expose())?,
            key_size: share_key_size,
            asymmetric_key_size: ASYMMETRIC_KEY_BITS,
        };
        let share = PoolShare {
            account_id: target.id.clone(),
            pool_uid: self.pool.unique_identifier.clone(),
            rights: self.pool.default_rights,
            is_active: true,
            show_since,
            config,
            pool_key: own.pool_key.clone(),
        };

        self.save_checkpoint();
        self.members.push(target.id.clone());
        self.pending.pool = Some(self.pool.clone());
        self.pending.new_shares.push(share.clone());

        tracing::debug!(pool = %self.pool.unique_identifier, member = %target.id, "member added");
        self.record(Some(&target.id), AuditEvent::MemberAdded);
        Ok(share)
    }

    /// Deactivate `member`. Owner only.
    ///
    /// This is an access-control switch: the member's envelope still opens
    /// the pool keys, and no key rotation happens.
    pub fn revoke_member(&mut self, member: &mut PoolShare) -> Result<(), PoolError> {
        self.set_member_active(member, false, AuditEvent::MemberRevoked)
    }

    /// Reactivate a previously revoked `member`. Owner only.
    pub fn restore_member(&mut self, member: &mut PoolShare) -> Result<(), PoolError> {
        self.set_member_active(member, true, AuditEvent::MemberRestored)
    }

    fn set_member_active(
        &mut self,
        member: &mut PoolShare,
        active: bool,
        event: AuditEvent,
    ) -> Result<(), PoolError> {
        self.session()?;
        if !self.is_owner() || member.pool_uid != self.pool.unique_identifier {
            tracing::warn!(pool = %self.pool.unique_identifier, account = %self.account.id, "refused membership change");
            return Err(PoolError::AccessDenied);
        }
        if member.account_id == self.account.id {
            return Err(PoolError::InvalidParameter(
                "the owner's share cannot be toggled".into(),
            ));
        }

        member.is_active = active;
        self.pending
            .updated_shares
            .retain(|s| s.account_id != member.account_id);
        self.pending.updated_shares.push(member.clone());
        self.pending.pool = Some(self.pool.clone());

        tracing::debug!(pool = %self.pool.unique_identifier, member = %member.account_id, active, "membership toggled");
        self.record(Some(&member.account_id), event);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    /// A cipher keyed with the pool's content key and IV.
    pub fn content_cipher(&self) -> Result<SymmetricCipher, PoolError> {
        let (cipher, _personal) = self.content_cipher_with_key()?;
        Ok(cipher)
    }

    /// Like [`PoolHandler::content_cipher`], also handing back the caller's
    /// personal private key so a follow-up operation need not rebuild it.
    /// The key is wiped when the returned buffer drops.
    pub fn content_cipher_with_key(&self) -> Result<(SymmetricCipher, SecretBytes), PoolError> {
        let session = self.session()?;
        let own = self.active_share()?;

        let personal = self.personal_keypair(session)?;
        let pool_pair = self.open_pool_keypair(own, &personal)?;

        let content_key = pool_pair.open(&own.pool_key)?;
        let iv = SecretBytes::from_slice(&self.pool_config()?.iv);
        let cipher =
            SymmetricCipher::from_parts(content_key, iv).map_err(|_| PoolError::DecryptionFailure)?;

        Ok((cipher, personal.into_private_key()))
    }

    /// The newest `count` messages visible to the caller, decrypted,
    /// newest first. `None` when nothing is visible.
    pub fn chat(&self, count: usize) -> Result<Option<Vec<DecryptedMessage>>, PoolError> {
        self.session()?;
        let own = self.active_share()?;

        let window = chat::select_window(&self.pool.messages, count, own.show_since);
        if window.is_empty() {
            return Ok(None);
        }

        let cipher = self.content_cipher()?;
        let decrypted = chat::decrypt_window(&window, &cipher)?;
        tracing::debug!(pool = %self.pool.unique_identifier, count = decrypted.len(), "chat retrieved");
        Ok(Some(decrypted))
    }

    /// Encrypt `text` under the content key and append it to the pool.
    pub fn post_message(&mut self, text: &str) -> Result<Message, PoolError> {
        self.post_message_at(text, Utc::now())
    }

    /// [`PoolHandler::post_message`] with an explicit sent time.
    pub fn post_message_at(&mut self, text: &str, sent: DateTime<Utc>) -> Result<Message, PoolError> {
        let cipher = self.content_cipher()?;
        let message = Message {
            sender: self.account.id.clone(),
            sent,
            text: cipher.encrypt(text.as_bytes())?,
        };

        self.save_checkpoint();
        self.pool.messages.push(message.clone());
        self.pending.pool = Some(self.pool.clone());
        self.record(None, AuditEvent::MessagePosted);
        Ok(message)
    }

    // -----------------------------------------------------------------------
    // Chain
    // -----------------------------------------------------------------------

    fn session(&self) -> Result<&SessionFragments, PoolError> {
        self.session.as_ref().ok_or(PoolError::Uninitialized)
    }

    fn active_share(&self) -> Result<&PoolShare, PoolError> {
        match &self.share {
            Some(share) if self.can_access_pool() => Ok(share),
            _ => {
                tracing::warn!(pool = %self.pool.unique_identifier, account = %self.account.id, "no active share");
                Err(PoolError::AccessDenied)
            }
        }
    }

    fn pool_config(&self) -> Result<&PoolConfig, PoolError> {
        self.pool
            .config
            .as_ref()
            .ok_or_else(|| PoolError::PoolNotFound(self.pool.unique_identifier.clone()))
    }

    fn personal_keypair(&self, session: &SessionFragments) -> Result<KeyPair, PoolError> {
        let private = session.extract_with(&self.extractor)?;
        KeyPair::from_private_key(private)
    }

    /// Open the share envelope with the personal key and recover the pool
    /// keypair, checking it against the pool's signed public key.
    fn open_pool_keypair(&self, share: &PoolShare, personal: &KeyPair) -> Result<KeyPair, PoolError> {
        let config = self.pool_config()?;
        signature::verify_public_key(&config.public_key, &config.public_key_signature)?;

        let share_key = personal.open(&share.config.key)?;
        let share_iv = personal.open(&share.config.iv)?;
        let share_cipher = SymmetricCipher::from_parts(share_key, share_iv)
            .map_err(|_| PoolError::DecryptionFailure)?;

        let pool_private = share_cipher.decrypt(&share.config.private_key)?;
        let pool_pair =
            KeyPair::from_private_key(pool_private).map_err(|_| PoolError::DecryptionFailure)?;
        if pool_pair.public_key() != &config.public_key {
            return Err(PoolError::DecryptionFailure);
        }
        Ok(pool_pair)
    }

    /// Remember the local records before the first staged mutation.
    fn save_checkpoint(&mut self) {
        if self.checkpoint.is_none() {
            self.checkpoint = Some(Checkpoint {
                pool: self.pool.clone(),
                share: self.share.clone(),
                members: self.members.clone(),
            });
        }
    }

    fn record(&mut self, subject: Option<&str>, event: AuditEvent) {
        let record = AuditRecord::now(&self.pool.unique_identifier, &self.account.id, subject, event);
        self.audit.append(record);
    }
}

impl<X: CredentialExtractor> std::fmt::Debug for PoolHandler<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandler")
            .field("account", &self.account.id)
            .field("pool", &self.pool.unique_identifier)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
