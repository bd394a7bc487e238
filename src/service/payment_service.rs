//! Payment service: resolves what a user owes for an event, verifies
//! client-reported transactions against the chain, and grants access.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::chain::{
    Address, ChainClient, NormalizeError, NormalizedPaymentTxn, TxnKind, normalize_payment_txn,
};
use crate::domain::{
    Event, EventId, EventMembership, EventPayment, MembershipRole, MicroAlgos, PaymentId,
    PaymentRecord, UserId,
};
use crate::error::PaymentError;
use crate::persistence::{GrantError, PaymentRepository, RepositoryError};

/// What a user has to do to get into an event.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentIntent {
    /// A verified payment by this user already exists.
    AlreadyPaid {
        /// Transaction that was verified.
        transaction_id: String,
        /// When it was verified.
        verified_at: Option<DateTime<Utc>>,
    },
    /// The user already holds a membership.
    AlreadyMember {
        /// Role held within the event.
        role: MembershipRole,
    },
    /// The user has no access yet.
    Required(EventPaymentDetails),
}

/// Price and destination of an event the user has not joined.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPaymentDetails {
    /// Event identifier.
    pub event_id: EventId,
    /// Event title.
    pub title: String,
    /// Ticket price in ALGO, as configured.
    pub ticket_price: Option<Decimal>,
    /// Wallet to pay, trimmed.
    pub wallet_address: Option<String>,
    /// Amount to transfer, `None` for free events.
    pub amount: Option<MicroAlgos>,
    /// Whether joining needs no payment.
    pub is_free: bool,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    /// Payment row identifier.
    pub payment_id: PaymentId,
    /// Verified transaction.
    pub transaction_id: String,
    /// Transferred amount.
    pub amount: MicroAlgos,
    /// Confirmation round reported by the node.
    pub confirmed_round: Option<u64>,
    /// When the payment was recorded as verified.
    pub verified_at: DateTime<Utc>,
}

/// Balance of an account on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletBalance {
    /// Canonical account address.
    pub address: Address,
    /// Balance in micro-ALGO.
    pub amount: MicroAlgos,
}

/// A verification failure and the amount observed on chain, if any.
struct Rejection {
    error: PaymentError,
    observed: Option<MicroAlgos>,
}

impl From<PaymentError> for Rejection {
    fn from(error: PaymentError) -> Self {
        Self {
            error,
            observed: None,
        }
    }
}

/// Coordinates the repository and the chain client for every payment
/// operation.
///
/// Verification follows: validate input → load event → claim transaction
/// ID → fetch and normalize the transaction → check receiver and amount →
/// record the outcome. Everything after the claim runs on a spawned task,
/// so every claimed transaction ends as a `verified` or `failed` row even
/// when the caller goes away, unless the grant step hits a store failure,
/// in which case the claim is released.
#[derive(Debug, Clone)]
pub struct PaymentService {
    repo: Arc<dyn PaymentRepository>,
    chain: Arc<dyn ChainClient>,
}

impl PaymentService {
    /// Creates a new `PaymentService`.
    #[must_use]
    pub fn new(repo: Arc<dyn PaymentRepository>, chain: Arc<dyn ChainClient>) -> Self {
        Self { repo, chain }
    }

    /// Resolves a bearer token to the user it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Unauthorized`] for blank, unknown or expired
    /// tokens.
    pub async fn authenticate(&self, token: &str) -> Result<UserId, PaymentError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PaymentError::Unauthorized);
        }
        self.repo
            .session_user(token)
            .await?
            .ok_or(PaymentError::Unauthorized)
    }

    /// Determines whether the user already has access to an event, and if
    /// not, what payment joining requires.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::EventNotFound`] if the user has no access and
    /// the event does not exist.
    pub async fn resolve_payment_intent(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<PaymentIntent, PaymentError> {
        if let Some(payment) = self.repo.find_verified_payment(event_id, user_id).await? {
            return Ok(PaymentIntent::AlreadyPaid {
                transaction_id: payment.transaction_id,
                verified_at: payment.verified_at,
            });
        }

        if let Some(membership) = self.repo.find_membership(event_id, user_id).await? {
            return Ok(PaymentIntent::AlreadyMember {
                role: membership.role,
            });
        }

        let event = self.load_event(event_id).await?;
        Ok(PaymentIntent::Required(EventPaymentDetails {
            event_id: event.id,
            is_free: event.is_free(),
            amount: event.expected_amount(),
            wallet_address: event.payment_wallet().map(str::to_string),
            ticket_price: event.ticket_price,
            title: event.title,
        }))
    }

    /// Verifies a transaction the client claims pays for an event and, on
    /// success, grants the user a `member` membership.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::InvalidRequest`] for blank inputs.
    /// - [`PaymentError::EventNotFound`] / [`PaymentError::InvalidEventConfiguration`]
    ///   when the event cannot be paid for.
    /// - [`PaymentError::DuplicateTransaction`] if the transaction ID was
    ///   submitted before.
    /// - [`PaymentError::TransactionNotFound`] / [`PaymentError::ChainUnavailable`]
    ///   when the node cannot confirm the transaction.
    /// - [`PaymentError::WrongTransactionType`], [`PaymentError::MalformedTransaction`],
    ///   [`PaymentError::ReceiverMismatch`], [`PaymentError::InsufficientAmount`]
    ///   when the transaction does not pay the event.
    /// - [`PaymentError::PartialFailure`] if the payment was recorded but
    ///   the membership was not.
    pub async fn verify_payment(
        &self,
        event_id: EventId,
        user_id: UserId,
        transaction_id: &str,
        wallet_address: &str,
    ) -> Result<VerifiedPayment, PaymentError> {
        let transaction_id = transaction_id.trim();
        let wallet_address = wallet_address.trim();
        if transaction_id.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "transaction_id is required".to_string(),
            ));
        }
        if wallet_address.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "wallet_address is required".to_string(),
            ));
        }

        let event = self.load_event(event_id).await?;
        let (expected, receiver) = payment_terms(&event)?;

        let claim = EventPayment::claim(event_id, user_id, transaction_id, wallet_address);
        self.repo.claim_transaction(&claim).await?;
        tracing::debug!(
            event_id = %event_id,
            user_id = %user_id,
            tx_id = transaction_id,
            "transaction claimed"
        );

        // Settled on its own task: a dropped request must not strand the
        // claim as `pending`.
        let service = self.clone();
        let receiver = receiver.to_string();
        tokio::spawn(async move { service.settle(claim, expected, &receiver).await })
            .await
            .map_err(|e| PaymentError::Internal(format!("verification task failed: {e}")))?
    }

    /// Checks a claimed transaction and moves its row to `verified` or
    /// `failed`.
    async fn settle(
        &self,
        claim: EventPayment,
        expected: MicroAlgos,
        receiver: &str,
    ) -> Result<VerifiedPayment, PaymentError> {
        match self.check_transaction(&claim, expected, receiver).await {
            Ok(txn) => self.grant(&claim, &txn).await,
            Err(rejection) => {
                self.record_failure(&claim, rejection.observed).await;
                tracing::info!(
                    event_id = %claim.event_id,
                    tx_id = %claim.transaction_id,
                    code = rejection.error.error_code(),
                    reason = %rejection.error,
                    "payment rejected"
                );
                Err(rejection.error)
            }
        }
    }

    /// Joins a free event.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::EventNotFound`], [`PaymentError::NotFree`]
    /// for paid events, or [`PaymentError::AlreadyMember`].
    pub async fn join_free_event(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<EventMembership, PaymentError> {
        let event = self.load_event(event_id).await?;
        if !event.is_free() {
            return Err(PaymentError::NotFree(event_id));
        }
        if self.repo.find_membership(event_id, user_id).await?.is_some() {
            return Err(PaymentError::AlreadyMember(event_id));
        }

        let membership = EventMembership::member(event_id, user_id);
        match self.repo.insert_membership(&membership).await {
            Ok(()) => {
                tracing::info!(event_id = %event_id, user_id = %user_id, "joined free event");
                Ok(membership)
            }
            Err(RepositoryError::MembershipExists) => Err(PaymentError::AlreadyMember(event_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the user's payment attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PersistenceError`] on store failure.
    pub async fn list_my_payments(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PaymentRecord>, PaymentError> {
        Ok(self.repo.payments_for_user(user_id).await?)
    }

    /// Looks up an account balance.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidRequest`] for a malformed address, or
    /// [`PaymentError::ChainUnavailable`] if the node cannot be queried.
    pub async fn wallet_balance(&self, address: &str) -> Result<WalletBalance, PaymentError> {
        let address: Address = address
            .trim()
            .parse()
            .map_err(|e| PaymentError::InvalidRequest(format!("invalid wallet address: {e}")))?;
        let amount = self
            .chain
            .account_balance(&address)
            .await
            .map_err(|e| PaymentError::ChainUnavailable(e.to_string()))?;
        Ok(WalletBalance { address, amount })
    }

    async fn load_event(&self, event_id: EventId) -> Result<Event, PaymentError> {
        self.repo
            .get_event(event_id)
            .await?
            .ok_or(PaymentError::EventNotFound(event_id))
    }

    /// Fetches the claimed transaction and checks it pays `receiver` at
    /// least `expected`.
    async fn check_transaction(
        &self,
        claim: &EventPayment,
        expected: MicroAlgos,
        receiver: &str,
    ) -> Result<NormalizedPaymentTxn, Rejection> {
        let tx_id = claim.transaction_id.as_str();
        let response = self.chain.pending_transaction(tx_id).await.map_err(|e| {
            if e.is_transport() {
                tracing::warn!(tx_id, error = %e, "chain node lookup failed");
            } else {
                tracing::info!(tx_id, error = %e, "transaction not available");
            }
            PaymentError::from(e)
        })?;

        let txn = normalize_payment_txn(&response).map_err(|e| match e {
            NormalizeError::WrongType(kind) => PaymentError::WrongTransactionType(kind),
            other => PaymentError::MalformedTransaction(other.to_string()),
        })?;

        if txn.kind == TxnKind::Unspecified {
            tracing::debug!(tx_id, "transaction declares no type, checking payment fields");
        }

        if let Some(sender) = txn.sender.as_deref()
            && sender != claim.wallet_address
        {
            tracing::warn!(
                tx_id,
                sender,
                claimed = %claim.wallet_address,
                "transaction sender differs from claimed wallet"
            );
        }

        if txn.receiver.trim() != receiver {
            return Err(Rejection {
                error: PaymentError::ReceiverMismatch {
                    expected: receiver.to_string(),
                    actual: txn.receiver.clone(),
                },
                observed: Some(txn.amount),
            });
        }

        if txn.amount < expected {
            return Err(Rejection {
                error: PaymentError::InsufficientAmount {
                    expected,
                    actual: txn.amount,
                },
                observed: Some(txn.amount),
            });
        }

        Ok(txn)
    }

    async fn grant(
        &self,
        claim: &EventPayment,
        txn: &NormalizedPaymentTxn,
    ) -> Result<VerifiedPayment, PaymentError> {
        let verified_at = Utc::now();
        let membership = EventMembership::member(claim.event_id, claim.user_id);

        match self
            .repo
            .grant_paid_access(claim.id, txn.amount.to_algos(), verified_at, &membership)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    event_id = %claim.event_id,
                    user_id = %claim.user_id,
                    tx_id = %claim.transaction_id,
                    amount = txn.amount.get(),
                    "payment verified"
                );
                Ok(VerifiedPayment {
                    payment_id: claim.id,
                    transaction_id: claim.transaction_id.clone(),
                    amount: txn.amount,
                    confirmed_round: txn.confirmed_round,
                    verified_at,
                })
            }
            Err(GrantError::Payment(e)) => {
                if let Err(release) = self.repo.release_claim(claim.id).await {
                    tracing::error!(
                        tx_id = %claim.transaction_id,
                        error = %release,
                        "failed to release claim"
                    );
                }
                Err(e.into())
            }
            Err(GrantError::Membership(e)) => {
                tracing::error!(
                    event_id = %claim.event_id,
                    user_id = %claim.user_id,
                    tx_id = %claim.transaction_id,
                    error = %e,
                    "payment verified but membership grant failed"
                );
                Err(PaymentError::PartialFailure {
                    transaction_id: claim.transaction_id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn record_failure(&self, claim: &EventPayment, observed: Option<MicroAlgos>) {
        let amount = observed.map(MicroAlgos::to_algos);
        if let Err(e) = self.repo.mark_payment_failed(claim.id, amount).await {
            tracing::error!(
                tx_id = %claim.transaction_id,
                error = %e,
                "failed to record rejected payment"
            );
        }
    }
}

/// Returns the amount and receiving wallet an event requires.
fn payment_terms(event: &Event) -> Result<(MicroAlgos, &str), PaymentError> {
    let expected = event.expected_amount().ok_or_else(|| {
        PaymentError::InvalidEventConfiguration(event.id, "no positive ticket price".to_string())
    })?;
    let wallet = event.payment_wallet().ok_or_else(|| {
        PaymentError::InvalidEventConfiguration(event.id, "no payment wallet".to_string())
    })?;
    Ok((expected, wallet))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio_test::assert_ok;

    use super::*;
    use crate::chain::ChainError;
    use crate::domain::PaymentStatus;
    use crate::persistence::InMemoryRepository;

    /// Address of the all-7 public key.
    const WALLET: &str = "A4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DVZ36IB4";
    const PAYER: &str = "AAAQEAYEAUDAOCAJBIFQYDIOB4IBCEQTCQKRMFYYDENBWHA5DYP7MUPJQE";

    #[derive(Debug, Clone)]
    enum Script {
        Confirmed(Value),
        Slow(Value),
        Missing,
        Down,
    }

    #[derive(Debug, Default)]
    struct ScriptedChain {
        transactions: HashMap<String, Script>,
    }

    impl ScriptedChain {
        fn with(mut self, tx_id: &str, script: Script) -> Self {
            self.transactions.insert(tx_id.to_string(), script);
            self
        }
    }

    #[async_trait]
    impl ChainClient for ScriptedChain {
        async fn pending_transaction(&self, tx_id: &str) -> Result<Value, ChainError> {
            match self.transactions.get(tx_id) {
                Some(Script::Confirmed(v)) => Ok(v.clone()),
                Some(Script::Slow(v)) => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(v.clone())
                }
                Some(Script::Down) => Err(ChainError::Unavailable("connection refused".into())),
                Some(Script::Missing) | None => {
                    Err(ChainError::TransactionNotFound(tx_id.to_string()))
                }
            }
        }

        async fn account_balance(&self, _address: &Address) -> Result<MicroAlgos, ChainError> {
            Ok(MicroAlgos::new(12_345_678))
        }
    }

    /// Repository whose membership inserts always fail and which keeps the
    /// non-transactional grant.
    #[derive(Debug, Default)]
    struct BrokenMembershipRepo {
        inner: InMemoryRepository,
    }

    #[async_trait]
    impl PaymentRepository for BrokenMembershipRepo {
        async fn session_user(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
            self.inner.session_user(token).await
        }
        async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, RepositoryError> {
            self.inner.get_event(event_id).await
        }
        async fn find_verified_payment(
            &self,
            event_id: EventId,
            user_id: UserId,
        ) -> Result<Option<EventPayment>, RepositoryError> {
            self.inner.find_verified_payment(event_id, user_id).await
        }
        async fn find_membership(
            &self,
            event_id: EventId,
            user_id: UserId,
        ) -> Result<Option<EventMembership>, RepositoryError> {
            self.inner.find_membership(event_id, user_id).await
        }
        async fn insert_membership(&self, _: &EventMembership) -> Result<(), RepositoryError> {
            Err(RepositoryError::Database("connection reset".to_string()))
        }
        async fn claim_transaction(&self, payment: &EventPayment) -> Result<(), RepositoryError> {
            self.inner.claim_transaction(payment).await
        }
        async fn mark_payment_failed(
            &self,
            payment_id: PaymentId,
            amount: Option<Decimal>,
        ) -> Result<(), RepositoryError> {
            self.inner.mark_payment_failed(payment_id, amount).await
        }
        async fn mark_payment_verified(
            &self,
            payment_id: PaymentId,
            amount: Decimal,
            verified_at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            self.inner
                .mark_payment_verified(payment_id, amount, verified_at)
                .await
        }
        async fn release_claim(&self, payment_id: PaymentId) -> Result<(), RepositoryError> {
            self.inner.release_claim(payment_id).await
        }
        async fn payments_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<PaymentRecord>, RepositoryError> {
            self.inner.payments_for_user(user_id).await
        }
    }

    fn pay(amount: u64, receiver: &str) -> Value {
        json!({
            "confirmed-round": 1234,
            "txn": { "txn": { "type": "pay", "amt": amount, "rcv": receiver, "snd": PAYER } }
        })
    }

    fn paying(tx_id: &str, amount: u64) -> ScriptedChain {
        ScriptedChain::default().with(tx_id, Script::Confirmed(pay(amount, WALLET)))
    }

    fn paid_event(price: Decimal) -> Event {
        Event {
            id: EventId::new(),
            title: "Blockchain Summit".to_string(),
            ticket_price: Some(price),
            wallet_address: Some(WALLET.to_string()),
            owner_id: UserId::new(),
        }
    }

    async fn setup(
        event: &Event,
        chain: ScriptedChain,
    ) -> (Arc<InMemoryRepository>, PaymentService) {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_event(event.clone()).await;
        let shared = Arc::clone(&repo);
        let service = PaymentService::new(shared, Arc::new(chain));
        (repo, service)
    }

    #[tokio::test]
    async fn exact_amount_is_verified_and_grants_membership() {
        let event = paid_event(Decimal::from(5));
        let chain = paying("TX-OK", 5_000_000);
        let (repo, service) = setup(&event, chain).await;
        let user = UserId::new();

        let Ok(verified) = service.verify_payment(event.id, user, "TX-OK", PAYER).await else {
            panic!("expected verification to succeed");
        };
        assert_eq!(verified.amount, MicroAlgos::new(5_000_000));
        assert_eq!(verified.confirmed_round, Some(1234));

        let payments = repo.payments().await;
        let Some(row) = payments.first() else {
            panic!("expected payment row");
        };
        assert_eq!(row.status, PaymentStatus::Verified);
        assert_eq!(row.amount, Some(Decimal::from(5)));
        assert!(row.verified_at.is_some());

        let Ok(Some(m)) = repo.find_membership(event.id, user).await else {
            panic!("expected membership");
        };
        assert_eq!(m.role, MembershipRole::Member);
    }

    #[tokio::test]
    async fn one_micro_algo_short_is_insufficient() {
        let event = paid_event(Decimal::from(5));
        let chain = paying("TX-LOW", 4_999_999);
        let (repo, service) = setup(&event, chain).await;
        let user = UserId::new();

        let result = service.verify_payment(event.id, user, "TX-LOW", PAYER).await;
        let Err(PaymentError::InsufficientAmount { expected, actual }) = result else {
            panic!("expected InsufficientAmount, got {result:?}");
        };
        assert_eq!(expected, MicroAlgos::new(5_000_000));
        assert_eq!(actual, MicroAlgos::new(4_999_999));

        let payments = repo.payments().await;
        let Some(row) = payments.first() else {
            panic!("expected payment row");
        };
        assert_eq!(row.status, PaymentStatus::Failed);
        assert_eq!(row.amount, Some(Decimal::new(4_999_999, 6)));
        assert!(repo.memberships().await.is_empty());
    }

    #[tokio::test]
    async fn fractional_price_rounds_up_to_whole_micro_algo() {
        let event = paid_event(Decimal::new(10_000_005, 7));
        let chain = ScriptedChain::default()
            .with("TX-A", Script::Confirmed(pay(1_000_000, WALLET)))
            .with("TX-B", Script::Confirmed(pay(1_000_001, WALLET)));
        let (_repo, service) = setup(&event, chain).await;

        let short = service.verify_payment(event.id, UserId::new(), "TX-A", PAYER).await;
        assert!(matches!(short, Err(PaymentError::InsufficientAmount { .. })));
        assert_ok!(service.verify_payment(event.id, UserId::new(), "TX-B", PAYER).await);
    }

    #[tokio::test]
    async fn receiver_differing_in_case_is_rejected() {
        let event = paid_event(Decimal::from(1));
        let lower = WALLET.to_lowercase();
        let chain =
            ScriptedChain::default().with("TX-CASE", Script::Confirmed(pay(1_000_000, &lower)));
        let (repo, service) = setup(&event, chain).await;

        let result = service.verify_payment(event.id, UserId::new(), "TX-CASE", PAYER).await;
        assert!(matches!(result, Err(PaymentError::ReceiverMismatch { .. })));
        let payments = repo.payments().await;
        assert_eq!(payments.first().map(|p| p.status), Some(PaymentStatus::Failed));
    }

    #[tokio::test]
    async fn lookup_failure_records_failed_row_without_membership() {
        let event = paid_event(Decimal::from(5));
        let chain = ScriptedChain::default().with("TX-GONE", Script::Missing);
        let (repo, service) = setup(&event, chain).await;

        let result = service.verify_payment(event.id, UserId::new(), "TX-GONE", PAYER).await;
        assert!(
            matches!(result, Err(PaymentError::TransactionNotFound(ref id)) if id == "TX-GONE")
        );

        let payments = repo.payments().await;
        let Some(row) = payments.first() else {
            panic!("expected payment row");
        };
        assert_eq!(row.status, PaymentStatus::Failed);
        assert_eq!(row.amount, None);
        assert!(repo.memberships().await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_node_is_reported_as_chain_unavailable() {
        let event = paid_event(Decimal::from(5));
        let chain = ScriptedChain::default().with("TX-DOWN", Script::Down);
        let (repo, service) = setup(&event, chain).await;

        let result = service.verify_payment(event.id, UserId::new(), "TX-DOWN", PAYER).await;
        assert!(matches!(result, Err(PaymentError::ChainUnavailable(_))));
        let payments = repo.payments().await;
        assert_eq!(payments.first().map(|p| p.status), Some(PaymentStatus::Failed));
    }

    #[tokio::test]
    async fn transaction_id_is_single_use() {
        let event = paid_event(Decimal::from(5));
        let chain = paying("TX-ONCE", 5_000_000);
        let (repo, service) = setup(&event, chain).await;

        assert_ok!(service.verify_payment(event.id, UserId::new(), "TX-ONCE", PAYER).await);
        let second = service.verify_payment(event.id, UserId::new(), " TX-ONCE ", PAYER).await;
        assert!(matches!(second, Err(PaymentError::DuplicateTransaction(_))));

        let verified = repo
            .payments()
            .await
            .iter()
            .filter(|p| p.status == PaymentStatus::Verified)
            .count();
        assert_eq!(verified, 1);
    }

    #[tokio::test]
    async fn abandoned_request_still_settles_its_claim() {
        let event = paid_event(Decimal::from(5));
        let chain = ScriptedChain::default()
            .with("TX-SLOW", Script::Slow(pay(5_000_000, WALLET)));
        let (repo, service) = setup(&event, chain).await;
        let user = UserId::new();

        let cut_short = tokio::time::timeout(
            Duration::from_millis(50),
            service.verify_payment(event.id, user, "TX-SLOW", PAYER),
        )
        .await;
        assert!(cut_short.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let payments = repo.payments().await;
        assert_eq!(payments.first().map(|p| p.status), Some(PaymentStatus::Verified));
        let Ok(Some(_)) = repo.find_membership(event.id, user).await else {
            panic!("expected membership");
        };
        let intent = service.resolve_payment_intent(event.id, user).await;
        assert!(matches!(intent, Ok(PaymentIntent::AlreadyPaid { .. })));
    }

    #[tokio::test]
    async fn non_payment_transaction_is_wrong_type() {
        let event = paid_event(Decimal::from(5));
        let axfer = json!({
            "confirmed-round": 9,
            "txn": { "txn": { "type": "axfer", "aamt": 5 } }
        });
        let chain = ScriptedChain::default().with("TX-AXFER", Script::Confirmed(axfer));
        let (_repo, service) = setup(&event, chain).await;

        let result = service.verify_payment(event.id, UserId::new(), "TX-AXFER", PAYER).await;
        assert!(matches!(result, Err(PaymentError::WrongTransactionType(ref k)) if k == "axfer"));
    }

    #[tokio::test]
    async fn missing_receiver_is_malformed() {
        let event = paid_event(Decimal::from(5));
        let body = json!({
            "confirmed-round": 9,
            "txn": { "txn": { "type": "pay", "amt": 5_000_000 } }
        });
        let chain = ScriptedChain::default().with("TX-NORCV", Script::Confirmed(body));
        let (_repo, service) = setup(&event, chain).await;

        let result = service.verify_payment(event.id, UserId::new(), "TX-NORCV", PAYER).await;
        assert!(matches!(result, Err(PaymentError::MalformedTransaction(_))));
    }

    #[tokio::test]
    async fn unconfigured_event_is_rejected_before_claiming() {
        let mut event = paid_event(Decimal::from(5));
        event.wallet_address = Some("  ".to_string());
        let (repo, service) = setup(&event, ScriptedChain::default()).await;

        let result = service.verify_payment(event.id, UserId::new(), "TX-1", PAYER).await;
        assert!(matches!(result, Err(PaymentError::InvalidEventConfiguration(..))));

        let free = Event {
            ticket_price: None,
            ..paid_event(Decimal::ZERO)
        };
        repo.insert_event(free.clone()).await;
        let result = service.verify_payment(free.id, UserId::new(), "TX-2", PAYER).await;
        assert!(matches!(result, Err(PaymentError::InvalidEventConfiguration(..))));
        assert!(repo.payments().await.is_empty());
    }

    #[tokio::test]
    async fn blank_inputs_are_invalid() {
        let event = paid_event(Decimal::from(5));
        let (_repo, service) = setup(&event, ScriptedChain::default()).await;

        let result = service.verify_payment(event.id, UserId::new(), "  ", PAYER).await;
        assert!(matches!(result, Err(PaymentError::InvalidRequest(_))));
        let result = service.verify_payment(event.id, UserId::new(), "TX", "").await;
        assert!(matches!(result, Err(PaymentError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let event = paid_event(Decimal::from(5));
        let (_repo, service) = setup(&event, ScriptedChain::default()).await;

        let missing = EventId::new();
        let result = service.verify_payment(missing, UserId::new(), "TX", PAYER).await;
        assert!(matches!(result, Err(PaymentError::EventNotFound(id)) if id == missing));
        let result = service.resolve_payment_intent(missing, UserId::new()).await;
        assert!(matches!(result, Err(PaymentError::EventNotFound(_))));
    }

    #[tokio::test]
    async fn membership_failure_after_verification_is_partial() {
        let event = paid_event(Decimal::from(5));
        let repo = Arc::new(BrokenMembershipRepo::default());
        repo.inner.insert_event(event.clone()).await;
        let chain = paying("TX-P", 5_000_000);
        let shared = Arc::clone(&repo);
        let service = PaymentService::new(shared, Arc::new(chain));

        let result = service.verify_payment(event.id, UserId::new(), "TX-P", PAYER).await;
        let Err(err) = result else {
            panic!("expected partial failure");
        };
        assert!(matches!(
            err,
            PaymentError::PartialFailure { ref transaction_id, .. } if transaction_id == "TX-P"
        ));

        let payments = repo.inner.payments().await;
        assert_eq!(payments.first().map(|p| p.status), Some(PaymentStatus::Verified));
        assert!(repo.inner.memberships().await.is_empty());
    }

    #[tokio::test]
    async fn existing_membership_still_counts_as_granted() {
        let event = paid_event(Decimal::from(5));
        let chain = paying("TX-M", 5_000_000);
        let (repo, service) = setup(&event, chain).await;
        let user = UserId::new();
        assert_ok!(repo.insert_membership(&EventMembership::member(event.id, user)).await);

        assert_ok!(service.verify_payment(event.id, user, "TX-M", PAYER).await);
        assert_eq!(repo.memberships().await.len(), 1);
    }

    #[tokio::test]
    async fn intent_reports_price_then_paid() {
        let event = paid_event(Decimal::new(25, 1));
        let chain = paying("TX-I", 2_500_000);
        let (_repo, service) = setup(&event, chain).await;
        let user = UserId::new();

        let intent = service.resolve_payment_intent(event.id, user).await;
        let Ok(PaymentIntent::Required(details)) = intent else {
            panic!("expected payment details");
        };
        assert!(!details.is_free);
        assert_eq!(details.amount, Some(MicroAlgos::new(2_500_000)));
        assert_eq!(details.wallet_address.as_deref(), Some(WALLET));

        assert_ok!(service.verify_payment(event.id, user, "TX-I", PAYER).await);
        let intent = service.resolve_payment_intent(event.id, user).await;
        assert!(matches!(
            intent,
            Ok(PaymentIntent::AlreadyPaid { ref transaction_id, .. }) if transaction_id == "TX-I"
        ));
    }

    #[tokio::test]
    async fn intent_reports_existing_role() {
        let event = paid_event(Decimal::from(5));
        let (repo, service) = setup(&event, ScriptedChain::default()).await;
        let user = UserId::new();
        let owner = EventMembership {
            role: MembershipRole::Owner,
            ..EventMembership::member(event.id, user)
        };
        assert_ok!(repo.insert_membership(&owner).await);

        let intent = service.resolve_payment_intent(event.id, user).await;
        assert!(matches!(
            intent,
            Ok(PaymentIntent::AlreadyMember {
                role: MembershipRole::Owner
            })
        ));
    }

    #[tokio::test]
    async fn free_event_join_is_idempotent_per_user() {
        let event = Event {
            ticket_price: Some(Decimal::ZERO),
            wallet_address: None,
            ..paid_event(Decimal::ZERO)
        };
        let (repo, service) = setup(&event, ScriptedChain::default()).await;
        let user = UserId::new();

        assert_ok!(service.join_free_event(event.id, user).await);
        let again = service.join_free_event(event.id, user).await;
        assert!(matches!(again, Err(PaymentError::AlreadyMember(_))));
        assert_eq!(repo.memberships().await.len(), 1);
    }

    #[tokio::test]
    async fn paid_event_cannot_be_joined_for_free() {
        let event = paid_event(Decimal::from(5));
        let (repo, service) = setup(&event, ScriptedChain::default()).await;

        let result = service.join_free_event(event.id, UserId::new()).await;
        assert!(matches!(result, Err(PaymentError::NotFree(_))));
        assert!(repo.memberships().await.is_empty());
    }

    #[tokio::test]
    async fn history_includes_failed_attempts() {
        let event = paid_event(Decimal::from(5));
        let chain = ScriptedChain::default()
            .with("TX-1", Script::Missing)
            .with("TX-2", Script::Confirmed(pay(5_000_000, WALLET)));
        let (_repo, service) = setup(&event, chain).await;
        let user = UserId::new();

        let _ = service.verify_payment(event.id, user, "TX-1", PAYER).await;
        assert_ok!(service.verify_payment(event.id, user, "TX-2", PAYER).await);

        let Ok(history) = service.list_my_payments(user).await else {
            panic!("history failed");
        };
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.event_title.as_deref() == Some("Blockchain Summit")));
    }

    #[tokio::test]
    async fn authenticate_requires_known_token() {
        let event = paid_event(Decimal::from(5));
        let (repo, service) = setup(&event, ScriptedChain::default()).await;
        let user = UserId::new();
        repo.insert_session("secret", user).await;

        assert!(matches!(service.authenticate("secret").await, Ok(u) if u == user));
        assert!(matches!(service.authenticate("nope").await, Err(PaymentError::Unauthorized)));
        assert!(matches!(service.authenticate(" ").await, Err(PaymentError::Unauthorized)));
    }

    #[tokio::test]
    async fn wallet_balance_validates_address() {
        let event = paid_event(Decimal::from(5));
        let (_repo, service) = setup(&event, ScriptedChain::default()).await;

        let Ok(balance) = service.wallet_balance(WALLET).await else {
            panic!("expected balance");
        };
        assert_eq!(balance.amount, MicroAlgos::new(12_345_678));
        assert_eq!(balance.address.encode(), WALLET);

        let result = service.wallet_balance("not-an-address").await;
        assert!(matches!(result, Err(PaymentError::InvalidRequest(_))));
    }
}
