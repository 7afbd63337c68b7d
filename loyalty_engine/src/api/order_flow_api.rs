use std::{fmt::Debug, time::Duration};

use accrual_client::{AccrualGateway, AccrualPoll, AccrualStatus};
use log::{debug, trace, warn};

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatus},
    helpers::luhn_valid,
    traits::{OrderApiError, OrderManagement},
};

/// The result of an order upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// A new order row was created.
    Accepted(Order),
    /// The same user already uploaded this number. Idempotent; nothing was written.
    AlreadyUploaded,
}

/// Summary of one reconciliation pass over the unsettled orders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Orders polled against the accrual service this tick.
    pub polled: usize,
    /// Orders whose status or accrual changed.
    pub updated: usize,
    /// Orders that reached a terminal state this tick.
    pub settled: usize,
    /// Set when the accrual service demanded a back-off and the tick was abandoned early.
    pub rate_limited: bool,
    /// The service's `Retry-After` hint, when it sent one.
    pub retry_after: Option<Duration>,
}

/// Order intake and the reconciliation pass.
///
/// `B` is the storage backend, `C` the accrual service gateway; both are trait objects in spirit so tests
/// can substitute mocks.
pub struct OrderFlowApi<B, C> {
    db: B,
    accrual: C,
}

impl<B, C> Debug for OrderFlowApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, C> OrderFlowApi<B, C> {
    pub fn new(db: B, accrual: C) -> Self {
        Self { db, accrual }
    }
}

impl<B, C> OrderFlowApi<B, C>
where
    B: OrderManagement,
    C: AccrualGateway,
{
    /// Takes a new order number from a user.
    ///
    /// The number must pass the Luhn check and must not belong to another user. A single advisory probe of
    /// the accrual service seeds the initial status; any probe failure falls back to `NEW` and never blocks
    /// intake, since the reconciler catches up on its next tick.
    pub async fn upload_order(&self, number: &str, user_id: i64) -> Result<UploadOutcome, OrderApiError> {
        if !luhn_valid(number) {
            return Err(OrderApiError::InvalidOrderNumber);
        }
        let number = OrderNumber::from(number);
        match self.db.fetch_order_owner(&number).await? {
            Some(owner) if owner == user_id => {
                trace!("🔄️📦️ Order [{number}] re-uploaded by its owner #{user_id}");
                return Ok(UploadOutcome::AlreadyUploaded);
            },
            Some(_) => return Err(OrderApiError::OwnedByAnotherUser(number)),
            None => {},
        }
        let status = self.probe_initial_status(&number).await;
        let order = NewOrder::new(number.clone(), status, user_id);
        match self.db.insert_order(order).await {
            Ok(order) => {
                debug!("🔄️📦️ Order [{number}] accepted as {status} for user #{user_id}");
                Ok(UploadOutcome::Accepted(order))
            },
            // Lost an insert race. Re-resolve ownership so the caller gets the same answer it would have
            // gotten had the other request finished first.
            Err(OrderApiError::DuplicateOrder(_)) => match self.db.fetch_order_owner(&number).await? {
                Some(owner) if owner == user_id => Ok(UploadOutcome::AlreadyUploaded),
                _ => Err(OrderApiError::OwnedByAnotherUser(number)),
            },
            Err(e) => Err(e),
        }
    }

    /// One advisory poll of the accrual service at intake.
    ///
    /// A probe that already reports `PROCESSED` is stored as `PROCESSING`: the settlement transaction driven
    /// by [`reconcile_once`](Self::reconcile_once) is the only code path allowed to write an accrual and
    /// credit the owner, so the terminal transition is deferred to the next tick.
    async fn probe_initial_status(&self, number: &OrderNumber) -> OrderStatus {
        match self.accrual.order_status(number.as_str()).await {
            Ok(AccrualPoll::Known(state)) => match state.status {
                AccrualStatus::Registered => OrderStatus::New,
                AccrualStatus::Processing | AccrualStatus::Processed => OrderStatus::Processing,
                AccrualStatus::Invalid => OrderStatus::Invalid,
            },
            Ok(_) => OrderStatus::New,
            Err(e) => {
                warn!("🔄️📦️ Accrual probe for [{number}] failed, storing as NEW. {e}");
                OrderStatus::New
            },
        }
    }

    /// All orders for the given user, newest first.
    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderApiError> {
        self.db.fetch_orders_for_user(user_id).await
    }

    /// One reconciliation pass: polls the accrual service for every unsettled order, oldest first, and
    /// applies any changes through the settlement transaction.
    ///
    /// A rate-limit response abandons the remainder of the tick and reports the service's `Retry-After`
    /// hint so the caller can delay the next pass. Transport errors skip the affected order only.
    pub async fn reconcile_once(&self) -> Result<TickOutcome, OrderApiError> {
        let unsettled = self.db.fetch_unsettled_orders().await?;
        let mut outcome = TickOutcome::default();
        for order in unsettled {
            match self.accrual.order_status(order.number.as_str()).await {
                Err(e) => {
                    warn!("🔄️🧮️ Could not poll accrual status for [{}]: {e}", order.number);
                    outcome.polled += 1;
                },
                Ok(AccrualPoll::Unknown) => {
                    trace!("🔄️🧮️ Accrual service does not know order [{}] yet", order.number);
                    outcome.polled += 1;
                },
                Ok(AccrualPoll::RateLimited(hint)) => {
                    warn!("🔄️🧮️ Accrual service is rate limiting. Abandoning the rest of this tick.");
                    outcome.rate_limited = true;
                    outcome.retry_after = hint;
                    break;
                },
                Ok(AccrualPoll::Known(state)) => {
                    outcome.polled += 1;
                    let new_status = match state.status {
                        AccrualStatus::Registered => OrderStatus::New,
                        AccrualStatus::Processing => OrderStatus::Processing,
                        AccrualStatus::Processed => OrderStatus::Processed,
                        AccrualStatus::Invalid => OrderStatus::Invalid,
                    };
                    // An accrual only ever accompanies PROCESSED; anything else would break the row
                    // invariant, so it is dropped here no matter what the service sent.
                    let new_accrual =
                        if new_status == OrderStatus::Processed { state.accrual } else { None };
                    if new_status == order.status && new_accrual == order.accrual {
                        continue;
                    }
                    match self.db.settle_order(&order.number, new_status, new_accrual).await {
                        Ok(Some(updated)) => {
                            outcome.updated += 1;
                            if updated.status.is_terminal() {
                                outcome.settled += 1;
                            }
                        },
                        Ok(None) => {},
                        Err(e) => {
                            warn!("🔄️🧮️ Could not settle order [{}]: {e}", order.number);
                        },
                    }
                },
            }
        }
        debug!(
            "🔄️🧮️ Reconciliation tick complete. {} polled, {} updated, {} settled",
            outcome.polled, outcome.updated, outcome.settled
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use accrual_client::{AccrualApiError, AccrualOrderState};
    use chrono::Utc;
    use lpg_common::Points;
    use mockall::{mock, predicate::eq};

    use super::*;

    mock! {
        pub OrderDb {}
        impl OrderManagement for OrderDb {
            async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderApiError>;
            async fn fetch_order_owner(&self, number: &OrderNumber) -> Result<Option<i64>, OrderApiError>;
            async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderApiError>;
            async fn fetch_unsettled_orders(&self) -> Result<Vec<Order>, OrderApiError>;
            async fn settle_order(
                &self,
                number: &OrderNumber,
                status: OrderStatus,
                accrual: Option<Points>,
            ) -> Result<Option<Order>, OrderApiError>;
        }
    }

    mock! {
        pub Accrual {}
        impl AccrualGateway for Accrual {
            async fn order_status(&self, number: &str) -> Result<AccrualPoll, AccrualApiError>;
        }
    }

    const VALID_NUMBER: &str = "12345678903";

    fn order(number: &str, status: OrderStatus, accrual: Option<Points>, user_id: i64) -> Order {
        Order { number: OrderNumber::from(number), status, accrual, uploaded_at: Utc::now(), user_id }
    }

    fn known(status: AccrualStatus, accrual: Option<Points>) -> AccrualPoll {
        AccrualPoll::Known(AccrualOrderState { order: VALID_NUMBER.to_string(), status, accrual })
    }

    #[tokio::test]
    async fn upload_rejects_bad_checksums_before_any_io() {
        let api = OrderFlowApi::new(MockOrderDb::new(), MockAccrual::new());
        let err = api.upload_order("1234567890", 1).await.unwrap_err();
        assert!(matches!(err, OrderApiError::InvalidOrderNumber));
    }

    #[tokio::test]
    async fn upload_is_idempotent_for_the_owner() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_order_owner().returning(|_| Ok(Some(7)));
        db.expect_insert_order().never();
        let api = OrderFlowApi::new(db, MockAccrual::new());
        let outcome = api.upload_order(VALID_NUMBER, 7).await.unwrap();
        assert_eq!(outcome, UploadOutcome::AlreadyUploaded);
    }

    #[tokio::test]
    async fn upload_rejects_a_number_owned_by_someone_else() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_order_owner().returning(|_| Ok(Some(3)));
        let api = OrderFlowApi::new(db, MockAccrual::new());
        let err = api.upload_order(VALID_NUMBER, 7).await.unwrap_err();
        assert!(matches!(err, OrderApiError::OwnedByAnotherUser(_)));
    }

    #[tokio::test]
    async fn probe_failure_never_blocks_intake() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_order_owner().returning(|_| Ok(None));
        db.expect_insert_order()
            .withf(|o| o.status == OrderStatus::New)
            .returning(|o| Ok(order(o.number.as_str(), o.status, None, o.user_id)));
        let mut accrual = MockAccrual::new();
        accrual
            .expect_order_status()
            .returning(|_| Err(AccrualApiError::Transport("connection refused".to_string())));
        let api = OrderFlowApi::new(db, accrual);
        let outcome = api.upload_order(VALID_NUMBER, 7).await.unwrap();
        assert!(matches!(outcome, UploadOutcome::Accepted(_)));
    }

    #[tokio::test]
    async fn probe_seeds_interim_statuses() {
        for (poll, expected) in [
            (known(AccrualStatus::Registered, None), OrderStatus::New),
            (known(AccrualStatus::Processing, None), OrderStatus::Processing),
            (known(AccrualStatus::Invalid, None), OrderStatus::Invalid),
            (AccrualPoll::Unknown, OrderStatus::New),
            (AccrualPoll::RateLimited(None), OrderStatus::New),
        ] {
            let mut db = MockOrderDb::new();
            db.expect_fetch_order_owner().returning(|_| Ok(None));
            db.expect_insert_order()
                .withf(move |o| o.status == expected)
                .returning(|o| Ok(order(o.number.as_str(), o.status, None, o.user_id)));
            let mut accrual = MockAccrual::new();
            let poll = poll.clone();
            accrual.expect_order_status().returning(move |_| Ok(poll.clone()));
            let api = OrderFlowApi::new(db, accrual);
            api.upload_order(VALID_NUMBER, 7).await.unwrap();
        }
    }

    #[tokio::test]
    async fn probe_reporting_processed_defers_settlement_to_the_reconciler() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_order_owner().returning(|_| Ok(None));
        db.expect_insert_order()
            .withf(|o| o.status == OrderStatus::Processing)
            .returning(|o| Ok(order(o.number.as_str(), o.status, None, o.user_id)));
        db.expect_settle_order().never();
        let mut accrual = MockAccrual::new();
        accrual
            .expect_order_status()
            .returning(|_| Ok(known(AccrualStatus::Processed, Some(Points::from_points(500)))));
        let api = OrderFlowApi::new(db, accrual);
        let outcome = api.upload_order(VALID_NUMBER, 7).await.unwrap();
        let UploadOutcome::Accepted(order) = outcome else { panic!("expected acceptance") };
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(order.accrual.is_none());
    }

    #[tokio::test]
    async fn losing_an_insert_race_resolves_to_the_winner() {
        let mut db = MockOrderDb::new();
        let mut owners = vec![Ok(Some(3)), Ok(None)];
        db.expect_fetch_order_owner().returning(move |_| owners.pop().unwrap());
        db.expect_insert_order()
            .returning(|o| Err(OrderApiError::DuplicateOrder(o.number)));
        let mut accrual = MockAccrual::new();
        accrual.expect_order_status().returning(|_| Ok(AccrualPoll::Unknown));
        let api = OrderFlowApi::new(db, accrual);
        let err = api.upload_order(VALID_NUMBER, 7).await.unwrap_err();
        assert!(matches!(err, OrderApiError::OwnedByAnotherUser(_)));
    }

    #[tokio::test]
    async fn reconcile_settles_processed_orders_with_their_accrual() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_unsettled_orders()
            .returning(|| Ok(vec![order(VALID_NUMBER, OrderStatus::Processing, None, 7)]));
        db.expect_settle_order()
            .with(
                eq(OrderNumber::from(VALID_NUMBER)),
                eq(OrderStatus::Processed),
                eq(Some(Points::from_points(500))),
            )
            .returning(|n, s, a| Ok(Some(order(n.as_str(), s, a, 7))));
        let mut accrual = MockAccrual::new();
        accrual
            .expect_order_status()
            .returning(|_| Ok(known(AccrualStatus::Processed, Some(Points::from_points(500)))));
        let api = OrderFlowApi::new(db, accrual);
        let outcome = api.reconcile_once().await.unwrap();
        assert_eq!(outcome.polled, 1);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.settled, 1);
        assert!(!outcome.rate_limited);
    }

    #[tokio::test]
    async fn reconcile_normalises_registered_to_new_and_skips_no_ops() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_unsettled_orders()
            .returning(|| Ok(vec![order(VALID_NUMBER, OrderStatus::New, None, 7)]));
        db.expect_settle_order().never();
        let mut accrual = MockAccrual::new();
        accrual.expect_order_status().returning(|_| Ok(known(AccrualStatus::Registered, None)));
        let api = OrderFlowApi::new(db, accrual);
        let outcome = api.reconcile_once().await.unwrap();
        assert_eq!(outcome.polled, 1);
        assert_eq!(outcome.updated, 0);
    }

    #[tokio::test]
    async fn rate_limiting_abandons_the_rest_of_the_tick() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_unsettled_orders().returning(|| {
            Ok(vec![
                order("79927398713", OrderStatus::New, None, 7),
                order(VALID_NUMBER, OrderStatus::New, None, 7),
            ])
        });
        db.expect_settle_order().never();
        let mut accrual = MockAccrual::new();
        accrual
            .expect_order_status()
            .times(1)
            .returning(|_| Ok(AccrualPoll::RateLimited(Some(Duration::from_secs(30)))));
        let api = OrderFlowApi::new(db, accrual);
        let outcome = api.reconcile_once().await.unwrap();
        assert!(outcome.rate_limited);
        assert_eq!(outcome.retry_after, Some(Duration::from_secs(30)));
        assert_eq!(outcome.polled, 0);
    }

    #[tokio::test]
    async fn transport_errors_skip_only_the_affected_order() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_unsettled_orders().returning(|| {
            Ok(vec![
                order("79927398713", OrderStatus::Processing, None, 7),
                order(VALID_NUMBER, OrderStatus::Processing, None, 7),
            ])
        });
        db.expect_settle_order()
            .with(eq(OrderNumber::from(VALID_NUMBER)), eq(OrderStatus::Invalid), eq(None::<Points>))
            .returning(|n, s, a| Ok(Some(order(n.as_str(), s, a, 7))));
        let mut accrual = MockAccrual::new();
        let mut responses = vec![
            Ok(AccrualPoll::Known(AccrualOrderState {
                order: VALID_NUMBER.to_string(),
                status: AccrualStatus::Invalid,
                accrual: None,
            })),
            Err(AccrualApiError::Transport("timed out".to_string())),
        ];
        accrual.expect_order_status().returning(move |_| responses.pop().unwrap());
        let api = OrderFlowApi::new(db, accrual);
        let outcome = api.reconcile_once().await.unwrap();
        assert_eq!(outcome.polled, 2);
        assert_eq!(outcome.settled, 1);
    }

    #[tokio::test]
    async fn settling_an_already_terminal_order_is_a_no_op() {
        let mut db = MockOrderDb::new();
        db.expect_fetch_unsettled_orders()
            .returning(|| Ok(vec![order(VALID_NUMBER, OrderStatus::Processing, None, 7)]));
        db.expect_settle_order().returning(|_, _, _| Ok(None));
        let mut accrual = MockAccrual::new();
        accrual
            .expect_order_status()
            .returning(|_| Ok(known(AccrualStatus::Processed, Some(Points::from_points(500)))));
        let api = OrderFlowApi::new(db, accrual);
        let outcome = api.reconcile_once().await.unwrap();
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.settled, 0);
    }
}
