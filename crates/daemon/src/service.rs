//! Settlement orchestrator
//!
//! Acknowledges a trade immediately, then runs the post-trade actions as
//! independent background tasks:
//!
//! 1. revenue distribution (always dispatched, skipped by a disabled gateway)
//! 2. signal submission (only when the signal gateway is enabled)
//!
//! A failure or panic in either task is logged at the task boundary and never
//! reaches the caller or the other task.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tradegate_core::{AgentId, ChainKind, DistributionAmount, TradeAck, TradeCommand};
use tradegate_settlement::{ChainGateway, DispatchOutcome, GatewayAction, SettlementError};

/// How one post-trade action ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed { chain: ChainKind, tx: String },
    /// Gateway disabled, nothing was sent
    Skipped,
    Failed(String),
}

impl ActionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }
}

/// Outcomes of both actions for one trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTradeReport {
    pub distribution: ActionOutcome,
    pub signal: ActionOutcome,
}

/// Handles to the background actions of one trade.
///
/// Dropping this detaches the tasks; they still run to completion.
#[derive(Debug)]
pub struct PostTradeActions {
    distribution: JoinHandle<ActionOutcome>,
    signal: Option<JoinHandle<ActionOutcome>>,
}

impl PostTradeActions {
    /// Wait for both actions.
    pub async fn join(self) -> PostTradeReport {
        let distribution = joined(self.distribution.await);
        let signal = match self.signal {
            Some(handle) => joined(handle.await),
            None => ActionOutcome::Skipped,
        };
        PostTradeReport { distribution, signal }
    }
}

fn joined(result: Result<ActionOutcome, tokio::task::JoinError>) -> ActionOutcome {
    result.unwrap_or_else(|e| ActionOutcome::Failed(format!("task aborted: {}", e)))
}

pub struct SettlementOrchestrator {
    amount: DistributionAmount,
    distribution: Arc<ChainGateway>,
    signal: Arc<ChainGateway>,
}

impl SettlementOrchestrator {
    pub fn new(amount: DistributionAmount, distribution: ChainGateway, signal: ChainGateway) -> Self {
        Self {
            amount,
            distribution: Arc::new(distribution),
            signal: Arc::new(signal),
        }
    }

    pub fn amount(&self) -> DistributionAmount {
        self.amount
    }

    pub fn distribution_gateway(&self) -> &ChainGateway {
        &self.distribution
    }

    pub fn signal_gateway(&self) -> &ChainGateway {
        &self.signal
    }

    /// Acknowledge the trade and start its post-trade actions.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute_trade(&self, command: TradeCommand) -> TradeAck {
        let (ack, _actions) = self.execute_trade_tracked(command);
        ack
    }

    /// Like [`execute_trade`](Self::execute_trade), also returning handles to
    /// the background actions.
    pub fn execute_trade_tracked(&self, command: TradeCommand) -> (TradeAck, PostTradeActions) {
        let ack = TradeAck::new(&command, Utc::now());
        let command = Arc::new(command);
        let reference = command.trade_reference();

        let distribution = {
            let gateway = self.distribution.clone();
            let command = command.clone();
            let amount = self.amount;
            spawn_isolated(
                GatewayAction::Distribution,
                command.agent_id,
                command.trade_id.clone(),
                async move {
                    gateway
                        .distribute(
                            command.agent_id,
                            &amount,
                            &reference,
                            command.recipient_override.as_deref(),
                        )
                        .await
                },
            )
        };

        let signal = if self.signal.is_enabled() {
            let gateway = self.signal.clone();
            let result_hash = command.resolved_result_hash();
            let context_hash = command.resolved_context_hash();
            let command = command.clone();
            Some(spawn_isolated(
                GatewayAction::Signal,
                command.agent_id,
                command.trade_id.clone(),
                async move {
                    gateway
                        .submit_signal(
                            command.agent_id,
                            &reference,
                            &result_hash,
                            Some(&context_hash),
                            command.risk_flags,
                        )
                        .await
                },
            ))
        } else {
            None
        };

        (ack, PostTradeActions { distribution, signal })
    }
}

fn spawn_isolated<F>(
    action: GatewayAction,
    agent_id: AgentId,
    trade_id: String,
    task: F,
) -> JoinHandle<ActionOutcome>
where
    F: Future<Output = Result<DispatchOutcome, SettlementError>> + Send + 'static,
{
    tokio::spawn(async move {
        match AssertUnwindSafe(task).catch_unwind().await {
            Ok(Ok(DispatchOutcome::Skipped)) => {
                debug!(action = action.label(), trade_id = %trade_id, "Post-trade hook skipped");
                ActionOutcome::Skipped
            }
            Ok(Ok(DispatchOutcome::Confirmed { chain, tx })) => {
                info!(
                    action = action.label(),
                    agent_id = %agent_id,
                    trade_id = %trade_id,
                    chain = %chain,
                    tx = %tx,
                    "Post-trade hook completed"
                );
                ActionOutcome::Completed { chain, tx }
            }
            Ok(Err(e)) => {
                error!(
                    action = action.label(),
                    agent_id = %agent_id,
                    trade_id = %trade_id,
                    message = %e,
                    "Post-trade hook failed"
                );
                ActionOutcome::Failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(
                    action = action.label(),
                    agent_id = %agent_id,
                    trade_id = %trade_id,
                    message = %message,
                    "Post-trade hook failed"
                );
                ActionOutcome::Failed(message)
            }
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: unknown error".to_string()
    }
}
