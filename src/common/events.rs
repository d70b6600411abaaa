// Notifications emitted after a state change commits
use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::primitives::{Address, Amount, AssetId, OfferId};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const EVENT_LOG_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapEvent {
    OfferCreated {
        id: OfferId,
        initiator: Address,
        asset_buy: AssetId,
        asset_sell: AssetId,
        rate: u128,
        max_amount_to_sell: Amount,
    },
    OfferAccepted {
        id: OfferId,
        acceptor: Address,
    },
    OfferFinalized {
        id: OfferId,
        caller: Address,
    },
    OfferCancelled {
        id: OfferId,
    },
    AllowanceApproved {
        owner: Address,
        spender: Address,
        asset: AssetId,
        is_public: bool,
        nonce: u64,
    },
    AllowanceSpent {
        owner: Address,
        spender: Address,
        receiver: Address,
        asset: AssetId,
        nonce: u64,
    },
    AllowanceCancelled {
        owner: Address,
        spender: Address,
        asset: AssetId,
        nonce: u64,
    },
    BalanceCredited {
        account: Address,
        asset: AssetId,
        transaction_index: u64,
    },
    BalanceDebited {
        account: Address,
        asset: AssetId,
        transaction_index: u64,
        nonce: u64,
    },
}

/// Recent-event log plus a broadcast feed for async subscribers.
/// The log keeps the last `log_capacity` events; older ones are dropped.
pub struct EventBus {
    log: RwLock<VecDeque<SwapEvent>>,
    log_capacity: usize,
    sender: broadcast::Sender<SwapEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_log_capacity(EVENT_LOG_CAPACITY)
    }

    pub fn with_log_capacity(log_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            log: RwLock::new(VecDeque::with_capacity(log_capacity.min(EVENT_LOG_CAPACITY))),
            log_capacity,
            sender,
        }
    }

    pub fn emit(&self, event: SwapEvent) {
        debug!("📣 {:?}", event);
        {
            let mut log = self.log.write().unwrap_or_else(|poisoned| {
                warn!("Event log lock poisoned, recovering");
                poisoned.into_inner()
            });
            if log.len() >= self.log_capacity {
                log.pop_front();
            }
            log.push_back(event.clone());
        }
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.sender.subscribe()
    }

    pub fn history(&self) -> Vec<SwapEvent> {
        self.read_log().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_log(&self) -> RwLockReadGuard<'_, VecDeque<SwapEvent>> {
        self.log.read().unwrap_or_else(|poisoned| {
            warn!("Event log lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(SwapEvent::OfferCancelled { id: 3 });

        assert_eq!(receiver.recv().await.unwrap(), SwapEvent::OfferCancelled { id: 3 });
        assert_eq!(bus.history(), vec![SwapEvent::OfferCancelled { id: 3 }]);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(SwapEvent::OfferAccepted {
            id: 1,
            acceptor: Address::from_label("bob"),
        });
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_log_keeps_most_recent() {
        let bus = EventBus::with_log_capacity(3);
        for id in 1..=5 {
            bus.emit(SwapEvent::OfferCancelled { id });
        }
        assert_eq!(
            bus.history(),
            (3..=5).map(|id| SwapEvent::OfferCancelled { id }).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_emit_after_poisoned_lock() {
        let bus = std::sync::Arc::new(EventBus::new());
        let poisoner = bus.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.log.write().unwrap();
            panic!("poison the log");
        })
        .join();

        bus.emit(SwapEvent::OfferCancelled { id: 9 });
        assert_eq!(bus.history(), vec![SwapEvent::OfferCancelled { id: 9 }]);
    }
}
