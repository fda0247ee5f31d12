//! Wallet event bus
//!
//! Mutations fan out domain events to any number of subscribers. Events
//! are emitted after a mutation commits; a failed operation emits
//! nothing, so observers treat a returned error with no event as the
//! abort signal. Receivers hold no reference back to the wallet.

use ecash::MintUrl;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Domain events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The proof set of a mint changed
    ProofsUpdated {
        /// Mint whose proofs changed
        mint_url: MintUrl,
    },
    /// A quote changed state
    QuoteUpdated {
        /// Id of the quote
        quote_id: String,
    },
    /// A transaction was recorded
    HistoryUpdated,
}

/// Fan-out of wallet events to subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WalletEvent>,
}

impl EventBus {
    /// New bus retaining up to `capacity` undelivered events per
    /// subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcast an event; dropped silently when nobody listens
    pub fn publish(&self, event: WalletEvent) {
        if self.sender.receiver_count() > 0 {
            let _ = self.sender.send(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
