// src/services/feed.rs
//
// Assinaturas ao vivo das listas do painel: cada escrita publica o snapshot
// novo do contrato para quem estiver inscrito.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::broadcast::{self, error::RecvError};

use crate::models::contract::Contract;

const FEED_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ContractFeed {
    sender: broadcast::Sender<Contract>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for ContractFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            sender,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, contract: &Contract) {
        // Sem inscritos o envio falha, e tudo bem
        let _ = self.sender.send(contract.clone());
    }

    pub fn subscribe(&self) -> ContractSubscription {
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(subscribers = count, "Nova inscrição no feed de contratos");
        ContractSubscription {
            receiver: self.sender.subscribe(),
            subscribers: self.subscribers.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

/// Inscrição ativa. Ao sair de escopo (inclusive quando o cliente SSE
/// desconecta) a inscrição é removida.
pub struct ContractSubscription {
    receiver: broadcast::Receiver<Contract>,
    subscribers: Arc<AtomicUsize>,
}

impl ContractSubscription {
    /// Próximo snapshot. `None` quando o feed foi encerrado.
    pub async fn next(&mut self) -> Option<Contract> {
        loop {
            match self.receiver.recv().await {
                Ok(contract) => return Some(contract),
                Err(RecvError::Lagged(skipped)) => {
                    // Consumidor lento: segue a partir do snapshot mais antigo ainda no buffer
                    tracing::warn!(skipped, "Inscrição atrasada, snapshots descartados");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ContractSubscription {
    fn drop(&mut self) {
        let left = self.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(subscribers = left, "Inscrição no feed de contratos encerrada");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contract::fixtures;

    #[tokio::test]
    async fn subscribers_receive_published_snapshots() {
        let feed = ContractFeed::new();
        let mut sub = feed.subscribe();
        let contract = fixtures::ana_and_bruno();

        feed.publish(&contract);
        assert_eq!(sub.next().await.unwrap().id, contract.id);
    }

    #[tokio::test]
    async fn dropping_the_subscription_unregisters_it() {
        let feed = ContractFeed::new();
        {
            let _a = feed.subscribe();
            let _b = feed.subscribe();
            assert_eq!(feed.subscriber_count(), 2);
        }
        assert_eq!(feed.subscriber_count(), 0);

        // Publicar sem inscritos não é erro
        feed.publish(&fixtures::ana_and_bruno());
    }

    #[tokio::test]
    async fn resubscribing_starts_from_new_events() {
        let feed = ContractFeed::new();
        let first = fixtures::ana_and_bruno();
        feed.publish(&first);

        let mut sub = feed.subscribe();
        let second = fixtures::ana_and_bruno();
        feed.publish(&second);
        assert_eq!(sub.next().await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn lagged_subscription_resumes_from_oldest_buffered() {
        let feed = ContractFeed::new();
        let mut sub = feed.subscribe();
        let published: Vec<Contract> = (0..FEED_CAPACITY + 2)
            .map(|_| fixtures::ana_and_bruno())
            .collect();
        for contract in &published {
            feed.publish(contract);
        }

        // Os dois primeiros saíram do buffer
        assert_eq!(sub.next().await.unwrap().id, published[2].id);
    }
}
