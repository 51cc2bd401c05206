//! Per-client account registry
//!
//! Every mutating operation on an account must be serialized, so each client
//! record sits behind its own async mutex. Operations on different clients
//! proceed in parallel; the outer map lock is held only long enough to clone
//! the record handle.

use core_kernel::ClientId;
use domain_billing::FinanceAccount;
use domain_direct_debit::DirectDebitState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A client's full finance state
#[derive(Debug)]
pub struct ClientRecord {
    pub account: FinanceAccount,
    pub direct_debit: DirectDebitState,
    pub surname: String,
}

impl ClientRecord {
    pub fn new(client_id: ClientId, court_reference: String, surname: String) -> Self {
        Self {
            account: FinanceAccount::new(client_id, court_reference),
            direct_debit: DirectDebitState::default(),
            surname,
        }
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    records: Arc<RwLock<HashMap<ClientId, Arc<Mutex<ClientRecord>>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record for a new client; fails if the court reference is
    /// already registered
    pub async fn create(
        &self,
        court_reference: String,
        surname: String,
    ) -> Result<ClientId, String> {
        let mut records = self.records.write().await;
        for record in records.values() {
            let held = record.lock().await;
            if held.account.court_reference == court_reference {
                return Err(format!("Court reference {court_reference} already registered"));
            }
        }
        let client_id = ClientId::new();
        records.insert(
            client_id,
            Arc::new(Mutex::new(ClientRecord::new(
                client_id,
                court_reference,
                surname,
            ))),
        );
        Ok(client_id)
    }

    pub async fn get(&self, client_id: ClientId) -> Option<Arc<Mutex<ClientRecord>>> {
        self.records.read().await.get(&client_id).cloned()
    }

    pub async fn find_by_court_reference(
        &self,
        court_reference: &str,
    ) -> Option<Arc<Mutex<ClientRecord>>> {
        let records = self.records.read().await;
        for record in records.values() {
            let held = record.lock().await;
            if held.account.court_reference == court_reference {
                return Some(Arc::clone(record));
            }
        }
        None
    }

    /// Snapshot of all record handles, for broadcast triggers
    pub async fn all(&self) -> Vec<(ClientId, Arc<Mutex<ClientRecord>>)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(id, record)| (*id, Arc::clone(record)))
            .collect()
    }
}
