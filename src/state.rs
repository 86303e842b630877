//! Application state: the single system plus its persistence handle.
//!
//! Shared by `Arc` between the proxy orchestrator and the command handler.
//! Every mutation holds the write lock across the change and the save, and
//! rolls the in-memory change back if the save fails, so memory and disk
//! never disagree.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::{Error, SystemError};
use crate::store::SystemStore;
use crate::system::{Member, MemberDraft, MemberUpdate, System, SystemDraft};

/// Owner-scoped application state.
pub struct AppState {
    owner_id: String,
    system: RwLock<Option<System>>,
    store: Arc<dyn SystemStore>,
}

impl AppState {
    /// Create state with no system loaded.
    pub fn new(owner_id: impl Into<String>, store: Arc<dyn SystemStore>) -> Self {
        Self {
            owner_id: owner_id.into(),
            system: RwLock::new(None),
            store,
        }
    }

    /// Create state and load the owner's system from the store.
    ///
    /// A load failure is logged and treated as "no system yet".
    pub async fn load(owner_id: impl Into<String>, store: Arc<dyn SystemStore>) -> Self {
        let state = Self::new(owner_id, store);
        match state.store.load(&state.owner_id).await {
            Ok(Some(system)) => *state.system.write().await = Some(system),
            Ok(None) => info!(owner = %state.owner_id, "No existing system for owner"),
            Err(e) => error!(error = %e, "Failed to load system, starting empty"),
        }
        state
    }

    /// The configured owner id.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Whether `user_id` is the authorized owner.
    pub fn is_owner(&self, user_id: &str) -> bool {
        user_id == self.owner_id
    }

    /// A clone of the current system, if any.
    pub async fn system(&self) -> Option<System> {
        self.system.read().await.clone()
    }

    /// Snapshot of the member registry in priority order.
    pub async fn members(&self) -> Vec<Member> {
        self.system
            .read()
            .await
            .as_ref()
            .map(|s| s.members().to_vec())
            .unwrap_or_default()
    }

    pub async fn get_member(&self, id: &str) -> Result<Member, SystemError> {
        let guard = self.system.read().await;
        let system = guard.as_ref().ok_or(SystemError::NoSystemExists)?;
        system
            .get_member(id)
            .cloned()
            .ok_or_else(|| SystemError::MemberNotFound(id.to_string()))
    }

    /// Create the owner's system. Fails if one already exists.
    pub async fn create_system(&self, draft: SystemDraft) -> Result<System, Error> {
        let mut guard = self.system.write().await;
        if guard.is_some() {
            return Err(SystemError::SystemAlreadyExists.into());
        }

        let system = System::new(draft, self.owner_id.clone());
        self.store.save(&system).await?;
        info!(system = %system.name, id = %system.id, "System created");
        *guard = Some(system.clone());
        Ok(system)
    }

    /// Add a member at the end of the registry.
    pub async fn add_member(&self, draft: MemberDraft) -> Result<Member, Error> {
        let member = Member::from_draft(draft)?;
        self.mutate(|system| Ok(system.add_member(member).clone()))
            .await
            .inspect(|m| info!(member = %m.name, id = %m.id, "Member added"))
    }

    /// Apply a partial update to a member.
    pub async fn update_member(&self, id: &str, update: MemberUpdate) -> Result<Member, Error> {
        self.mutate(|system| Ok(system.update_member(id, update)?.clone()))
            .await
            .inspect(|m| info!(member = %m.name, id = %m.id, "Member updated"))
    }

    /// Delete a member, returning what was removed.
    pub async fn delete_member(&self, id: &str) -> Result<Member, Error> {
        self.mutate(|system| system.remove_member(id))
            .await
            .inspect(|m| info!(member = %m.name, id = %m.id, "Member deleted"))
    }

    /// Run a registry mutation, persist, and roll back on save failure.
    async fn mutate<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut System) -> Result<T, SystemError>,
    {
        let mut guard = self.system.write().await;
        let system = guard.as_mut().ok_or(SystemError::NoSystemExists)?;

        let before = system.clone();
        let out = f(system)?;

        if let Err(e) = self.store.save(system).await {
            error!(error = %e, "Failed to save system, rolling back change");
            *system = before;
            return Err(e.into());
        }
        Ok(out)
    }
}
