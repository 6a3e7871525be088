use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::events::{Event, ModelUnavailableStartEvent, OperationalEvent, UnavailableStartEvent};
use crate::{Credential, CredentialId, CredentialState, EventHub, UnavailableReason};

use super::model_unavailable_queue::ModelUnavailableQueue;
use super::unavailable_queue::UnavailableQueue;

type ModelStateKey = (CredentialId, String);
type ModelStateValue = (Instant, UnavailableReason);

/// How the pool picks among several eligible credentials for the same provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Always prefer the eligible credential with the smallest priority number
    /// (lower = more preferred), in configured order.
    FillFirst,
    /// Stick to one credential within the top priority tier for up to `sticky_limit`
    /// consecutive acquisitions, then rotate to the next one in that tier.
    RoundRobin { sticky_limit: u32 },
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        SelectionStrategy::FillFirst
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CredMeta {
    priority: i64,
    consecutive_use_count: u32,
    backoff_level: u32,
}

#[derive(Debug, Clone)]
pub enum AcquireError {
    ProviderUnknown,
    NoActiveCredentials,
    /// Every configured credential for the provider is currently in cooldown.
    AllRateLimited {
        retry_after: Duration,
        last_error: Option<String>,
        last_error_code: Option<String>,
    },
}

pub struct CredentialPool {
    creds: RwLock<HashMap<CredentialId, Credential>>,
    by_provider: RwLock<HashMap<String, Vec<CredentialId>>>,
    states: Arc<RwLock<HashMap<CredentialId, CredentialState>>>,
    model_states: Arc<RwLock<HashMap<ModelStateKey, ModelStateValue>>>,
    metas: RwLock<HashMap<CredentialId, CredMeta>>,
    /// Credential currently "stuck to" per provider, under RoundRobin selection.
    sticky: RwLock<HashMap<String, CredentialId>>,
    strategy: RwLock<SelectionStrategy>,
    events: EventHub,
    queue: Arc<UnavailableQueue>,
    model_queue: Arc<ModelUnavailableQueue>,
}

impl CredentialPool {
    pub fn new(events: EventHub) -> Self {
        let states = Arc::new(RwLock::new(HashMap::new()));
        let model_states = Arc::new(RwLock::new(HashMap::new()));
        let queue = Arc::new(UnavailableQueue::new());
        let model_queue = Arc::new(ModelUnavailableQueue::new());
        queue
            .clone()
            .spawn_recover_task(states.clone(), events.clone());
        model_queue
            .clone()
            .spawn_recover_task(model_states.clone(), events.clone());
        Self {
            creds: RwLock::new(HashMap::new()),
            by_provider: RwLock::new(HashMap::new()),
            states,
            model_states,
            metas: RwLock::new(HashMap::new()),
            sticky: RwLock::new(HashMap::new()),
            strategy: RwLock::new(SelectionStrategy::default()),
            events,
            queue,
            model_queue,
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub async fn set_strategy(&self, strategy: SelectionStrategy) {
        *self.strategy.write().await = strategy;
    }

    pub async fn insert(&self, provider: impl Into<String>, id: CredentialId, cred: Credential) {
        self.insert_with_priority(provider, id, cred, 0).await;
    }

    pub async fn insert_with_priority(
        &self,
        provider: impl Into<String>,
        id: CredentialId,
        cred: Credential,
        priority: i64,
    ) {
        let provider = provider.into();
        self.creds.write().await.insert(id, cred);
        // Avoid duplicated IDs in the provider index; insert() can be called on enable toggles.
        let mut by_provider = self.by_provider.write().await;
        let ids = by_provider.entry(provider).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        self.states
            .write()
            .await
            .entry(id)
            .or_insert(CredentialState::Active);
        let mut metas = self.metas.write().await;
        metas.entry(id).or_default().priority = priority;
    }

    pub async fn update_credential(&self, id: CredentialId, cred: Credential) {
        self.creds.write().await.insert(id, cred);
    }

    pub async fn set_priority(&self, id: CredentialId, priority: i64) {
        self.metas.write().await.entry(id).or_default().priority = priority;
    }

    pub async fn set_enabled(&self, provider: &str, id: CredentialId, enabled: bool) {
        if enabled {
            let mut by_provider = self.by_provider.write().await;
            let ids = by_provider.entry(provider.to_string()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
            drop(by_provider);

            // If the credential was never inserted before, keep state as Active.
            self.states
                .write()
                .await
                .entry(id)
                .or_insert(CredentialState::Active);
        } else {
            let mut by_provider = self.by_provider.write().await;
            if let Some(ids) = by_provider.get_mut(provider) {
                ids.retain(|x| *x != id);
            }
            let mut model_states = self.model_states.write().await;
            model_states.retain(|(cred_id, _), _| *cred_id != id);
            let mut sticky = self.sticky.write().await;
            if sticky.get(provider) == Some(&id) {
                sticky.remove(provider);
            }
        }
    }

    /// Picks the next eligible credential for `provider`, honoring priority tiers
    /// and the configured selection strategy. `model` restricts to credentials
    /// not currently locked out for that specific model.
    async fn select(
        &self,
        provider: &str,
        model: Option<&str>,
    ) -> Result<CredentialId, AcquireError> {
        let ids = {
            let guard = self.by_provider.read().await;
            guard.get(provider).cloned()
        };
        let Some(ids) = ids else {
            return Err(AcquireError::ProviderUnknown);
        };
        if ids.is_empty() {
            return Err(AcquireError::ProviderUnknown);
        }

        let states = self.states.read().await;
        let model_states = self.model_states.read().await;
        let metas = self.metas.read().await;

        let is_eligible = |id: &CredentialId| -> bool {
            if !matches!(states.get(id), Some(CredentialState::Active)) {
                return false;
            }
            if let Some(model) = model {
                let key = (*id, model.to_string());
                if let Some((until, _reason)) = model_states.get(&key)
                    && *until > Instant::now()
                {
                    return false;
                }
            }
            true
        };

        let eligible: Vec<CredentialId> = ids.iter().copied().filter(is_eligible).collect();
        if eligible.is_empty() {
            drop(metas);
            drop(model_states);
            drop(states);
            return Err(self.all_rate_limited_error(provider, &ids).await);
        }

        // Lower priority number wins: the tier is every eligible credential sharing
        // the smallest configured `priority`.
        let best_priority = eligible
            .iter()
            .map(|id| metas.get(id).map(|m| m.priority).unwrap_or(0))
            .min()
            .unwrap_or(0);
        let tier: Vec<CredentialId> = eligible
            .iter()
            .copied()
            .filter(|id| metas.get(id).map(|m| m.priority).unwrap_or(0) == best_priority)
            .collect();
        drop(metas);
        drop(model_states);
        drop(states);

        let strategy = *self.strategy.read().await;
        let chosen = match strategy {
            SelectionStrategy::FillFirst => tier[0],
            SelectionStrategy::RoundRobin { sticky_limit } => {
                self.select_round_robin(provider, &tier, sticky_limit).await
            }
        };
        Ok(chosen)
    }

    async fn select_round_robin(
        &self,
        provider: &str,
        tier: &[CredentialId],
        sticky_limit: u32,
    ) -> CredentialId {
        let mut sticky = self.sticky.write().await;
        let current = sticky.get(provider).copied();

        let still_eligible = current.map(|id| tier.contains(&id)).unwrap_or(false);
        let under_limit = if let Some(id) = current {
            let metas = self.metas.read().await;
            metas
                .get(&id)
                .map(|m| m.consecutive_use_count < sticky_limit.max(1))
                .unwrap_or(false)
        } else {
            false
        };

        let chosen = if still_eligible && under_limit {
            current.unwrap()
        } else {
            let next = match current.and_then(|id| tier.iter().position(|x| *x == id)) {
                Some(pos) => tier[(pos + 1) % tier.len()],
                None => tier[0],
            };
            let mut metas = self.metas.write().await;
            metas.entry(next).or_default().consecutive_use_count = 0;
            next
        };
        sticky.insert(provider.to_string(), chosen);
        chosen
    }

    async fn all_rate_limited_error(&self, provider: &str, ids: &[CredentialId]) -> AcquireError {
        let states = self.states.read().await;
        let mut soonest: Option<Instant> = None;
        let mut last_reason: Option<UnavailableReason> = None;
        for id in ids {
            if let Some(CredentialState::Unavailable { until, reason }) = states.get(id) {
                if soonest.map(|s| *until < s).unwrap_or(true) {
                    soonest = Some(*until);
                    last_reason = Some(*reason);
                }
            }
        }
        drop(states);
        let retry_after = soonest
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(0));
        let last_error_code = last_reason.map(|r| format!("{r:?}"));
        let _ = provider;
        AcquireError::AllRateLimited {
            retry_after,
            last_error: last_error_code.clone(),
            last_error_code,
        }
    }

    async fn touch_use(&self, id: CredentialId) {
        let mut metas = self.metas.write().await;
        let meta = metas.entry(id).or_default();
        meta.consecutive_use_count = meta.consecutive_use_count.saturating_add(1);
    }

    pub async fn acquire(
        &self,
        provider: &str,
    ) -> Result<(CredentialId, Credential), AcquireError> {
        let id = self.select(provider, None).await?;
        self.touch_use(id).await;
        let cred = self
            .creds
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AcquireError::NoActiveCredentials)?;
        Ok((id, cred))
    }

    pub async fn acquire_for_model(
        &self,
        provider: &str,
        model: &str,
    ) -> Result<(CredentialId, Credential), AcquireError> {
        let id = self.select(provider, Some(model)).await?;
        self.touch_use(id).await;
        let cred = self
            .creds
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AcquireError::NoActiveCredentials)?;
        Ok((id, cred))
    }

    pub async fn mark_unavailable(
        &self,
        credential_id: CredentialId,
        duration: Duration,
        reason: UnavailableReason,
    ) {
        let until_instant = Instant::now() + duration;
        {
            let mut guard = self.states.write().await;
            guard.insert(
                credential_id,
                CredentialState::Unavailable {
                    until: until_instant,
                    reason,
                },
            );
        }
        if reason.is_backoff_eligible() {
            let mut metas = self.metas.write().await;
            let meta = metas.entry(credential_id).or_default();
            meta.backoff_level = meta.backoff_level.saturating_add(1);
        }
        self.queue.push(until_instant, credential_id).await;

        let until_wall = SystemTime::now()
            .checked_add(duration)
            .unwrap_or_else(SystemTime::now);
        self.events
            .emit(Event::Operational(OperationalEvent::UnavailableStart(
                UnavailableStartEvent {
                    at: SystemTime::now(),
                    credential_id,
                    reason,
                    until: until_wall,
                },
            )))
            .await;
    }

    pub async fn mark_model_unavailable(
        &self,
        credential_id: CredentialId,
        model: impl Into<String>,
        duration: Duration,
        reason: UnavailableReason,
    ) {
        let model = model.into();
        let until_instant = Instant::now() + duration;
        {
            let mut guard = self.model_states.write().await;
            guard.insert((credential_id, model.clone()), (until_instant, reason));
        }
        self.model_queue
            .push(until_instant, credential_id, model.clone())
            .await;

        let until_wall = SystemTime::now()
            .checked_add(duration)
            .unwrap_or_else(SystemTime::now);
        self.events
            .emit(Event::Operational(OperationalEvent::ModelUnavailableStart(
                ModelUnavailableStartEvent {
                    at: SystemTime::now(),
                    credential_id,
                    model,
                    reason,
                    until: until_wall,
                },
            )))
            .await;
    }

    /// Resets the exponential backoff ladder after a successful upstream call.
    pub async fn mark_success(&self, credential_id: CredentialId) {
        let mut metas = self.metas.write().await;
        if let Some(meta) = metas.get_mut(&credential_id) {
            meta.backoff_level = 0;
        }
    }

    pub async fn backoff_level(&self, credential_id: CredentialId) -> u32 {
        self.metas
            .read()
            .await
            .get(&credential_id)
            .map(|m| m.backoff_level)
            .unwrap_or(0)
    }

    pub async fn state(&self, credential_id: CredentialId) -> Option<CredentialState> {
        self.states.read().await.get(&credential_id).cloned()
    }

    pub async fn model_states(
        &self,
        credential_id: CredentialId,
    ) -> Vec<(String, Instant, UnavailableReason)> {
        let now = Instant::now();
        let guard = self.model_states.read().await;
        let mut rows = Vec::new();
        for ((id, model), (until, reason)) in guard.iter() {
            if *id != credential_id {
                continue;
            }
            if *until <= now {
                continue;
            }
            rows.push((model.clone(), *until, *reason));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}
