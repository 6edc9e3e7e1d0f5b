// src/services/workspace.rs
//! Per-session visible state.
//!
//! Every action slot hands out increasing request tokens. A completed request
//! may only change the visible state if its token is still the newest one for
//! its slot; older completions are dropped so a slow response can never
//! overwrite a newer one.
//!
//! Workspaces idle longer than the TTL are dropped, and so is the least
//! recently used one once the session cap is reached.

use crate::models::*;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionSlot {
    Prompt,
    /// Shared by generation and edit: both replace the current image.
    Image,
    Analysis,
    Remake,
    RemakeImage,
    Character,
    Suggestions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub session: Uuid,
    pub slot: ActionSlot,
    pub epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    pub generated_prompt: Option<GeneratedPrompt>,
    pub current_image: Option<String>,
    pub analysis: Option<String>,
    pub improvement: Option<ConceptImprovement>,
    pub remake_image: Option<String>,
    pub character_description: Option<String>,
    pub style_suggestions: Vec<String>,
}

/// Bounds on what the registry keeps in memory.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceLimits {
    pub max_sessions: usize,
    pub idle_ttl: Duration,
    pub gallery_size: usize,
}

impl Default for WorkspaceLimits {
    fn default() -> Self {
        Self {
            max_sessions: 1024,
            idle_ttl: Duration::hours(2),
            gallery_size: 50,
        }
    }
}

struct Workspace {
    epochs: HashMap<ActionSlot, u64>,
    state: WorkspaceState,
    gallery: VecDeque<GalleryItem>,
    last_touched: DateTime<Utc>,
}

impl Workspace {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            epochs: HashMap::new(),
            state: WorkspaceState::default(),
            gallery: VecDeque::new(),
            last_touched: now,
        }
    }
}

#[derive(Default)]
pub struct WorkspaceRegistry {
    sessions: Mutex<HashMap<Uuid, Workspace>>,
    limits: WorkspaceLimits,
}

impl WorkspaceRegistry {
    pub fn with_limits(limits: WorkspaceLimits) -> Self {
        Self {
            sessions: Mutex::default(),
            limits,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, Workspace>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the session's workspace, creating it after dropping idle ones
    /// and, at capacity, the least recently used one.
    fn touch<'a>(
        &self,
        sessions: &'a mut HashMap<Uuid, Workspace>,
        session: Uuid,
    ) -> &'a mut Workspace {
        let now = Utc::now();
        if !sessions.contains_key(&session) {
            let idle_ttl = self.limits.idle_ttl;
            let before = sessions.len();
            sessions.retain(|_, w| now - w.last_touched <= idle_ttl);

            while sessions.len() >= self.limits.max_sessions.max(1) {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, w)| w.last_touched)
                    .map(|(id, _)| *id)
                else {
                    break;
                };
                sessions.remove(&oldest);
            }

            if sessions.len() < before {
                debug!("Evicted {} workspaces", before - sessions.len());
            }
        }

        let workspace = sessions
            .entry(session)
            .or_insert_with(|| Workspace::new(now));
        workspace.last_touched = now;
        workspace
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Starts a request; any earlier token for the same slot becomes stale.
    pub fn issue(&self, session: Uuid, slot: ActionSlot) -> RequestToken {
        let mut sessions = self.sessions();
        let epoch = self
            .touch(&mut sessions, session)
            .epochs
            .entry(slot)
            .or_insert(0);
        *epoch += 1;

        RequestToken {
            session,
            slot,
            epoch: *epoch,
        }
    }

    #[cfg(test)]
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.sessions()
            .get(&token.session)
            .and_then(|w| w.epochs.get(&token.slot))
            .is_some_and(|latest| *latest == token.epoch)
    }

    /// Runs `update` only if `token` is still the newest for its slot.
    pub fn apply_if_current<F>(&self, token: RequestToken, update: F) -> bool
    where
        F: FnOnce(&mut WorkspaceState),
    {
        let mut sessions = self.sessions();
        let Some(workspace) = sessions.get_mut(&token.session) else {
            return false;
        };

        if workspace.epochs.get(&token.slot) != Some(&token.epoch) {
            debug!(
                "Discarding stale {:?} result for session {} (epoch {})",
                token.slot, token.session, token.epoch
            );
            return false;
        }

        update(&mut workspace.state);
        true
    }

    pub fn state(&self, session: Uuid) -> WorkspaceState {
        self.sessions()
            .get(&session)
            .map(|w| w.state.clone())
            .unwrap_or_default()
    }

    /// Every produced image goes into the gallery, stale or not. Only the
    /// newest `gallery_size` are kept.
    pub fn record_image(
        &self,
        session: Uuid,
        image_url: &str,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> GalleryItem {
        let item = GalleryItem {
            id: Uuid::new_v4(),
            image_url: image_url.to_string(),
            prompt: prompt.to_string(),
            aspect_ratio,
            timestamp: Utc::now(),
        };
        let mut sessions = self.sessions();
        let gallery = &mut self.touch(&mut sessions, session).gallery;
        gallery.push_back(item.clone());
        while gallery.len() > self.limits.gallery_size {
            gallery.pop_front();
        }
        item
    }

    /// Newest first.
    pub fn gallery(&self, session: Uuid) -> Vec<GalleryItem> {
        self.sessions()
            .get(&session)
            .map(|w| w.gallery.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_token_wins() {
        let registry = WorkspaceRegistry::default();
        let session = Uuid::new_v4();

        let first = registry.issue(session, ActionSlot::Image);
        let second = registry.issue(session, ActionSlot::Image);

        assert!(registry.apply_if_current(second, |s| s.current_image = Some("second".into())));
        assert!(!registry.apply_if_current(first, |s| s.current_image = Some("first".into())));
        assert_eq!(registry.state(session).current_image.as_deref(), Some("second"));
    }

    #[test]
    fn slow_older_response_does_not_overwrite() {
        let registry = WorkspaceRegistry::default();
        let session = Uuid::new_v4();

        let older = registry.issue(session, ActionSlot::Prompt);
        let newer = registry.issue(session, ActionSlot::Prompt);
        assert!(!registry.is_current(older));
        assert!(registry.is_current(newer));

        // The newer one is still in flight when the older one lands.
        assert!(!registry.apply_if_current(older, |s| s.analysis = Some("old".into())));
        assert_eq!(registry.state(session).analysis, None);
    }

    #[test]
    fn slots_and_sessions_are_independent() {
        let registry = WorkspaceRegistry::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let analysis = registry.issue(a, ActionSlot::Analysis);
        registry.issue(a, ActionSlot::Remake);
        let other = registry.issue(b, ActionSlot::Analysis);

        assert!(registry.is_current(analysis));
        assert!(registry.is_current(other));
        assert_eq!(analysis.epoch, 1);
        assert_eq!(other.epoch, 1);
    }

    #[test]
    fn unknown_session_rejects_updates() {
        let registry = WorkspaceRegistry::default();
        let token = RequestToken {
            session: Uuid::new_v4(),
            slot: ActionSlot::Image,
            epoch: 1,
        };

        assert!(!registry.apply_if_current(token, |_| panic!("must not run")));
        assert_eq!(registry.state(token.session), WorkspaceState::default());
    }

    #[test]
    fn gallery_is_newest_first() {
        let registry = WorkspaceRegistry::default();
        let session = Uuid::new_v4();

        registry.record_image(session, "data:image/png;base64,AA==", "one", AspectRatio::Square);
        registry.record_image(session, "data:image/png;base64,BB==", "two", AspectRatio::Landscape16x9);

        let gallery = registry.gallery(session);
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery[0].prompt, "two");
        assert_eq!(gallery[1].aspect_ratio, AspectRatio::Square);
        assert!(registry.gallery(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn session_count_is_bounded() {
        let registry = WorkspaceRegistry::with_limits(WorkspaceLimits {
            max_sessions: 3,
            ..WorkspaceLimits::default()
        });

        let sessions: Vec<Uuid> = (0..10).map(|_| Uuid::new_v4()).collect();
        for session in &sessions {
            registry.issue(*session, ActionSlot::Image);
            registry.record_image(*session, "data:image/png;base64,AA==", "p", AspectRatio::Square);
        }

        assert_eq!(registry.session_count(), 3);
        assert_eq!(registry.gallery(sessions[9]).len(), 1);
        assert!(registry.gallery(sessions[0]).is_empty());
    }

    #[test]
    fn idle_sessions_are_dropped() {
        let registry = WorkspaceRegistry::with_limits(WorkspaceLimits {
            idle_ttl: Duration::milliseconds(1),
            ..WorkspaceLimits::default()
        });
        let idle = Uuid::new_v4();
        let token = registry.issue(idle, ActionSlot::Prompt);

        std::thread::sleep(std::time::Duration::from_millis(20));
        registry.issue(Uuid::new_v4(), ActionSlot::Prompt);

        assert_eq!(registry.session_count(), 1);
        assert!(!registry.apply_if_current(token, |s| s.analysis = Some("late".into())));
    }

    #[test]
    fn gallery_keeps_only_the_newest_items() {
        let registry = WorkspaceRegistry::with_limits(WorkspaceLimits {
            gallery_size: 2,
            ..WorkspaceLimits::default()
        });
        let session = Uuid::new_v4();

        for prompt in ["one", "two", "three"] {
            registry.record_image(session, "data:image/png;base64,AA==", prompt, AspectRatio::Square);
        }

        let prompts: Vec<String> = registry.gallery(session).into_iter().map(|g| g.prompt).collect();
        assert_eq!(prompts, vec!["three", "two"]);
    }
}
