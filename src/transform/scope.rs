use crate::expr::node::NodeId;
use std::collections::HashMap;

/// Interned background context: the chain of enclosing `SetBackground` bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// No enclosing binding.
    pub const ROOT: Self = Self(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    background: Option<NodeId>,
    parent: ScopeId,
}

/// Undo record for one [`BackgroundScope::push`] or [`BackgroundScope::take_background`].
///
/// Must be handed back to [`BackgroundScope::restore`] on the matching exit entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ScopeToken {
    previous: ScopeId,
    entered: Option<ScopeId>,
}

/// Background-context stack with save/restore tokens.
///
/// Identical chains intern to the same [`ScopeId`], so a scope can key memoized results. Each
/// scope tracks how many times it is currently entered; [`Self::restore`] reports the scope that
/// just became inactive.
#[derive(Debug)]
pub struct BackgroundScope {
    frames: Vec<Frame>,
    interned: HashMap<(Option<NodeId>, ScopeId), ScopeId>,
    live: Vec<u32>,
    current: ScopeId,
}

impl Default for BackgroundScope {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundScope {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame {
                background: None,
                parent: ScopeId::ROOT,
            }],
            interned: HashMap::new(),
            live: vec![0],
            current: ScopeId::ROOT,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Number of distinct scopes interned so far, the root included.
    pub fn scope_count(&self) -> usize {
        self.frames.len()
    }

    /// Bind `background` for everything evaluated until the token is restored.
    pub fn push(&mut self, background: Option<NodeId>) -> ScopeToken {
        let key = (background, self.current);
        let id = match self.interned.get(&key) {
            Some(&id) => id,
            None => {
                let id = ScopeId(self.frames.len() as u32);
                self.frames.push(Frame {
                    background,
                    parent: self.current,
                });
                self.live.push(0);
                self.interned.insert(key, id);
                id
            }
        };
        self.live[id.index()] += 1;
        let token = ScopeToken {
            previous: self.current,
            entered: Some(id),
        };
        self.current = id;
        token
    }

    /// The innermost bound background, with the context switched to the one it was bound in.
    ///
    /// Returns `None` (and leaves the context alone) when nothing or null is bound.
    pub fn take_background(&mut self) -> Option<(NodeId, ScopeToken)> {
        if self.current == ScopeId::ROOT {
            return None;
        }
        let frame = self.frames[self.current.index()];
        let background = frame.background?;
        let token = ScopeToken {
            previous: self.current,
            entered: None,
        };
        self.current = frame.parent;
        Some((background, token))
    }

    /// Undo a push or take. Returns the scope that is no longer entered anywhere, if any.
    pub fn restore(&mut self, token: ScopeToken) -> Option<ScopeId> {
        self.current = token.previous;
        let id = token.entered?;
        let live = &mut self.live[id.index()];
        *live = live.saturating_sub(1);
        (*live == 0).then_some(id)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/scope.rs"]
mod tests;
