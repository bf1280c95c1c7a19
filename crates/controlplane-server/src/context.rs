//! The strongly-typed request-scoped bag threaded through the admission
//! pipeline via a request extension, replacing an untyped context map.
//!
//! [`SharedFacts`] is inserted once, by the outermost middleware, before the
//! request reaches anything else. Downstream middleware (token verifier,
//! policy engine) fill in their slot as the request descends; the outermost
//! layer reads the same handle back once `next.run()` returns, to build the
//! final audit record and observability sample. Every field is write-once:
//! nothing downstream of the writer ever needs to see more than one value.

use std::sync::Arc;
use std::time::Instant;

use controlplane::identity::AuthContext;
use controlplane::policy::Verdict;
use parking_lot::Mutex;

#[derive(Default)]
pub struct PipelineFacts {
    pub auth: Option<AuthContext>,
    pub verdict: Option<Verdict>,
}

#[derive(Clone)]
pub struct SharedFacts(pub Arc<Mutex<PipelineFacts>>);

impl SharedFacts {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(PipelineFacts::default())))
    }

    pub fn set_auth(&self, auth: AuthContext) {
        self.0.lock().auth = Some(auth);
    }

    pub fn set_verdict(&self, verdict: Verdict) {
        self.0.lock().verdict = Some(verdict);
    }

    #[must_use]
    pub fn auth(&self) -> Option<AuthContext> {
        self.0.lock().auth.clone()
    }

    #[must_use]
    pub fn verdict(&self) -> Option<Verdict> {
        self.0.lock().verdict.clone()
    }
}

impl Default for SharedFacts {
    fn default() -> Self {
        Self::new()
    }
}

/// Request id and start time, inserted alongside [`SharedFacts`].
#[derive(Clone)]
pub struct RequestTiming {
    pub request_id: String,
    pub started_at: Instant,
}
