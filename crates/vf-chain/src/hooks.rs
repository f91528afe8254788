//! # Extension Hooks — Pre- and Post-Submission Handlers
//!
//! Hosts register ordered handlers around the network call. Each handler
//! sees an immutable context and answers with a [`HookFlow`]:
//!
//! | Flow                | Pre-submission                               | Post-submission              |
//! |---------------------|----------------------------------------------|------------------------------|
//! | `Continue`          | run the next handler, then submit            | run the next handler         |
//! | `ShortCircuit(v)`   | skip the network; `v` stands in for the reply | stop running handlers        |
//! | `Abort(reason)`     | fail with `Vetoed`; nothing is persisted     | stop; reason is reported     |
//!
//! Post-submission handlers run after persistence, so they cannot undo it.

use vf_aeat::SubmissionResponse;
use vf_record::{InvoiceSnapshot, Record};

/// Control-flow answer of a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFlow<T> {
    /// Proceed with the next handler.
    Continue,
    /// Stop and use this value.
    ShortCircuit(T),
    /// Stop and fail with this reason.
    Abort(String),
}

/// What a pre-submission hook sees.
#[derive(Debug, Clone, Copy)]
pub struct PreSubmitContext<'a> {
    /// The hashed record about to be sent.
    pub record: &'a Record,
    /// The rendered envelope.
    pub envelope: &'a str,
    /// The host snapshot the record was built from, when there is one.
    pub snapshot: Option<&'a InvoiceSnapshot>,
}

/// What a post-submission hook sees.
#[derive(Debug, Clone, Copy)]
pub struct PostSubmitContext<'a> {
    /// The persisted record.
    pub record: &'a Record,
    /// The envelope that was sent.
    pub envelope: &'a str,
    /// The authority's answer.
    pub response: &'a SubmissionResponse,
    /// The host snapshot the record was built from, when there is one.
    pub snapshot: Option<&'a InvoiceSnapshot>,
}

/// Runs before the network call.
pub trait PreSubmitHook: Send + Sync {
    /// Name used in logs and veto errors.
    fn name(&self) -> &str;

    /// Inspect the record about to be sent.
    fn before_submit(&self, ctx: &PreSubmitContext<'_>) -> HookFlow<SubmissionResponse>;
}

/// Runs after the record has been persisted.
pub trait PostSubmitHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Observe the persisted record and the raw response.
    fn after_submit(&self, ctx: &PostSubmitContext<'_>) -> HookFlow<()>;
}

/// Result of running the pre-submission handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreSubmitDecision {
    /// Every handler continued.
    Submit,
    /// A handler supplied the response.
    ShortCircuit { hook: String, response: SubmissionResponse },
    /// A handler vetoed.
    Veto { hook: String, reason: String },
}

/// Ordered handler lists.
#[derive(Default)]
pub struct Hooks {
    pre: Vec<Box<dyn PreSubmitHook>>,
    post: Vec<Box<dyn PostSubmitHook>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("pre", &self.pre.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("post", &self.post.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Hooks {
    /// No handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pre-submission handler.
    pub fn add_pre(&mut self, hook: impl PreSubmitHook + 'static) {
        self.pre.push(Box::new(hook));
    }

    /// Append a post-submission handler.
    pub fn add_post(&mut self, hook: impl PostSubmitHook + 'static) {
        self.post.push(Box::new(hook));
    }

    /// Run pre-submission handlers in registration order.
    pub fn run_pre(&self, ctx: &PreSubmitContext<'_>) -> PreSubmitDecision {
        for hook in &self.pre {
            match hook.before_submit(ctx) {
                HookFlow::Continue => {}
                HookFlow::ShortCircuit(response) => {
                    return PreSubmitDecision::ShortCircuit {
                        hook: hook.name().to_string(),
                        response,
                    }
                }
                HookFlow::Abort(reason) => {
                    return PreSubmitDecision::Veto {
                        hook: hook.name().to_string(),
                        reason,
                    }
                }
            }
        }
        PreSubmitDecision::Submit
    }

    /// Run post-submission handlers in registration order. Returns the
    /// abort reasons, prefixed with the hook name.
    pub fn run_post(&self, ctx: &PostSubmitContext<'_>) -> Vec<String> {
        let mut errors = Vec::new();
        for hook in &self.post {
            match hook.after_submit(ctx) {
                HookFlow::Continue => {}
                HookFlow::ShortCircuit(()) => break,
                HookFlow::Abort(reason) => {
                    tracing::error!(
                        hook = hook.name(),
                        invoice = %ctx.record.invoice_id(),
                        reason = %reason,
                        "post-submission hook failed"
                    );
                    errors.push(format!("{}: {reason}", hook.name()));
                    break;
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use vf_aeat::SubmissionOutcome;
    use vf_core::{
        FiscalIdentifier, HashedAt, InvoiceIdentifier, InvoiceNumber, IssueDate, TaxId,
    };
    use vf_record::{Cancellation, ComputerSystem, Draft, RecordBody};

    struct Scripted {
        name: &'static str,
        flow: HookFlow<SubmissionResponse>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl PreSubmitHook for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn before_submit(&self, _ctx: &PreSubmitContext<'_>) -> HookFlow<SubmissionResponse> {
            self.calls.lock().push(self.name);
            self.flow.clone()
        }
    }

    fn record() -> Record {
        let system = ComputerSystem {
            vendor: FiscalIdentifier::new("Software SL", TaxId::new("B87654321").unwrap())
                .unwrap(),
            name: "vf".into(),
            id: "VF".into(),
            version: "0.1.0".into(),
            installation_number: "1".into(),
            only_supports_verifactu: true,
            supports_multiple_taxpayers: false,
            has_multiple_taxpayers: false,
        };
        let id = InvoiceIdentifier::new(
            TaxId::new("B12345678").unwrap(),
            InvoiceNumber::new("FA-1").unwrap(),
            IssueDate::from_ymd(2024, 5, 1).unwrap(),
        );
        let prev = vf_record::PreviousRecord {
            invoice_id: id.clone(),
            hash: vf_core::RecordHash::parse(&"A".repeat(64)).unwrap(),
        };
        Draft::new(
            RecordBody::Cancellation(Cancellation { invoice_id: id }),
            system,
        )
        .unwrap()
        .link(Some(prev), HashedAt::parse("2024-05-02T09:00:00+02:00").unwrap())
        .unwrap()
    }

    fn accepted() -> SubmissionResponse {
        SubmissionResponse {
            outcome: SubmissionOutcome::Accepted,
            csv: Some("OFFLINE".into()),
            raw: String::new(),
        }
    }

    #[test]
    fn pre_hooks_run_in_order_until_one_stops() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        for (name, flow) in [
            ("first", HookFlow::Continue),
            ("second", HookFlow::Abort("issuer blocked".into())),
            ("third", HookFlow::Continue),
        ] {
            hooks.add_pre(Scripted {
                name,
                flow,
                calls: Arc::clone(&calls),
            });
        }
        let record = record();
        let ctx = PreSubmitContext {
            record: &record,
            envelope: "<x/>",
            snapshot: None,
        };
        assert_eq!(
            hooks.run_pre(&ctx),
            PreSubmitDecision::Veto {
                hook: "second".into(),
                reason: "issuer blocked".into()
            }
        );
        assert_eq!(*calls.lock(), vec!["first", "second"]);
    }

    #[test]
    fn short_circuit_supplies_response() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        hooks.add_pre(Scripted {
            name: "offline",
            flow: HookFlow::ShortCircuit(accepted()),
            calls: Arc::clone(&calls),
        });
        let record = record();
        let ctx = PreSubmitContext {
            record: &record,
            envelope: "<x/>",
            snapshot: None,
        };
        match hooks.run_pre(&ctx) {
            PreSubmitDecision::ShortCircuit { hook, response } => {
                assert_eq!(hook, "offline");
                assert_eq!(response.csv.as_deref(), Some("OFFLINE"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_hooks_submit() {
        let record = record();
        let ctx = PreSubmitContext {
            record: &record,
            envelope: "<x/>",
            snapshot: None,
        };
        assert_eq!(Hooks::new().run_pre(&ctx), PreSubmitDecision::Submit);
        let response = accepted();
        let post = PostSubmitContext {
            record: &record,
            envelope: "<x/>",
            response: &response,
            snapshot: None,
        };
        assert!(Hooks::new().run_post(&post).is_empty());
    }
}
