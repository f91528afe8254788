//! # vf-chain — Record Chain Engine
//!
//! Turns host invoice lifecycle events into chained, submitted and
//! persisted records:
//!
//! - [`lifecycle`] decides whether a host action needs a record.
//! - [`engine`] runs build, link, submit and persist for one event.
//! - [`ledger`] holds each issuer's append-only chain and its head.
//! - [`locks`] serializes events per issuing entity.
//! - [`hooks`] lets hosts act before and after the network call.
//! - [`audit`] signs invoice snapshots and re-derives hashes from them.
//!
//! ## Chain Invariant
//!
//! The head of an issuer's chain only moves when a record the authority
//! accepted has been persisted. A failed attempt leaves it where it was.

pub mod audit;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod ledger;
pub mod lifecycle;
pub mod locks;

pub use audit::{AuditError, AuditLog, AuditLogEntry, AuditRecorder, IntegrityVerifier, VerificationResult};
pub use engine::{ChainEngine, EngineSettings, SubmissionReceipt};
pub use error::ChainError;
pub use hooks::{HookFlow, Hooks, PostSubmitContext, PostSubmitHook, PreSubmitContext, PreSubmitHook};
pub use ledger::{verify_chain, ChainEntry, ChainLedger, FileLedger, IssuerLock, LedgerError, MemoryLedger};
pub use lifecycle::{guard, Decision, LifecycleAction};
pub use locks::{EntityLock, EntityLocks};
