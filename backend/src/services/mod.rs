//! Pipeline services for the WeatherGuard backend

pub mod alerts;
pub mod attestation;
pub mod pipeline;
pub mod publish;
pub mod scheduler;
pub mod store;

pub use alerts::{AlertFormatter, AlertOrchestrator, SweepOutcome, TemplateAlertFormatter};
pub use attestation::{AttestationReceipt, AttestationSink, LocalAttestationJournal};
pub use pipeline::{LocationOutcome, PipelineContext};
pub use publish::{BroadcastPublisher, Publisher, Topic};
pub use scheduler::{
    Cadence, CadenceStats, Scheduler, SchedulerHandle, SchedulerStatus, SharedStatus, TickReport,
};
pub use store::{MemoryStore, PgStore, ReadingStore};
