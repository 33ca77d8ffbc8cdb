pub mod priority;
pub mod ordering;
pub mod estimator;
pub mod ledger;
pub mod supabase_ledger;
pub mod directory;
pub mod notify;
pub mod controller;

pub use priority::PriorityPolicy;
pub use estimator::WaitTimeEstimator;
pub use ledger::{InMemoryQueueLedger, QueueLedger};
pub use supabase_ledger::SupabaseQueueLedger;
pub use directory::{Directory, InMemoryDirectory, SupabaseDirectory};
pub use notify::{NoopNotifier, NotificationPort, SmsGatewayNotifier};
pub use controller::WalkInQueueService;
